//! Experiment (ASOF) join synthesis
//!
//! Attributes each source row to the experiment variant the acting user held
//! at that moment: the most recent `$feature_flag_called` event at or before
//! the row's timestamp.
//!
//! Source table:  timestamp=2024-01-03 12:00, distinct_id=user1
//! Events:
//!   2024-01-02 (user1, variant=control)   <- joined
//!   2024-01-03 (user1, variant=test)      <- later than the source row, ignored
//!
//! ASOF LEFT JOIN picks, per left row, the single right row with the greatest
//! timestamp not exceeding the left timestamp. Ties between equal timestamps
//! are left to the engine. Rows with no earlier event keep NULL right fields.

use crate::ast::{CompareOp, Expr, Field, JoinType, SelectQuery};
use crate::compiler::join_request::{FieldsAccessed, JoinClause, JoinExprNode, JoinRequest};
use crate::compiler::JoinSynthesizer;
use crate::error::{ResolutionError, ResolutionResult};
use crate::semantic::join_spec::JoinSpecification;
use tracing::{debug, warn};

/// The only table experiment joins may target
pub const EVENTS_TABLE: &str = "events";

/// Event emitted whenever a feature flag is evaluated for a user
pub const FEATURE_FLAG_CALLED: &str = "$feature_flag_called";

const TIMESTAMP_COLUMN: &str = "timestamp";

/// Projected on every experiment join regardless of what was requested
const REQUIRED_EVENT_COLUMNS: [&str; 4] = ["event", TIMESTAMP_COLUMN, "distinct_id", "properties"];

/// ASOF LEFT JOIN synthesizer for experiment-optimized join specifications
#[derive(Debug, Clone, Copy)]
pub struct ExperimentJoin<'s> {
    spec: &'s JoinSpecification,
}

impl<'s> ExperimentJoin<'s> {
    pub fn new(spec: &'s JoinSpecification) -> Self {
        Self { spec }
    }

    /// All preconditions, checked before anything is built.
    fn validate(&self) -> ResolutionResult<&'s str> {
        if self.spec.joining_table_name != EVENTS_TABLE {
            return Err(ResolutionError::UnsupportedJoiningTable {
                table: self.spec.joining_table_name.clone(),
            });
        }
        self.spec.configuration.experiment_timestamp_key()
    }
}

impl JoinSynthesizer for ExperimentJoin<'_> {
    fn synthesize(&self, request: &JoinRequest<'_>) -> ResolutionResult<JoinExprNode> {
        let timestamp_key = self.validate()?;

        let mut filter = vec![flag_called(Expr::field(["event"]))];
        filter.extend(outer_time_bounds(request.filter, timestamp_key));

        let select = projection(&request.fields_accessed)
            .into_iter()
            .map(|(alias, chain)| {
                Expr::alias(alias, Expr::Field(Field::new(chain).qualified(EVENTS_TABLE)))
            })
            .collect();

        let source_key = Expr::field([
            request.from_table.as_str(),
            self.spec.source_table_key.as_str(),
        ]);
        let joining_key = Expr::Field(
            Field::new(self.spec.joining_table_key.split('.')).qualified(&request.to_table),
        );
        let constraint = Expr::And(vec![
            flag_called(Expr::field([request.to_table.as_str(), "event"])),
            Expr::equals(source_key, joining_key),
            Expr::compare(
                CompareOp::GtEq,
                Expr::field([request.from_table.as_str(), timestamp_key]),
                Expr::field([request.to_table.as_str(), TIMESTAMP_COLUMN]),
            ),
        ]);

        debug!(
            from = %request.from_table,
            to = %request.to_table,
            timestamp_key,
            bounds = filter.len() - 1,
            "Synthesized ASOF LEFT JOIN"
        );

        Ok(JoinExprNode::AsofJoin(JoinClause {
            table: SelectQuery {
                select,
                from: Field::new([EVENTS_TABLE]),
                filter: Some(Expr::And(filter)),
            },
            join_type: JoinType::AsofLeft,
            alias: request.to_table.clone(),
            constraint,
        }))
    }
}

fn flag_called(event: Expr) -> Expr {
    Expr::equals(event, Expr::string(FEATURE_FLAG_CALLED))
}

/// Requested fields merged with the required event columns. A requested alias
/// that collides with a required column takes the required chain in place.
fn projection(fields_accessed: &FieldsAccessed) -> FieldsAccessed {
    let mut projection = fields_accessed.clone();
    for column in REQUIRED_EVENT_COLUMNS {
        projection.insert(column.to_string(), vec![column.to_string()]);
    }
    projection
}

/// Re-derives `>=`/`<=` bounds on the timestamp key from the outer filter as
/// bounds on the events `timestamp` column.
///
/// A conjunct counts when its left side, after aliases, is a field ending in
/// the key's segments or a call whose first argument is such a field.
///
/// The synthesized subquery cannot see the outer table's columns, so without
/// these it would scan the whole event stream.
fn outer_time_bounds(filter: Option<&Expr>, timestamp_key: &str) -> Vec<Expr> {
    let key_path: Vec<&str> = timestamp_key.split('.').collect();

    filter
        .map(Expr::conjuncts)
        .unwrap_or_default()
        .iter()
        .filter_map(|conjunct| {
            let Expr::Compare(cmp) = conjunct else {
                return None;
            };
            let references_key = cmp
                .left
                .leading_field()
                .is_some_and(|field| field.ends_with(&key_path));
            if !references_key {
                return None;
            }
            match cmp.op {
                CompareOp::GtEq | CompareOp::LtEq => Some(Expr::compare(
                    cmp.op,
                    Expr::field([TIMESTAMP_COLUMN]),
                    (*cmp.right).clone(),
                )),
                CompareOp::Gt | CompareOp::Lt => {
                    warn!(
                        timestamp_key,
                        op = cmp.op.as_sql(),
                        "Ignoring strict outer bound on experiment timestamp key; \
                         only >= and <= are carried into the join"
                    );
                    None
                }
                CompareOp::Eq | CompareOp::NotEq => None,
            }
        })
        .collect()
}
