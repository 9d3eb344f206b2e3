//! Standard (equality) join synthesis
//!
//! Produces
//!
//! ```text
//! LEFT JOIN (SELECT <joining>.<chain> AS <alias>, ... FROM <joining>) AS <to>
//!     ON <from>.<source key> = <to>.<joining key>
//! ```
//!
//! with the projection pruned to the fields the enclosing query asked for.

use crate::ast::{Expr, Field, JoinType, SelectQuery};
use crate::compiler::join_request::{JoinClause, JoinExprNode, JoinRequest};
use crate::compiler::key_expr::resolve_key;
use crate::compiler::JoinSynthesizer;
use crate::error::{ResolutionError, ResolutionResult};
use crate::semantic::join_spec::JoinSpecification;
use tracing::debug;

/// Alternate key expressions for the same physical tables
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyOverrides {
    pub source_table_key: Option<String>,
    pub joining_table_key: Option<String>,
}

/// Equality LEFT JOIN synthesizer for one join specification
#[derive(Debug, Clone)]
pub struct StandardJoin<'s> {
    spec: &'s JoinSpecification,
    overrides: KeyOverrides,
}

impl<'s> StandardJoin<'s> {
    pub fn new(spec: &'s JoinSpecification) -> Self {
        Self::with_overrides(spec, KeyOverrides::default())
    }

    pub fn with_overrides(spec: &'s JoinSpecification, overrides: KeyOverrides) -> Self {
        Self { spec, overrides }
    }

    fn source_key(&self) -> &str {
        pick_key(&self.overrides.source_table_key, &self.spec.source_table_key)
    }

    fn joining_key(&self) -> &str {
        pick_key(&self.overrides.joining_table_key, &self.spec.joining_table_key)
    }
}

// Blank overrides fall back to the stored key.
fn pick_key<'a>(override_key: &'a Option<String>, stored: &'a str) -> &'a str {
    override_key
        .as_deref()
        .filter(|key| !key.trim().is_empty())
        .unwrap_or(stored)
}

impl JoinSynthesizer for StandardJoin<'_> {
    fn synthesize(&self, request: &JoinRequest<'_>) -> ResolutionResult<JoinExprNode> {
        if request.fields_accessed.is_empty() {
            return Err(ResolutionError::EmptyProjection {
                table: request.to_table.clone(),
            });
        }

        let left = resolve_key(self.source_key(), &request.from_table)?;
        let right = resolve_key(self.joining_key(), &request.to_table)?;

        let joining_table = &self.spec.joining_table_name;
        let select = request
            .fields_accessed
            .iter()
            .map(|(alias, chain)| {
                Expr::alias(alias.as_str(), Expr::Field(Field::new(chain).qualified(joining_table)))
            })
            .collect();

        debug!(
            from = %request.from_table,
            to = %request.to_table,
            joining_table = %joining_table,
            fields = request.fields_accessed.len(),
            "Synthesized LEFT JOIN"
        );

        Ok(JoinExprNode::EquiJoin(JoinClause {
            table: SelectQuery {
                select,
                from: Field::new([joining_table.as_str()]),
                filter: None,
            },
            join_type: JoinType::Left,
            alias: request.to_table.clone(),
            constraint: Expr::equals(left, right),
        }))
    }
}
