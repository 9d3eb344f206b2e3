//! Virtual join compilation
//!
//! Called by the query compiler while it resolves a field that crosses a
//! virtual join. The returned node is spliced back into the caller's AST.
//! Synthesis is pure: no I/O, no shared state, all-or-nothing.

pub mod experiment_join;
pub mod join_request;
pub mod key_expr;
pub mod standard_join;

pub use experiment_join::*;
pub use join_request::*;
pub use key_expr::*;
pub use standard_join::*;

use crate::error::{JoinError, ResolutionResult, Result};
use crate::semantic::join_spec::JoinSpecification;
use crate::semantic::registry::JoinRepository;

/// Builds a join subtree for one request
pub trait JoinSynthesizer {
    fn synthesize(&self, request: &JoinRequest<'_>) -> ResolutionResult<JoinExprNode>;
}

/// Synthesize with the join flavour the specification is configured for:
/// ASOF for experiment-optimized joins, equality otherwise.
pub fn synthesize_join(
    spec: &JoinSpecification,
    request: &JoinRequest<'_>,
) -> ResolutionResult<JoinExprNode> {
    if spec.configuration.is_experiments_optimized() {
        ExperimentJoin::new(spec).synthesize(request)
    } else {
        StandardJoin::new(spec).synthesize(request)
    }
}

/// Look up the join exposed as `field_name` on `source_table_name` and synthesize it.
pub fn resolve_join(
    repository: &dyn JoinRepository,
    team_id: i64,
    source_table_name: &str,
    field_name: &str,
    request: &JoinRequest<'_>,
) -> Result<JoinExprNode> {
    let spec = repository
        .get(team_id, source_table_name, field_name)
        .ok_or_else(|| {
            JoinError::NotFound(format!(
                "{}.{} for team {}",
                source_table_name, field_name, team_id
            ))
        })?;
    Ok(synthesize_join(&spec, request)?)
}
