//! Virtual joins: declarative relationships between tables with no physical
//! foreign key, resolved into join subtrees at query-compile time.

pub mod ast;
pub mod compiler;
pub mod error;
pub mod semantic;

pub use compiler::{
    resolve_join, synthesize_join, ExperimentJoin, JoinExprNode, JoinRequest, JoinRequestDocument,
    JoinSynthesizer, KeyExpression, KeyOverrides, StandardJoin,
};
pub use error::{JoinError, ResolutionError, ResolutionErrorKind, Result};
pub use semantic::{InMemoryJoinRepository, JoinConfiguration, JoinRepository, JoinSpecification};
