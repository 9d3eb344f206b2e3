use thiserror::Error;

/// Failure raised while synthesizing a join clause.
///
/// Every variant is a permanent compile-time condition: the caller either
/// fixes the join configuration or reports the message to the user.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("No fields requested from {table}")]
    EmptyProjection { table: String },

    #[error("Join key expression '{expr}' should be a field or a call over a field: {reason}")]
    UnsupportedKeyShape { expr: String, reason: String },

    #[error("experiments_optimized is only supported for the events table, not '{table}'")]
    UnsupportedJoiningTable { table: String },

    #[error("Misconfigured experiment join ({key}): {message}")]
    MisconfiguredExperimentJoin { key: String, message: String },
}

/// Fieldless discriminant of [`ResolutionError`], handy for matching in callers and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResolutionErrorKind {
    EmptyProjection,
    UnsupportedKeyShape,
    UnsupportedJoiningTable,
    MisconfiguredExperimentJoin,
}

impl ResolutionError {
    pub fn kind(&self) -> ResolutionErrorKind {
        match self {
            ResolutionError::EmptyProjection { .. } => ResolutionErrorKind::EmptyProjection,
            ResolutionError::UnsupportedKeyShape { .. } => ResolutionErrorKind::UnsupportedKeyShape,
            ResolutionError::UnsupportedJoiningTable { .. } => {
                ResolutionErrorKind::UnsupportedJoiningTable
            }
            ResolutionError::MisconfiguredExperimentJoin { .. } => {
                ResolutionErrorKind::MisconfiguredExperimentJoin
            }
        }
    }

    pub(crate) fn unsupported_key(expr: &str, reason: impl Into<String>) -> Self {
        ResolutionError::UnsupportedKeyShape {
            expr: expr.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn misconfigured(key: &str, message: impl Into<String>) -> Self {
        ResolutionError::MisconfiguredExperimentJoin {
            key: key.to_string(),
            message: message.into(),
        }
    }
}

pub type ResolutionResult<T> = std::result::Result<T, ResolutionError>;

#[derive(Error, Debug)]
pub enum JoinError {
    #[error("Join resolution error: {0}")]
    Resolution(#[from] ResolutionError),

    #[error("Join not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, JoinError>;
