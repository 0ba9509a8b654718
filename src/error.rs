// Typed errors for caller mistakes. Operational misses are outcomes, not errors.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("invalid type filter '{0}' (expected one of: all, class, method, constant, property)")]
    InvalidTypeFilter(String),

    #[error("missing required argument '{0}'")]
    MissingArgument(&'static str),

    #[error("invalid value for argument '{name}': {reason}")]
    InvalidArgument { name: &'static str, reason: String },

    #[error("unknown tool '{0}'")]
    UnknownTool(String),
}
