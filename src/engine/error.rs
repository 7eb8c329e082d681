//! Engine error taxonomy.

use crate::storage::BackendError;

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Input rejected before any backend call was made.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("malformed timestamp {value:?}: {reason}")]
    MalformedTimestamp { value: String, reason: String },

    #[error("malformed period {0:?}: expected YYYY-MM")]
    MalformedPeriod(String),

    #[error("{field} {value:?} cannot be used as a storage key")]
    InvalidKey { field: &'static str, value: String },
}

/// A backend call failed.
///
/// Carries a description of the operation that was in flight. The write may or
/// may not have been applied when the failure was a timeout.
#[derive(Debug, thiserror::Error)]
#[error("{operation} failed: {source}")]
pub struct UpstreamError {
    pub operation: String,
    #[source]
    pub source: BackendError,
}

impl UpstreamError {
    pub fn new(operation: impl Into<String>, source: BackendError) -> Self {
        Self {
            operation: operation.into(),
            source,
        }
    }
}

/// Error returned by every engine operation.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

impl CoreError {
    /// Whether the caller, not the backend, is at fault.
    pub fn is_client_error(&self) -> bool {
        matches!(self, CoreError::Validation(_))
    }
}
