use thiserror::Error;

use super::Key;

#[derive(Error, Debug)]
pub enum RepoError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Unresolvable query method '{method}': {reason}")]
    UnresolvableQuery { method: String, reason: String },

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("Malformed query: {0}")]
    MalformedQuery(String),

    #[error("Stale reference to {entity}#{key}: the backing row no longer exists")]
    StaleReference { entity: String, key: Key },

    #[error("Detached access to {entity}#{key}: the owning unit of work has ended")]
    DetachedAccess { entity: String, key: Key },

    #[error("Could not acquire lock on {entity}#{key}: held by another unit of work")]
    LockAcquisition { entity: String, key: Key },

    #[error("Timed out after {waited_ms}ms waiting for lock on {entity}#{key}")]
    LockTimeout {
        entity: String,
        key: Key,
        waited_ms: u64,
    },

    #[error("Projection '{projection}' does not expose field '{field}'")]
    UnsupportedProjectionField { projection: String, field: String },

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Incorrect result size: expected at most {expected}, got {actual}")]
    IncorrectResultSize { expected: usize, actual: usize },

    #[error("Entity {entity}#{key} not found")]
    EntityNotFound { entity: String, key: Key },

    #[error("Lock error: {0}")]
    Lock(String),
}

pub type Result<T> = std::result::Result<T, RepoError>;

impl RepoError {
    pub(crate) fn unresolvable(method: &str, reason: impl Into<String>) -> Self {
        Self::UnresolvableQuery {
            method: method.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether the failure came from the executor's locking layer.
    pub fn is_lock_failure(&self) -> bool {
        matches!(self, Self::LockAcquisition { .. } | Self::LockTimeout { .. })
    }
}

impl<T> From<std::sync::PoisonError<T>> for RepoError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::Lock(err.to_string())
    }
}

impl From<serde_json::Error> for RepoError {
    fn from(err: serde_json::Error) -> Self {
        Self::Configuration(err.to_string())
    }
}
