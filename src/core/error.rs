use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Security error: {0}")]
    Security(String),

    #[error("Conflict rejected: {0}")]
    ConflictRejected(String),

    #[error("Integrity violation: {0}")]
    IntegrityViolation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Transient storage failure: {0}")]
    Transient(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Lock error: {0}")]
    LockError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DbError {
    /// Whether re-running the failed operation from scratch may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    pub fn security(message: impl Into<String>) -> Self {
        Self::Security(message.into())
    }

    pub fn integrity(message: impl Into<String>) -> Self {
        Self::IntegrityViolation(message.into())
    }
}

pub type Result<T> = std::result::Result<T, DbError>;

impl<T> From<std::sync::PoisonError<T>> for DbError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(DbError::Transient("busy".into()).is_retryable());
        assert!(!DbError::LockError("poisoned".into()).is_retryable());
        assert!(!DbError::security("denied").is_retryable());
        assert!(!DbError::integrity("two rows").is_retryable());
    }

    #[test]
    fn test_display_messages() {
        let err = DbError::ConflictRejected("apn 'a1' already present".into());
        assert_eq!(err.to_string(), "Conflict rejected: apn 'a1' already present");
    }
}
