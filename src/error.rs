//! Error types for the cache
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache and its auditor.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// Put on a key that is already present
    #[error("Key already exists: {0}")]
    KeyAlreadyExists(String),

    /// Lookup or mutation on an absent key
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    /// Insertion while the live count has reached capacity
    #[error("Capacity exceeded: cache holds at most {0} items")]
    CapacityExceeded(usize),

    /// Failure reported by an audit job
    #[error("Audit failed: {0}")]
    Audit(String),

    /// The auditor was started outside of a Tokio runtime
    #[error("Auditor requires a running Tokio runtime")]
    RuntimeUnavailable,
}

// == Result Type Alias ==
/// Convenience Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_name_the_key() {
        let err = CacheError::KeyNotFound("session".to_string());
        assert_eq!(err.to_string(), "Key not found: session");

        let err = CacheError::KeyAlreadyExists("session".to_string());
        assert!(err.to_string().contains("session"));
    }

    #[test]
    fn test_capacity_error_reports_limit() {
        let err = CacheError::CapacityExceeded(2);
        assert!(err.to_string().contains('2'));
    }
}
