//! Storage error types.

use std::time::Duration;
use thiserror::Error;

/// Errors raised by repository implementations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Operation exceeded its deadline
    #[error("Database operation timed out after {0:?}")]
    Timeout(Duration),

    /// JSON column could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored value does not parse into its domain type
    #[error("Corrupt stored value: {0}")]
    Corrupt(String),
}

impl StorageError {
    /// Get a client-safe error message that doesn't leak storage internals
    pub fn client_message(&self) -> String {
        match self {
            StorageError::Database(_) | StorageError::Corrupt(_) => {
                "Internal server error".to_string()
            }
            StorageError::Serialization(_) => "Internal server error".to_string(),
            StorageError::Timeout(_) => "Storage temporarily unavailable".to_string(),
        }
    }
}

/// Result type for repository operations
pub type StorageResult<T> = Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_message_hides_database_details() {
        let err = StorageError::Corrupt("status 'weird' in tournaments.id=7".to_string());
        assert_eq!(err.client_message(), "Internal server error");
        assert!(err.to_string().contains("weird"));
    }

    #[test]
    fn test_timeout_display() {
        let err = StorageError::Timeout(Duration::from_secs(5));
        assert!(err.to_string().contains("timed out"));
        assert_eq!(err.client_message(), "Storage temporarily unavailable");
    }
}
