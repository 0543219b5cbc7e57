//! # Insight Error Types
//!
//! Centralized error handling for the insight core library.
//!
//! Only [`InsightError::InvalidRequest`] is meant to reach batch callers.
//! Storage and corruption failures are absorbed by the cache store and
//! degrade to cache misses; producer failures become fallback payloads.

use thiserror::Error;

/// Result type alias for insight operations
pub type Result<T> = std::result::Result<T, InsightError>;

/// Core error types for insight
#[derive(Error, Debug)]
pub enum InsightError {
    /// Cache backing medium unreadable or unwritable
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Stored bytes failed to parse
    #[error("Corrupt cache entry: {0}")]
    CorruptEntry(String),

    /// Batch input rejected before dispatch
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl InsightError {
    /// Create a new storage unavailable error
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::StorageUnavailable(msg.into())
    }

    /// Create a new corrupt entry error
    pub fn corrupt(msg: impl Into<String>) -> Self {
        Self::CorruptEntry(msg.into())
    }

    /// Create a new invalid request error
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Create a new configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Whether this error should be shown to the client as a bad request
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidRequest(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = InsightError::invalid_request("requests must not be empty");
        assert_eq!(
            err.to_string(),
            "Invalid request: requests must not be empty"
        );

        let err = InsightError::storage("read-only file system");
        assert_eq!(err.to_string(), "Storage unavailable: read-only file system");
    }

    #[test]
    fn test_client_error_classification() {
        assert!(InsightError::invalid_request("x").is_client_error());
        assert!(!InsightError::storage("x").is_client_error());
        assert!(!InsightError::corrupt("x").is_client_error());
    }

    #[test]
    fn test_from_io_error() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: InsightError = io.into();
        assert!(matches!(err, InsightError::Io(_)));
    }
}
