//! Error types for junkmail.

use thiserror::Error;

/// Common error type for junkmail.
#[derive(Error, Debug)]
pub enum JunkmailError {
    /// Durable registry error.
    ///
    /// Errors from sqlx are automatically converted.
    #[error("database error: {0}")]
    Database(String),

    /// Durable registry connection error.
    #[error("database connection error: {0}")]
    DatabaseConnection(String),

    /// Ephemeral store error (unreachable or rejected command).
    #[error("store error: {0}")]
    Store(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Inbound message could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// Validation error for caller input.
    #[error("validation error: {0}")]
    Validation(String),

    /// Stored record could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<sqlx::Error> for JunkmailError {
    fn from(e: sqlx::Error) -> Self {
        JunkmailError::Database(e.to_string())
    }
}

impl From<redis::RedisError> for JunkmailError {
    fn from(e: redis::RedisError) -> Self {
        JunkmailError::Store(e.to_string())
    }
}

impl From<serde_json::Error> for JunkmailError {
    fn from(e: serde_json::Error) -> Self {
        JunkmailError::Serialization(e.to_string())
    }
}

/// Result type alias for junkmail operations.
pub type Result<T> = std::result::Result<T, JunkmailError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_error_display() {
        let err = JunkmailError::Decode("no recipients".to_string());
        assert_eq!(err.to_string(), "decode error: no recipients");
    }

    #[test]
    fn test_store_error_display() {
        let err = JunkmailError::Store("connection refused".to_string());
        assert_eq!(err.to_string(), "store error: connection refused");
    }

    #[test]
    fn test_validation_error_display() {
        let err = JunkmailError::Validation("retention out of range".to_string());
        assert_eq!(err.to_string(), "validation error: retention out of range");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: JunkmailError = io_err.into();
        assert!(matches!(err, JunkmailError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: JunkmailError = json_err.into();
        assert!(matches!(err, JunkmailError::Serialization(_)));
    }

    #[test]
    fn test_result_alias() {
        fn sample_ok() -> Result<i32> {
            Ok(42)
        }

        fn sample_err() -> Result<i32> {
            Err(JunkmailError::Config("test".to_string()))
        }

        assert_eq!(sample_ok().unwrap(), 42);
        assert!(sample_err().is_err());
    }
}
