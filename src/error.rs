//! Error types for Game Hangar.

use thiserror::Error;

/// Common error type for Game Hangar.
#[derive(Error, Debug)]
pub enum HangarError {
    /// Database error.
    ///
    /// Wraps every sqlx error except `RowNotFound`, which becomes `NotFound`.
    #[error("database error: {0}")]
    Database(String),

    /// Database connection error.
    #[error("database connection error: {0}")]
    DatabaseConnection(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Resource not found.
    #[error("{0} not found")]
    NotFound(String),

    /// Stale version on a versioned update.
    #[error("version conflict on {0}")]
    Conflict(String),

    /// Validation error for user input.
    #[error("validation error: {0}")]
    Validation(String),

    /// No authentication context on a request that needs one.
    #[error("authentication required: {0}")]
    AuthMissing(String),

    /// Authentication error (bad credentials).
    #[error("authentication error: {0}")]
    Auth(String),

    /// Permission denied error.
    #[error("permission denied: {0}")]
    Permission(String),

    /// Upload exceeds the size cap of the caller's tier.
    #[error("object too large: {size} bytes exceeds the {limit} byte cap")]
    ObjectTooLarge {
        /// Size of the rejected upload.
        size: u64,
        /// Cap that applied.
        limit: u64,
    },

    /// Object missing from the object store.
    #[error("object {0} does not exist")]
    ObjectNotFound(String),

    /// Object store or other upstream failure.
    #[error("upstream error: {0}")]
    Upstream(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Anything else.
    #[error("internal error: {0}")]
    Internal(String),
}

impl HangarError {
    /// True for `NotFound`.
    pub fn is_not_found(&self) -> bool {
        matches!(self, HangarError::NotFound(_))
    }

    /// True for `Conflict`.
    pub fn is_conflict(&self) -> bool {
        matches!(self, HangarError::Conflict(_))
    }
}

// Conversion from sqlx errors
impl From<sqlx::Error> for HangarError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => HangarError::NotFound("row".to_string()),
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                HangarError::DatabaseConnection(e.to_string())
            }
            other => HangarError::Database(other.to_string()),
        }
    }
}

/// Result type alias for Game Hangar operations.
pub type Result<T> = std::result::Result<T, HangarError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_error_display() {
        let err = HangarError::NotFound("demo".to_string());
        assert_eq!(err.to_string(), "demo not found");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_conflict_error_display() {
        let err = HangarError::Conflict("topic 1".to_string());
        assert_eq!(err.to_string(), "version conflict on topic 1");
        assert!(err.is_conflict());
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_object_too_large_display() {
        let err = HangarError::ObjectTooLarge {
            size: 10,
            limit: 5,
        };
        assert_eq!(
            err.to_string(),
            "object too large: 10 bytes exceeds the 5 byte cap"
        );
    }

    #[test]
    fn test_row_not_found_becomes_not_found() {
        let err: HangarError = sqlx::Error::RowNotFound.into();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_pool_timeout_is_connection_error() {
        let err: HangarError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(err, HangarError::DatabaseConnection(_)));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: HangarError = io_err.into();
        assert!(matches!(err, HangarError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }
}
