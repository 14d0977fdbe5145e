//! Common error types for Tally
//!
//! Every storage backend maps its native failures onto the same three
//! rating classes so the aggregator and the client stay backend-agnostic:
//! - `Validation`: bad value or missing identifier, never reaches a store
//! - `PersistenceUnavailable`: timeout, pool exhaustion, connection or disk
//!   failure; transient from the caller's point of view
//! - `ConflictIgnored`: a concurrent first insert lost a uniqueness race;
//!   adapters resolve it with an update and never return it to callers

use thiserror::Error;

/// Common result type for Tally operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across Tally crates
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid rating value or missing identifier
    #[error("Validation error: {0}")]
    Validation(String),

    /// Store timeout, pool exhaustion, connection or disk failure
    #[error("Persistence unavailable: {0}")]
    PersistenceUnavailable(String),

    /// Unique (item_id, user_identifier) violation on insert
    #[error("Rating conflict: {0}")]
    ConflictIgnored(String),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the caller may retry the operation later
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::PersistenceUnavailable(_))
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation(_))
    }
}

#[cfg(feature = "sqlx")]
impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                Error::ConflictIgnored(db_err.message().to_string())
            }
            _ => Error::PersistenceUnavailable(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_persistence_errors_are_retryable() {
        assert!(Error::PersistenceUnavailable("pool timed out".into()).is_retryable());
        assert!(!Error::Validation("bad value".into()).is_retryable());
        assert!(!Error::ConflictIgnored("dup".into()).is_retryable());
        assert!(!Error::Config("missing".into()).is_retryable());
    }

    #[cfg(feature = "sqlx")]
    #[test]
    fn test_pool_timeout_maps_to_persistence_unavailable() {
        let err: Error = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(err, Error::PersistenceUnavailable(_)));
    }

    #[cfg(feature = "sqlx")]
    #[test]
    fn test_row_not_found_maps_to_persistence_unavailable() {
        let err: Error = sqlx::Error::RowNotFound.into();
        assert!(err.is_retryable());
    }
}
