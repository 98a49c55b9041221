//! Error types for the record store

use std::time::Duration;

use thiserror::Error;

/// Result type alias for store operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur when reading or updating records
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The store could not be reached (connection, pool or I/O failure)
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The operation did not complete within its deadline
    #[error("store operation timed out after {0:?}")]
    Timeout(Duration),

    /// No record exists with the given id
    #[error("record not found: {0}")]
    NotFound(String),

    /// Stored data could not be mapped onto a record
    #[error("invalid stored data: {0}")]
    InvalidData(String),

    /// The store rejected the operation
    #[error("store rejected operation: {0}")]
    Rejected(String),
}

impl StoreError {
    /// True for errors that indicate the store itself is unreachable
    ///
    /// Repeated errors of this kind make a pipeline run abort.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Timeout(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Protocol(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => StoreError::Unavailable(err.to_string()),
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                StoreError::InvalidData(err.to_string())
            }
            _ => StoreError::Rejected(err.to_string()),
        }
    }
}
