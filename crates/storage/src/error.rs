//! Storage backend errors.

use activity_core::ActivityError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("backend error: {0}")]
    Backend(String),

    #[error("row decode error: {0}")]
    Decode(String),
}

impl StorageError {
    /// Whether a single idempotent retry is worthwhile.
    pub fn is_transient(&self) -> bool {
        matches!(self, StorageError::Backend(_))
    }
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                StorageError::Decode(err.to_string())
            }
            other => StorageError::Backend(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Backend(err.to_string())
    }
}

impl From<StorageError> for ActivityError {
    fn from(_err: StorageError) -> Self {
        // The concrete cause is logged by the caller; responses stay opaque.
        ActivityError::ServiceUnavailable("store query failed".to_string())
    }
}
