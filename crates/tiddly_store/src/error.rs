//! Error types for store operations.

use crate::record::Key;
use std::io;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No record exists under the key.
    #[error("no such entity: {key}")]
    NotFound {
        /// The key that was looked up.
        key: Key,
    },

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The project id cannot name a store directory.
    #[error("invalid project id: {0:?}")]
    InvalidProject(String),

    /// The record log is corrupted.
    #[error("store corrupted: {0}")]
    Corrupted(String),

    /// A record could not be encoded for the log.
    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

impl StoreError {
    /// Returns true if this error means the key is absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}
