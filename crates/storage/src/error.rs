//! Storage error types

use crate::codec::CodecError;
use std::io;
use thiserror::Error;
use verso_core::HistoryError;

/// Result type alias for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Errors raised by key-value backends and blob (de)serialization
#[derive(Debug, Error)]
pub enum StorageError {
    /// I/O error from a file-backed store
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Blob could not be serialized or parsed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Bytes could not be decoded by the configured codec
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// Key cannot be mapped onto the backend
    #[error("Invalid storage key: {0:?}")]
    InvalidKey(String),
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::Serialization(e.to_string())
    }
}

impl From<StorageError> for HistoryError {
    fn from(e: StorageError) -> Self {
        HistoryError::storage(e.to_string())
    }
}
