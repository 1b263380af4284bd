//! Storage abstraction trait
//!
//! This module defines the Storage trait that all storage backends must implement.

use crate::transfer::TransferHandle;
use crate::StorageBackend;
use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Storage abstraction trait
///
/// All storage backends (S3, local filesystem) must implement this trait.
/// The upload workflow only depends on this trait, never on a concrete backend.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Start streaming the file at `local_path` to `storage_key`.
    ///
    /// Errors returned here mean the transfer never started (missing source,
    /// invalid key, backend refused to open an upload). Once a handle is
    /// returned, the outcome is delivered through its events.
    ///
    /// Cancelling `cancel` before the final commit ends the transfer with a
    /// cancelled event and leaves no object behind.
    async fn put_file(
        &self,
        local_path: &Path,
        storage_key: &str,
        cancel: CancellationToken,
    ) -> StorageResult<TransferHandle>;

    /// Check if an object exists
    async fn exists(&self, storage_key: &str) -> StorageResult<bool>;

    /// Get the size in bytes of an object, if it exists.
    async fn content_length(&self, storage_key: &str) -> StorageResult<u64>;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}

/// Largest read buffer a backend allocates per chunk.
pub(crate) fn max_chunk_size() -> usize {
    usize::try_from(clipvault_core::constants::MAX_CHUNK_BYTES).unwrap_or(usize::MAX)
}

/// Map an error opening the upload source to a storage error.
pub(crate) fn source_open_error(local_path: &Path, err: std::io::Error) -> StorageError {
    if err.kind() == std::io::ErrorKind::NotFound {
        StorageError::NotFound(local_path.display().to_string())
    } else {
        StorageError::IoError(err)
    }
}
