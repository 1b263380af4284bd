use crate::keys::validate_key;
use crate::traits::{max_chunk_size, source_open_error, Storage, StorageError, StorageResult};
use crate::transfer::{transfer_channel, PutReceipt, TransferHandle, TransferReporter};
use crate::StorageBackend;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;

/// Local filesystem storage implementation
#[derive(Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
    base_url: String,
    chunk_size: usize,
}

impl LocalStorage {
    /// Create a new LocalStorage instance
    ///
    /// # Arguments
    /// * `base_path` - Root directory for object storage (e.g., "/var/lib/clipvault/objects")
    /// * `base_url` - Base URL objects are reachable under (e.g., "file:///var/lib/clipvault/objects")
    pub async fn new(base_path: impl Into<PathBuf>, base_url: String) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(LocalStorage {
            base_path,
            base_url,
            chunk_size: DEFAULT_CHUNK_SIZE,
        })
    }

    /// Set the read/write chunk size, which is also the progress granularity.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.clamp(1, max_chunk_size());
        self
    }

    /// Convert storage key to filesystem path with security validation
    ///
    /// This function validates that the storage key doesn't contain path traversal
    /// sequences that could escape the base storage directory.
    fn key_to_path(&self, storage_key: &str) -> StorageResult<PathBuf> {
        validate_key(storage_key)?;

        let path = self.base_path.join(storage_key);

        let base_canonical = self.base_path.canonicalize().map_err(|e| {
            StorageError::ConfigError(format!("Failed to canonicalize base path: {}", e))
        })?;

        if let Ok(canonical) = path.canonicalize() {
            if canonical.strip_prefix(&base_canonical).is_err() {
                return Err(StorageError::InvalidKey(
                    "Storage key resolves outside storage directory".to_string(),
                ));
            }
        }

        Ok(path)
    }

    /// Generate public URL for an object
    fn generate_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), key)
    }

    /// Ensure parent directory exists
    async fn ensure_parent_dir(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Copy `source` into a `.part` sibling of `path`, then rename it into place.
    async fn write_object(
        self,
        mut source: fs::File,
        path: PathBuf,
        key: String,
        total_bytes: u64,
        reporter: TransferReporter,
        cancel: CancellationToken,
    ) {
        let start = std::time::Instant::now();
        let partial = partial_path(&path);

        let copied = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            res = self.copy_chunks(&mut source, &partial, total_bytes, &reporter) => Some(res),
        };

        let written = match copied {
            None => {
                let _ = fs::remove_file(&partial).await;
                tracing::info!(
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Local storage upload cancelled"
                );
                reporter.cancelled();
                return;
            }
            Some(Err(e)) => {
                let _ = fs::remove_file(&partial).await;
                tracing::error!(
                    error = %e,
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Local storage upload failed"
                );
                reporter.fail(e);
                return;
            }
            Some(Ok(written)) => written,
        };

        if let Err(e) = fs::rename(&partial, &path).await {
            let _ = fs::remove_file(&partial).await;
            reporter.fail(StorageError::UploadFailed(format!(
                "Failed to move {} into place: {}",
                path.display(),
                e
            )));
            return;
        }

        tracing::info!(
            path = %path.display(),
            key = %key,
            size_bytes = written,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage upload successful"
        );

        let url = self.generate_url(&key);
        reporter.complete(PutReceipt {
            key,
            url,
            size_bytes: written,
        });
    }

    async fn copy_chunks(
        &self,
        source: &mut fs::File,
        partial: &Path,
        total_bytes: u64,
        reporter: &TransferReporter,
    ) -> StorageResult<u64> {
        let mut file = fs::File::create(partial).await.map_err(|e| {
            StorageError::UploadFailed(format!(
                "Failed to create file {}: {}",
                partial.display(),
                e
            ))
        })?;

        let mut buffer = vec![0u8; self.chunk_size];
        let mut written: u64 = 0;

        loop {
            let bytes_read = source.read(&mut buffer).await.map_err(|e| {
                StorageError::UploadFailed(format!("Failed to read from source: {}", e))
            })?;
            if bytes_read == 0 {
                break;
            }

            file.write_all(&buffer[..bytes_read]).await.map_err(|e| {
                StorageError::UploadFailed(format!(
                    "Failed to write file {}: {}",
                    partial.display(),
                    e
                ))
            })?;

            written += bytes_read as u64;
            reporter.progress(written, total_bytes);
        }

        file.sync_all().await.map_err(|e| {
            StorageError::UploadFailed(format!(
                "Failed to sync file {}: {}",
                partial.display(),
                e
            ))
        })?;

        Ok(written)
    }
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    path.with_file_name(name)
}

#[async_trait]
impl Storage for LocalStorage {
    async fn put_file(
        &self,
        local_path: &Path,
        storage_key: &str,
        cancel: CancellationToken,
    ) -> StorageResult<TransferHandle> {
        let path = self.key_to_path(storage_key)?;

        let source = fs::File::open(local_path)
            .await
            .map_err(|e| source_open_error(local_path, e))?;
        let total_bytes = source.metadata().await?.len();

        self.ensure_parent_dir(&path).await?;

        tracing::debug!(
            source = %local_path.display(),
            key = %storage_key,
            size_bytes = total_bytes,
            "Local storage upload started"
        );

        let (reporter, handle) = transfer_channel();
        let storage = self.clone();
        let key = storage_key.to_string();
        tokio::spawn(storage.write_object(source, path, key, total_bytes, reporter, cancel));

        Ok(handle)
    }

    async fn exists(&self, storage_key: &str) -> StorageResult<bool> {
        let path = self.key_to_path(storage_key)?;
        Ok(tokio::fs::try_exists(&path).await.unwrap_or(false))
    }

    async fn content_length(&self, storage_key: &str) -> StorageResult<u64> {
        let path = self.key_to_path(storage_key)?;
        match fs::metadata(&path).await {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(storage_key.to_string()))
            }
            Err(e) => Err(StorageError::BackendError(e.to_string())),
        }
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}
