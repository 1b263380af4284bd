use crate::keys::validate_key;
use crate::traits::{max_chunk_size, source_open_error, Storage, StorageError, StorageResult};
use crate::transfer::{transfer_channel, PutReceipt, TransferHandle, TransferReporter};
use crate::StorageBackend;
use async_trait::async_trait;
use clipvault_core::constants::MIN_MULTIPART_CHUNK_BYTES;
use object_store::aws::AmazonS3Builder;
use object_store::path::Path;
use object_store::Error as ObjectStoreError;
use object_store::{ObjectStore, ObjectStoreExt, Result as ObjectResult, WriteMultipart};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;

/// Parts uploaded concurrently per transfer.
const MAX_CONCURRENT_PARTS: usize = 4;

/// S3 storage implementation
#[derive(Clone)]
pub struct S3Storage {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    region: String,
    endpoint_url: Option<String>, // Custom endpoint for S3-compatible providers
    chunk_size: usize,
}

impl S3Storage {
    /// Create a new S3Storage instance
    ///
    /// # Arguments
    /// * `bucket` - S3 bucket name
    /// * `region` - AWS region (or region identifier for S3-compatible providers)
    /// * `endpoint_url` - Optional custom endpoint URL for S3-compatible providers
    ///   (e.g., "http://localhost:9000" for MinIO)
    pub async fn new(
        bucket: String,
        region: String,
        endpoint_url: Option<String>,
    ) -> StorageResult<Self> {
        // Build AmazonS3 object store from environment and explicit settings.
        let mut builder = AmazonS3Builder::from_env()
            .with_region(region.clone())
            .with_bucket_name(bucket.clone());

        if let Some(ref endpoint) = endpoint_url {
            let allow_http = endpoint.starts_with("http://");
            builder = builder
                .with_endpoint(endpoint.clone())
                .with_allow_http(allow_http);
        }

        let store = builder
            .build()
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;

        Ok(Self::from_store(Arc::new(store), bucket, region, endpoint_url))
    }

    /// Wrap an already configured object store (any `object_store` backend).
    pub fn from_store(
        store: Arc<dyn ObjectStore>,
        bucket: String,
        region: String,
        endpoint_url: Option<String>,
    ) -> Self {
        S3Storage {
            store,
            bucket,
            region,
            endpoint_url,
            chunk_size: MIN_MULTIPART_CHUNK_BYTES,
        }
    }

    /// Set the multipart part size, clamped to the range S3 accepts.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.clamp(MIN_MULTIPART_CHUNK_BYTES, max_chunk_size());
        self
    }

    /// Generate public URL for S3 object
    ///
    /// For AWS S3, uses the standard format: https://{bucket}.s3.{region}.amazonaws.com/{key}
    /// For S3-compatible providers, uses the endpoint URL if provided
    fn generate_url(&self, key: &str) -> String {
        if let Some(ref endpoint) = self.endpoint_url {
            // Path-style: {endpoint}/{bucket}/{key}
            let base_url = endpoint.trim_end_matches('/');
            format!("{}/{}/{}", base_url, self.bucket, key)
        } else {
            format!(
                "https://{}.s3.{}.amazonaws.com/{}",
                self.bucket, self.region, key
            )
        }
    }

    async fn stream_parts(
        self,
        mut source: fs::File,
        mut writer: WriteMultipart,
        key: String,
        total_bytes: u64,
        reporter: TransferReporter,
        cancel: CancellationToken,
    ) {
        let start = std::time::Instant::now();

        let streamed = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            res = self.write_parts(&mut source, &mut writer, total_bytes, &reporter) => Some(res),
        };

        let written = match streamed {
            None => {
                if let Err(e) = writer.abort().await {
                    tracing::warn!(error = %e, key = %key, "S3 multipart abort failed");
                }
                tracing::info!(
                    bucket = %self.bucket,
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 upload cancelled"
                );
                reporter.cancelled();
                return;
            }
            Some(Err(e)) => {
                if let Err(abort_err) = writer.abort().await {
                    tracing::warn!(error = %abort_err, key = %key, "S3 multipart abort failed");
                }
                tracing::error!(
                    error = %e,
                    bucket = %self.bucket,
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 upload failed"
                );
                reporter.fail(e);
                return;
            }
            Some(Ok(written)) => written,
        };

        // The final commit is not interruptible: once all parts are sent the
        // object either appears whole or the upload fails.
        let result: ObjectResult<_> = writer.finish().await;
        if let Err(e) = result {
            tracing::error!(
                error = %e,
                bucket = %self.bucket,
                key = %key,
                size_bytes = written,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "S3 multipart completion failed"
            );
            reporter.fail(StorageError::UploadFailed(e.to_string()));
            return;
        }

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            size_bytes = written,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 upload successful"
        );

        let url = self.generate_url(&key);
        reporter.complete(PutReceipt {
            key,
            url,
            size_bytes: written,
        });
    }

    async fn write_parts(
        &self,
        source: &mut fs::File,
        writer: &mut WriteMultipart,
        total_bytes: u64,
        reporter: &TransferReporter,
    ) -> StorageResult<u64> {
        let mut buffer = vec![0u8; self.chunk_size];
        let mut written: u64 = 0;

        loop {
            let bytes_read = source.read(&mut buffer).await.map_err(|e| {
                StorageError::UploadFailed(format!("Failed to read from source: {}", e))
            })?;
            if bytes_read == 0 {
                break;
            }

            writer
                .wait_for_capacity(MAX_CONCURRENT_PARTS)
                .await
                .map_err(|e| StorageError::UploadFailed(e.to_string()))?;
            writer.write(&buffer[..bytes_read]);

            written += bytes_read as u64;
            reporter.progress(written, total_bytes);
        }

        Ok(written)
    }
}

#[async_trait]
impl Storage for S3Storage {
    async fn put_file(
        &self,
        local_path: &std::path::Path,
        storage_key: &str,
        cancel: CancellationToken,
    ) -> StorageResult<TransferHandle> {
        validate_key(storage_key)?;

        let source = fs::File::open(local_path)
            .await
            .map_err(|e| source_open_error(local_path, e))?;
        let total_bytes = source.metadata().await?.len();

        let location = Path::from(storage_key.to_string());
        let upload = self.store.put_multipart(&location).await.map_err(|e| {
            tracing::error!(
                error = %e,
                bucket = %self.bucket,
                key = %storage_key,
                "S3 multipart upload could not be started"
            );
            StorageError::UploadFailed(e.to_string())
        })?;
        let writer = WriteMultipart::new_with_chunk_size(upload, self.chunk_size);

        tracing::debug!(
            bucket = %self.bucket,
            source = %local_path.display(),
            key = %storage_key,
            size_bytes = total_bytes,
            "S3 upload started"
        );

        let (reporter, handle) = transfer_channel();
        let storage = self.clone();
        let key = storage_key.to_string();
        tokio::spawn(storage.stream_parts(source, writer, key, total_bytes, reporter, cancel));

        Ok(handle)
    }

    async fn exists(&self, storage_key: &str) -> StorageResult<bool> {
        let location = Path::from(storage_key.to_string());
        match self.store.head(&location).await {
            Ok(_) => Ok(true),
            Err(ObjectStoreError::NotFound { .. }) => Ok(false),
            Err(e) => Err(StorageError::BackendError(e.to_string())),
        }
    }

    async fn content_length(&self, storage_key: &str) -> StorageResult<u64> {
        let location = Path::from(storage_key.to_string());
        match self.store.head(&location).await {
            Ok(meta) => Ok(meta.size as u64),
            Err(ObjectStoreError::NotFound { .. }) => {
                Err(StorageError::NotFound(storage_key.to_string()))
            }
            Err(e) => Err(StorageError::BackendError(e.to_string())),
        }
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::S3
    }
}
