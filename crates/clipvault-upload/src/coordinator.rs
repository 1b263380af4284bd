//! Orchestration of one guarded upload.
//!
//! Invocations are serialized by a single-flight lock owned by the coordinator,
//! so two concurrent calls can never both pass the gate before either records
//! completion. Share one coordinator per installation.

use clipvault_core::{
    Clock, Config, MediaHandle, MediaMetadata, UploadOutcome, UploadProgress,
};
use clipvault_storage::keys::{destination_key, unique_suffix};
use clipvault_storage::{Storage, StorageError, TransferEvent};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::error::UploadError;
use crate::guard::UploadGuard;
use crate::locator::MediaLocator;

/// Key layout settings for destination objects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSettings {
    pub namespace: String,
    pub unique_keys: bool,
    pub default_extension: String,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            namespace: clipvault_core::constants::DEFAULT_UPLOAD_NAMESPACE.to_string(),
            unique_keys: false,
            default_extension: clipvault_core::constants::DEFAULT_VIDEO_EXTENSION.to_string(),
        }
    }
}

impl From<&Config> for UploadSettings {
    fn from(config: &Config) -> Self {
        Self {
            namespace: config.upload_namespace().to_string(),
            unique_keys: config.unique_keys(),
            default_extension: config.default_extension().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum AttemptOutcome {
    Success,
    Failure(String),
    Cancelled,
}

/// In-memory record of one transfer, dropped once it resolves.
#[derive(Debug)]
struct UploadAttempt {
    bytes_transferred: u64,
    total_bytes: u64,
    outcome: Option<AttemptOutcome>,
}

impl UploadAttempt {
    fn new(total_bytes: u64) -> Self {
        Self {
            bytes_transferred: 0,
            total_bytes,
            outcome: None,
        }
    }

    fn record_progress(&mut self, bytes_transferred: u64, total_bytes: u64) -> UploadProgress {
        if total_bytes > 0 {
            self.total_bytes = total_bytes;
        }
        self.bytes_transferred = bytes_transferred;
        UploadProgress::new(self.bytes_transferred, self.total_bytes)
    }

    fn resolve(&mut self, outcome: AttemptOutcome) {
        if self.outcome.is_none() {
            self.outcome = Some(outcome);
        }
    }
}

pub struct UploadCoordinator {
    storage: Arc<dyn Storage>,
    locator: MediaLocator,
    guard: UploadGuard,
    clock: Arc<dyn Clock>,
    settings: UploadSettings,
    in_flight: Mutex<()>,
}

impl UploadCoordinator {
    pub fn new(
        storage: Arc<dyn Storage>,
        locator: MediaLocator,
        guard: UploadGuard,
        clock: Arc<dyn Clock>,
        settings: UploadSettings,
    ) -> Self {
        Self {
            storage,
            locator,
            guard,
            clock,
            settings,
            in_flight: Mutex::new(()),
        }
    }

    pub fn guard(&self) -> &UploadGuard {
        &self.guard
    }

    pub fn locator(&self) -> &MediaLocator {
        &self.locator
    }

    /// Upload `handle` unless the gate is closed. No progress reporting, no cancellation.
    pub async fn upload(&self, handle: &MediaHandle) -> Result<UploadOutcome, UploadError> {
        self.upload_with(handle, |_| {}, CancellationToken::new())
            .await
    }

    /// Upload `handle` unless the gate is closed, relaying progress to `on_progress`.
    ///
    /// Progress callbacks all happen before this returns; none follow the result.
    pub async fn upload_with<F>(
        &self,
        handle: &MediaHandle,
        mut on_progress: F,
        cancel: CancellationToken,
    ) -> Result<UploadOutcome, UploadError>
    where
        F: FnMut(UploadProgress) + Send,
    {
        let _in_flight = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(UploadOutcome::Cancelled),
            guard = self.in_flight.lock() => guard,
        };

        if self.guard.has_uploaded(handle).await? {
            tracing::info!(handle = %handle, "Upload skipped, already uploaded");
            return Ok(UploadOutcome::AlreadyUploaded);
        }

        let metadata = self.locator.locate(handle).await.map_err(|e| {
            tracing::warn!(handle = %handle, error = %e, "Upload aborted, media unresolved");
            UploadError::LocatorFailed(e)
        })?;

        let key = self.destination_key(&metadata);
        let start = std::time::Instant::now();
        tracing::info!(
            handle = %handle,
            key = %key,
            size_bytes = metadata.size_bytes,
            backend = %self.storage.backend_type(),
            "Upload started"
        );

        let mut transfer = self
            .storage
            .put_file(&metadata.absolute_path, &key, cancel)
            .await
            .map_err(|e| {
                tracing::error!(key = %key, error = %e, "Upload could not be started");
                UploadError::TransferFailed(failure_reason(e))
            })?;

        let mut attempt = UploadAttempt::new(metadata.size_bytes);
        while let Some(event) = transfer.next_event().await {
            match event {
                TransferEvent::Progress {
                    bytes_transferred,
                    total_bytes,
                } => on_progress(attempt.record_progress(bytes_transferred, total_bytes)),
                TransferEvent::Completed(_) => attempt.resolve(AttemptOutcome::Success),
                TransferEvent::Failed(e) => {
                    attempt.resolve(AttemptOutcome::Failure(failure_reason(e)))
                }
                TransferEvent::Cancelled => attempt.resolve(AttemptOutcome::Cancelled),
            }
        }

        let outcome = attempt.outcome.take().unwrap_or_else(|| {
            AttemptOutcome::Failure("transfer ended without reporting a result".to_string())
        });
        let duration_ms = start.elapsed().as_secs_f64() * 1000.0;

        match outcome {
            AttemptOutcome::Success => {
                self.guard.mark_uploaded(handle).await.map_err(|source| {
                    tracing::error!(key = %key, error = %source, "Upload succeeded but was not recorded");
                    UploadError::CompletionNotRecorded {
                        key: key.clone(),
                        source,
                    }
                })?;
                tracing::info!(
                    key = %key,
                    size_bytes = attempt.bytes_transferred,
                    duration_ms,
                    "Upload succeeded"
                );
                Ok(UploadOutcome::Uploaded(key))
            }
            AttemptOutcome::Failure(reason) => {
                tracing::error!(
                    key = %key,
                    error = %reason,
                    bytes_transferred = attempt.bytes_transferred,
                    total_bytes = attempt.total_bytes,
                    duration_ms,
                    "Upload failed"
                );
                Err(UploadError::TransferFailed(reason))
            }
            AttemptOutcome::Cancelled => {
                tracing::info!(key = %key, duration_ms, "Upload cancelled");
                Ok(UploadOutcome::Cancelled)
            }
        }
    }

    fn destination_key(&self, metadata: &MediaMetadata) -> String {
        let extension = metadata
            .extension()
            .unwrap_or_else(|| self.settings.default_extension.clone());
        let suffix = self.settings.unique_keys.then(unique_suffix);
        destination_key(
            &self.settings.namespace,
            self.clock.now(),
            &extension,
            suffix.as_deref(),
        )
    }
}

fn failure_reason(error: StorageError) -> String {
    match error {
        StorageError::UploadFailed(reason) => reason,
        other => other.to_string(),
    }
}
