use anyhow::Context;
use clipvault_core::constants::UPLOAD_PREFS_NAMESPACE;
use clipvault_core::{Config, SystemClock, UploadProgress};
use clipvault_storage::create_storage;
use clipvault_upload::{
    FsContentIndex, JsonFileStore, MediaLocator, UploadCoordinator, UploadError, UploadGuard,
    UploadSettings,
};
use std::sync::Arc;

/// Wire storage, locator and gate from configuration.
pub async fn build_coordinator(config: &Config) -> anyhow::Result<UploadCoordinator> {
    let storage = create_storage(config)
        .await
        .context("Failed to initialize storage backend")?;
    let locator = MediaLocator::new(Arc::new(FsContentIndex::new()));

    Ok(UploadCoordinator::new(
        storage,
        locator,
        build_guard(config),
        Arc::new(SystemClock),
        UploadSettings::from(config),
    ))
}

/// Gate over the configured state file, without touching storage.
pub fn build_guard(config: &Config) -> UploadGuard {
    let store = JsonFileStore::new(config.state_path(), UPLOAD_PREFS_NAMESPACE);
    UploadGuard::new(Arc::new(store), config.gate_policy())
}

/// One-line progress indicator, e.g. `Uploading... 42%`.
pub fn format_progress(progress: &UploadProgress) -> String {
    match progress.percent() {
        Some(percent) => format!("Uploading... {}%", percent),
        None => format!("Uploading... {} bytes", progress.bytes_transferred),
    }
}

/// User-facing text for a failed upload.
pub fn failure_message(err: &UploadError) -> String {
    match err {
        UploadError::TransferFailed(reason) => format!("Upload failed: {}", reason),
        other => format!("Upload failed: {}", other),
    }
}

/// Initialize tracing for CLI binaries.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}
