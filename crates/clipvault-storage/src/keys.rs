//! Shared key generation for storage backends.
//!
//! Key format: `{namespace}/video_{YYYYMMDD}_{HHMMSS}[_{suffix}].{ext}`.
//! Two keys generated within the same second collide unless a suffix is added;
//! the later upload then overwrites the earlier object.

use chrono::NaiveDateTime;
use uuid::Uuid;

use crate::traits::{StorageError, StorageResult};

/// Generate the destination key for a video captured or uploaded at `at`.
pub fn destination_key(
    namespace: &str,
    at: NaiveDateTime,
    extension: &str,
    suffix: Option<&str>,
) -> String {
    let stamp = at.format("%Y%m%d_%H%M%S");
    let extension = extension.trim_start_matches('.');
    match suffix {
        Some(suffix) => format!("{}/video_{}_{}.{}", namespace, stamp, suffix, extension),
        None => format!("{}/video_{}.{}", namespace, stamp, extension),
    }
}

/// Short random suffix used to keep same-second keys apart.
pub fn unique_suffix() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

/// Reject keys that could escape the storage root.
pub fn validate_key(storage_key: &str) -> StorageResult<()> {
    if storage_key.is_empty() {
        return Err(StorageError::InvalidKey("Storage key is empty".to_string()));
    }
    if storage_key.contains("..") || storage_key.starts_with('/') {
        return Err(StorageError::InvalidKey(
            "Storage key contains invalid characters".to_string(),
        ));
    }
    Ok(())
}
