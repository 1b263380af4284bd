//! The upload-once gate.
//!
//! Under [`GatePolicy::Global`] a single installation-wide flag blocks every
//! further upload once one has succeeded. [`GatePolicy::PerMedia`] keys the
//! flag on a SHA-256 of the media handle instead.

use clipvault_core::constants::UPLOADED_FLAG_KEY;
use clipvault_core::{GatePolicy, MediaHandle};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use thiserror::Error;

use crate::state::{KeyValueStore, StateError};

#[derive(Debug, Error)]
pub enum GuardError {
    #[error("Upload state store failed: {0}")]
    Store(#[from] StateError),
}

#[derive(Clone)]
pub struct UploadGuard {
    store: Arc<dyn KeyValueStore>,
    policy: GatePolicy,
}

impl UploadGuard {
    pub fn new(store: Arc<dyn KeyValueStore>, policy: GatePolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> GatePolicy {
        self.policy
    }

    /// Key of the flag that gates `handle`.
    pub fn flag_key(&self, handle: &MediaHandle) -> String {
        match self.policy {
            GatePolicy::Global => UPLOADED_FLAG_KEY.to_string(),
            GatePolicy::PerMedia => {
                let digest = Sha256::digest(handle.as_str().as_bytes());
                format!("{}:{}", UPLOADED_FLAG_KEY, hex::encode(digest))
            }
        }
    }

    /// Whether the gate is closed for `handle`. An absent flag reads as open; a
    /// flag that is present but not a boolean is an error.
    pub async fn has_uploaded(&self, handle: &MediaHandle) -> Result<bool, GuardError> {
        let key = self.flag_key(handle);
        match self.store.get(&key).await? {
            None => Ok(false),
            Some(Value::Bool(uploaded)) => Ok(uploaded),
            Some(other) => Err(StateError::InvalidShape(format!(
                "flag {} is not a boolean: {}",
                key, other
            ))
            .into()),
        }
    }

    /// Durably close the gate. Idempotent.
    pub async fn mark_uploaded(&self, handle: &MediaHandle) -> Result<(), GuardError> {
        let key = self.flag_key(handle);
        self.store.set(&key, Value::Bool(true)).await?;
        tracing::info!(flag = %key, policy = %self.policy, "Upload recorded as complete");
        Ok(())
    }

    /// Reopen the gate.
    pub async fn reset(&self, handle: &MediaHandle) -> Result<(), GuardError> {
        let key = self.flag_key(handle);
        self.store.remove(&key).await?;
        tracing::info!(flag = %key, policy = %self.policy, "Upload gate reset");
        Ok(())
    }
}
