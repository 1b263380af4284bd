//! Shared fakes for upload workflow tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use clipvault_core::{FixedClock, GatePolicy, MediaHandle, StorageBackend};
use clipvault_storage::{
    transfer_channel, PutReceipt, Storage, StorageError, StorageResult, TransferHandle,
};
use clipvault_upload::{
    ColumnValue, ContentIndex, IndexCursor, IndexError, KeyValueStore, MediaColumn,
    MediaLocator, MemoryCursor, MemoryStore, StateError, UploadCoordinator, UploadGuard,
    UploadSettings,
};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub fn fixed_time() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 2)
        .unwrap()
        .and_hms_opt(3, 4, 5)
        .unwrap()
}

/// Content index over a fixed handle -> (path, size) table.
#[derive(Default)]
pub struct MockIndex {
    entries: Mutex<HashMap<String, (String, i64)>>,
}

impl MockIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, handle: &str, path: &str, size: i64) -> Self {
        self.entries
            .lock()
            .unwrap()
            .insert(handle.to_string(), (path.to_string(), size));
        self
    }
}

#[async_trait]
impl ContentIndex for MockIndex {
    async fn query(
        &self,
        handle: &MediaHandle,
        columns: &[MediaColumn],
    ) -> Result<Option<Box<dyn IndexCursor>>, IndexError> {
        let entries = self.entries.lock().unwrap();
        let Some((path, size)) = entries.get(handle.as_str()) else {
            return Ok(None);
        };
        let row = columns
            .iter()
            .map(|c| match c {
                MediaColumn::Data => ColumnValue::Text(path.clone()),
                MediaColumn::Size => ColumnValue::Integer(*size),
            })
            .collect();
        Ok(Some(Box::new(MemoryCursor::new(columns.to_vec(), vec![row]))))
    }
}

/// What the next `put_file` call does.
#[derive(Debug, Clone)]
pub enum Script {
    /// Report progress at each listed byte count, then complete.
    Succeed { steps: Vec<u64> },
    /// Report progress at each listed byte count, then fail.
    Fail { steps: Vec<u64>, reason: String },
    /// Refuse to start the transfer.
    Refuse(String),
    /// Report one progress event, then drop the reporter.
    Vanish,
    /// Report progress until cancelled.
    UntilCancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutCall {
    pub local_path: PathBuf,
    pub key: String,
}

/// Storage fake that records calls and plays back a script.
pub struct MockStorage {
    script: Mutex<Script>,
    calls: Mutex<Vec<PutCall>>,
    delay: Duration,
    total_bytes: u64,
}

impl MockStorage {
    pub fn new(script: Script) -> Self {
        Self {
            script: Mutex::new(script),
            calls: Mutex::new(Vec::new()),
            delay: Duration::ZERO,
            total_bytes: 1_048_576,
        }
    }

    pub fn succeeding() -> Self {
        Self::new(Script::Succeed {
            steps: vec![524_288, 1_048_576],
        })
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn set_script(&self, script: Script) {
        *self.script.lock().unwrap() = script;
    }

    pub fn calls(&self) -> Vec<PutCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Storage for MockStorage {
    async fn put_file(
        &self,
        local_path: &Path,
        storage_key: &str,
        cancel: CancellationToken,
    ) -> StorageResult<TransferHandle> {
        self.calls.lock().unwrap().push(PutCall {
            local_path: local_path.to_path_buf(),
            key: storage_key.to_string(),
        });
        let script = self.script.lock().unwrap().clone();
        if let Script::Refuse(reason) = script {
            return Err(StorageError::UploadFailed(reason));
        }

        let (reporter, handle) = transfer_channel();
        let delay = self.delay;
        let total = self.total_bytes;
        let key = storage_key.to_string();

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            match script {
                Script::Succeed { steps } => {
                    for step in steps {
                        reporter.progress(step, total);
                    }
                    reporter.complete(PutReceipt {
                        url: format!("memory://{}", key),
                        key,
                        size_bytes: total,
                    });
                }
                Script::Fail { steps, reason } => {
                    for step in steps {
                        reporter.progress(step, total);
                    }
                    reporter.fail(StorageError::UploadFailed(reason));
                }
                Script::Vanish => {
                    reporter.progress(1, total);
                    drop(reporter);
                }
                Script::UntilCancelled => {
                    let mut sent = 0;
                    loop {
                        tokio::select! {
                            _ = cancel.cancelled() => {
                                reporter.cancelled();
                                break;
                            }
                            _ = tokio::time::sleep(Duration::from_millis(5)) => {
                                sent = (sent + 1024).min(total);
                                reporter.progress(sent, total);
                            }
                        }
                    }
                }
                Script::Refuse(_) => unreachable!(),
            }
        });

        Ok(handle)
    }

    async fn exists(&self, storage_key: &str) -> StorageResult<bool> {
        Ok(self.calls().iter().any(|c| c.key == storage_key))
    }

    async fn content_length(&self, _storage_key: &str) -> StorageResult<u64> {
        Ok(self.total_bytes)
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}

/// Key-value store whose reads or writes can be made to fail.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryStore,
    pub fail_reads: bool,
    pub fail_writes: bool,
}

#[async_trait]
impl KeyValueStore for FlakyStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StateError> {
        if self.fail_reads {
            return Err(StateError::Io(std::io::Error::other("disk unavailable")));
        }
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StateError> {
        if self.fail_writes {
            return Err(StateError::Io(std::io::Error::other("read-only filesystem")));
        }
        self.inner.set(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<(), StateError> {
        self.inner.remove(key).await
    }
}

pub struct Harness {
    pub coordinator: Arc<UploadCoordinator>,
    pub storage: Arc<MockStorage>,
    pub guard: UploadGuard,
}

pub fn harness(index: MockIndex, storage: MockStorage) -> Harness {
    harness_with(
        index,
        storage,
        Arc::new(MemoryStore::new()),
        GatePolicy::Global,
        UploadSettings::default(),
    )
}

pub fn harness_with(
    index: MockIndex,
    storage: MockStorage,
    store: Arc<dyn KeyValueStore>,
    policy: GatePolicy,
    settings: UploadSettings,
) -> Harness {
    let storage = Arc::new(storage);
    let guard = UploadGuard::new(store, policy);
    let coordinator = UploadCoordinator::new(
        storage.clone(),
        MediaLocator::new(Arc::new(index)),
        guard.clone(),
        Arc::new(FixedClock(fixed_time())),
        settings,
    );
    Harness {
        coordinator: Arc::new(coordinator),
        storage,
        guard,
    }
}
