//! Durable key-value state.
//!
//! Values live under a fixed namespace inside one JSON document, e.g.
//! `{"upload_prefs": {"uploaded": true}}`. Writes replace the document
//! atomically (write to a temporary sibling, then rename).

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("State IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("State document is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("State document is corrupt: {0}")]
    InvalidShape(String),
}

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, StateError>;

    async fn set(&self, key: &str, value: Value) -> Result<(), StateError>;

    async fn remove(&self, key: &str) -> Result<(), StateError>;
}

/// Key-value store persisted as a JSON document on disk.
pub struct JsonFileStore {
    path: PathBuf,
    namespace: String,
    // Serializes read-modify-write cycles within this process.
    write_lock: tokio::sync::Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>, namespace: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            namespace: namespace.into(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_document(&self) -> Result<Map<String, Value>, StateError> {
        let raw = match fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(e.into()),
        };
        if raw.iter().all(u8::is_ascii_whitespace) {
            return Ok(Map::new());
        }

        match serde_json::from_slice::<Value>(&raw)? {
            Value::Object(document) => Ok(document),
            other => Err(StateError::InvalidShape(format!(
                "expected an object at the top level, found {}",
                other
            ))),
        }
    }

    fn namespace_of<'a>(
        &self,
        document: &'a Map<String, Value>,
    ) -> Result<Option<&'a Map<String, Value>>, StateError> {
        match document.get(&self.namespace) {
            None => Ok(None),
            Some(Value::Object(values)) => Ok(Some(values)),
            Some(_) => Err(StateError::InvalidShape(format!(
                "namespace {} is not an object",
                self.namespace
            ))),
        }
    }

    async fn write_document(&self, document: &Map<String, Value>) -> Result<(), StateError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let mut tmp_name = self.path.file_name().unwrap_or_default().to_os_string();
        tmp_name.push(".tmp");
        let tmp_path = self.path.with_file_name(tmp_name);

        let bytes = serde_json::to_vec_pretty(document)?;
        let mut file = fs::File::create(&tmp_path).await?;
        file.write_all(&bytes).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&tmp_path, &self.path).await?;
        Ok(())
    }

    async fn update<F>(&self, apply: F) -> Result<(), StateError>
    where
        F: FnOnce(&mut Map<String, Value>) + Send,
    {
        let _guard = self.write_lock.lock().await;
        let mut document = self.read_document().await?;
        self.namespace_of(&document)?;

        let values = document
            .entry(self.namespace.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(values) = values {
            apply(values);
        }

        self.write_document(&document).await
    }
}

#[async_trait]
impl KeyValueStore for JsonFileStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StateError> {
        let document = self.read_document().await?;
        Ok(self
            .namespace_of(&document)?
            .and_then(|values| values.get(key))
            .cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StateError> {
        let key = key.to_string();
        self.update(move |values| {
            values.insert(key, value);
        })
        .await?;
        tracing::debug!(path = %self.path.display(), namespace = %self.namespace, "State updated");
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StateError> {
        let key = key.to_string();
        self.update(move |values| {
            values.remove(&key);
        })
        .await
    }
}

/// In-process key-value store, lost when the process exits.
#[derive(Default)]
pub struct MemoryStore {
    values: std::sync::Mutex<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StateError> {
        Ok(self
            .values
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(key)
            .cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StateError> {
        self.values
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StateError> {
        self.values
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(key);
        Ok(())
    }
}
