//! Resolution of media handles to on-disk path and size.
//!
//! The locator talks to a [`ContentIndex`], a read-only query interface that
//! returns a cursor over matching rows. Cursors are owned values: whatever
//! resources they hold are released when they go out of scope, on success and
//! on every error path alike.

use async_trait::async_trait;
use clipvault_core::{MediaHandle, MediaMetadata};
use percent_encoding::percent_decode_str;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Columns a content index can be asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaColumn {
    /// Absolute on-disk path of the media file.
    Data,
    /// Size of the media file in bytes.
    Size,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnValue {
    Text(String),
    Integer(i64),
    Null,
}

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Index out of range: {0}")]
    OutOfRange(String),

    #[error("Content index unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LocatorError {
    #[error("Media not found: {0}")]
    NotFound(String),

    #[error("Media has invalid size {size}: {handle}")]
    InvalidSize { handle: String, size: i64 },

    #[error("Content index error: {0}")]
    Index(String),
}

/// Read-only view over the rows a query matched.
pub trait IndexCursor: Send {
    /// Position on the first row. Returns false when the result set is empty.
    fn move_to_first(&mut self) -> bool;

    /// Position of `column` in the result, if the query exposed it.
    fn column_index(&self, column: MediaColumn) -> Option<usize>;

    /// Value at `index` in the current row.
    fn get(&self, index: usize) -> Result<ColumnValue, IndexError>;
}

#[async_trait]
pub trait ContentIndex: Send + Sync {
    /// Query the index for `handle`. `Ok(None)` means there is no matching record.
    async fn query(
        &self,
        handle: &MediaHandle,
        columns: &[MediaColumn],
    ) -> Result<Option<Box<dyn IndexCursor>>, IndexError>;
}

/// Cursor over rows held in memory.
#[derive(Debug, Clone)]
pub struct MemoryCursor {
    columns: Vec<MediaColumn>,
    rows: Vec<Vec<ColumnValue>>,
    position: Option<usize>,
}

impl MemoryCursor {
    pub fn new(columns: Vec<MediaColumn>, rows: Vec<Vec<ColumnValue>>) -> Self {
        Self {
            columns,
            rows,
            position: None,
        }
    }
}

impl IndexCursor for MemoryCursor {
    fn move_to_first(&mut self) -> bool {
        if self.rows.is_empty() {
            self.position = None;
            false
        } else {
            self.position = Some(0);
            true
        }
    }

    fn column_index(&self, column: MediaColumn) -> Option<usize> {
        self.columns.iter().position(|c| *c == column)
    }

    fn get(&self, index: usize) -> Result<ColumnValue, IndexError> {
        let row = self
            .position
            .and_then(|p| self.rows.get(p))
            .ok_or_else(|| IndexError::OutOfRange("cursor is not on a row".to_string()))?;
        row.get(index).cloned().ok_or_else(|| {
            IndexError::OutOfRange(format!("column {} of {}", index, row.len()))
        })
    }
}

/// Content index backed by the local filesystem.
///
/// Understands plain paths and `file://` URIs (percent-encoded). Relative
/// paths are resolved against the optional root, else the working directory.
/// Any other URI scheme has no matching record.
#[derive(Debug, Clone, Default)]
pub struct FsContentIndex {
    root: Option<PathBuf>,
}

impl FsContentIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    fn handle_to_path(&self, handle: &MediaHandle) -> Option<PathBuf> {
        let raw = handle.as_str().trim();
        if raw.is_empty() {
            return None;
        }

        let path = if let Some(rest) = raw.strip_prefix("file://") {
            let decoded = percent_decode_str(rest).decode_utf8().ok()?;
            PathBuf::from(decoded.as_ref())
        } else if raw.contains("://") {
            return None;
        } else {
            PathBuf::from(raw)
        };

        if path.is_absolute() {
            Some(path)
        } else {
            match &self.root {
                Some(root) => Some(root.join(path)),
                None => Some(path),
            }
        }
    }
}

#[async_trait]
impl ContentIndex for FsContentIndex {
    async fn query(
        &self,
        handle: &MediaHandle,
        columns: &[MediaColumn],
    ) -> Result<Option<Box<dyn IndexCursor>>, IndexError> {
        let Some(path) = self.handle_to_path(handle) else {
            return Ok(None);
        };

        let metadata = match tokio::fs::metadata(&path).await {
            Ok(metadata) if metadata.is_file() => metadata,
            Ok(_) => return Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(IndexError::Unavailable(e.to_string())),
        };
        let absolute = tokio::fs::canonicalize(&path)
            .await
            .map_err(|e| IndexError::Unavailable(e.to_string()))?;

        let row = columns
            .iter()
            .map(|column| match column {
                MediaColumn::Data => ColumnValue::Text(absolute.to_string_lossy().into_owned()),
                MediaColumn::Size => {
                    ColumnValue::Integer(i64::try_from(metadata.len()).unwrap_or(i64::MAX))
                }
            })
            .collect();

        Ok(Some(Box::new(MemoryCursor::new(columns.to_vec(), vec![row]))))
    }
}

/// Translates media handles into [`MediaMetadata`].
#[derive(Clone)]
pub struct MediaLocator {
    index: Arc<dyn ContentIndex>,
}

impl MediaLocator {
    pub fn new(index: Arc<dyn ContentIndex>) -> Self {
        Self { index }
    }

    /// On-disk path recorded for `handle`.
    pub async fn resolve_path(&self, handle: &MediaHandle) -> Result<PathBuf, LocatorError> {
        match self.read_column(handle, MediaColumn::Data).await? {
            ColumnValue::Text(path) if !path.is_empty() => Ok(PathBuf::from(path)),
            _ => Err(LocatorError::NotFound(handle.to_string())),
        }
    }

    /// Byte length recorded for `handle`. May be zero or negative; see [`Self::locate`].
    pub async fn resolve_size(&self, handle: &MediaHandle) -> Result<i64, LocatorError> {
        match self.read_column(handle, MediaColumn::Size).await? {
            ColumnValue::Integer(size) => Ok(size),
            ColumnValue::Text(raw) => raw
                .trim()
                .parse::<i64>()
                .map_err(|_| LocatorError::NotFound(handle.to_string())),
            ColumnValue::Null => Err(LocatorError::NotFound(handle.to_string())),
        }
    }

    /// Path and size together. A size `<= 0` is rejected as invalid.
    pub async fn locate(&self, handle: &MediaHandle) -> Result<MediaMetadata, LocatorError> {
        let path = self.resolve_path(handle).await?;
        let size = self.resolve_size(handle).await?;
        if size <= 0 {
            return Err(LocatorError::InvalidSize {
                handle: handle.to_string(),
                size,
            });
        }

        let metadata = MediaMetadata::new(path, size as u64);
        tracing::debug!(
            handle = %handle,
            path = %metadata.absolute_path.display(),
            size_bytes = metadata.size_bytes,
            "Media located"
        );
        Ok(metadata)
    }

    async fn read_column(
        &self,
        handle: &MediaHandle,
        column: MediaColumn,
    ) -> Result<ColumnValue, LocatorError> {
        let not_found = || LocatorError::NotFound(handle.to_string());

        let mut cursor = match self.index.query(handle, &[column]).await {
            Ok(Some(cursor)) => cursor,
            Ok(None) | Err(IndexError::OutOfRange(_)) => return Err(not_found()),
            Err(e) => return Err(LocatorError::Index(e.to_string())),
        };

        if !cursor.move_to_first() {
            return Err(not_found());
        }
        let index = cursor.column_index(column).ok_or_else(not_found)?;
        match cursor.get(index) {
            Ok(value) => Ok(value),
            Err(IndexError::OutOfRange(_)) => Err(not_found()),
            Err(e) => Err(LocatorError::Index(e.to_string())),
        }
    }
}
