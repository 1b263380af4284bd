use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Opaque reference to a locally stored media file.
///
/// The workflow never interprets the handle itself; a content index decides
/// what it points at (a plain path, a `file://` URI, a catalogue id, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaHandle(String);

impl MediaHandle {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for MediaHandle {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<String> for MediaHandle {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

impl From<&Path> for MediaHandle {
    fn from(path: &Path) -> Self {
        Self(path.to_string_lossy().into_owned())
    }
}

impl fmt::Display for MediaHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// On-disk location and size of a resolved media handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaMetadata {
    pub absolute_path: PathBuf,
    pub size_bytes: u64,
}

impl MediaMetadata {
    pub fn new(absolute_path: impl Into<PathBuf>, size_bytes: u64) -> Self {
        Self {
            absolute_path: absolute_path.into(),
            size_bytes,
        }
    }

    /// A handle only resolves when it has a non-empty path and a positive size.
    pub fn is_valid(&self) -> bool {
        self.size_bytes > 0 && !self.absolute_path.as_os_str().is_empty()
    }

    /// Lowercased file extension, if the path has one.
    pub fn extension(&self) -> Option<String> {
        self.absolute_path
            .extension()
            .and_then(|ext| ext.to_str())
            .filter(|ext| !ext.is_empty())
            .map(|ext| ext.to_lowercase())
    }
}
