use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// A single progress report for an in-flight transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadProgress {
    pub bytes_transferred: u64,
    pub total_bytes: u64,
}

impl UploadProgress {
    pub fn new(bytes_transferred: u64, total_bytes: u64) -> Self {
        Self {
            bytes_transferred,
            total_bytes,
        }
    }

    /// `floor(100 * transferred / total)`, for display only.
    ///
    /// Returns `None` when the total is unknown (zero).
    pub fn percent(&self) -> Option<u8> {
        if self.total_bytes == 0 {
            return None;
        }
        let pct = (self.bytes_transferred as u128 * 100) / self.total_bytes as u128;
        Some(pct.min(100) as u8)
    }
}

/// Non-error results of one upload invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    /// The gate was already closed; no transfer was attempted.
    AlreadyUploaded,
    /// The object was stored under the contained destination key.
    Uploaded(String),
    /// The transfer was cancelled before completing.
    Cancelled,
}

impl UploadOutcome {
    /// Human-readable message for the presentation layer.
    pub fn message(&self) -> String {
        match self {
            UploadOutcome::AlreadyUploaded => "Video already uploaded".to_string(),
            UploadOutcome::Uploaded(key) => format!("Upload succeeded: {}", key),
            UploadOutcome::Cancelled => "Upload cancelled".to_string(),
        }
    }
}

/// Scope of the "uploaded" gate.
///
/// `Global` closes the gate for every handle after the first successful upload.
/// `PerMedia` keeps one flag per handle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatePolicy {
    #[default]
    Global,
    PerMedia,
}

impl FromStr for GatePolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "global" => Ok(GatePolicy::Global),
            "per_media" | "per_file" => Ok(GatePolicy::PerMedia),
            _ => Err(anyhow::anyhow!("Invalid gate policy: {}", s)),
        }
    }
}

impl Display for GatePolicy {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            GatePolicy::Global => write!(f, "global"),
            GatePolicy::PerMedia => write!(f, "per_media"),
        }
    }
}
