//! Clipvault Core Library
//!
//! This crate provides the domain types, configuration and clock abstraction
//! shared by the storage, upload and CLI crates.

pub mod clock;
pub mod config;
pub mod constants;
pub mod models;
pub mod storage_types;

// Re-export commonly used types
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{Config, StorageConfig, UploadConfig, UploaderConfig};
pub use models::{GatePolicy, MediaHandle, MediaMetadata, UploadOutcome, UploadProgress};
pub use storage_types::StorageBackend;
