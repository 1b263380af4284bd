//! Clipvault Storage Library
//!
//! This crate provides the remote object-storage abstraction used by the upload
//! workflow, with implementations for S3 (via `object_store`) and the local
//! filesystem.
//!
//! # Transfers
//!
//! [`Storage::put_file`] starts a transfer and returns a [`TransferHandle`]
//! right away. The backend drives the copy on a spawned task and reports through
//! a [`TransferReporter`]: zero or more progress events, then exactly one
//! terminal event (completed, failed or cancelled).
//!
//! # Storage key format
//!
//! Destination keys look like `{namespace}/video_{YYYYMMDD}_{HHMMSS}.{ext}`.
//! Keys must not contain `..` or a leading `/`. Key generation is centralized in
//! the `keys` module so all callers stay consistent.

pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;
pub mod transfer;

// Re-export commonly used types
pub use clipvault_core::StorageBackend;
pub use factory::create_storage;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use traits::{Storage, StorageError, StorageResult};
pub use transfer::{transfer_channel, PutReceipt, TransferEvent, TransferHandle, TransferReporter};
