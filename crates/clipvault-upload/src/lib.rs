//! Clipvault Upload Library
//!
//! The guarded upload workflow: resolve a media handle to a file
//! ([`MediaLocator`]), check the durable "uploaded" gate ([`UploadGuard`]),
//! stream the file to object storage and record completion
//! ([`UploadCoordinator`]).

pub mod coordinator;
pub mod error;
pub mod guard;
pub mod locator;
pub mod state;

pub use coordinator::{UploadCoordinator, UploadSettings};
pub use error::UploadError;
pub use guard::{GuardError, UploadGuard};
pub use locator::{
    ColumnValue, ContentIndex, FsContentIndex, IndexCursor, IndexError, LocatorError,
    MediaColumn, MediaLocator, MemoryCursor,
};
pub use state::{JsonFileStore, KeyValueStore, MemoryStore, StateError};
