pub mod media;
pub mod upload;

pub use media::{MediaHandle, MediaMetadata};
pub use upload::{GatePolicy, UploadOutcome, UploadProgress};
