/// Namespace of the durable key-value document holding upload state.
pub const UPLOAD_PREFS_NAMESPACE: &str = "upload_prefs";

/// Key of the installation-wide "uploaded" flag.
pub const UPLOADED_FLAG_KEY: &str = "uploaded";

/// Logical collection destination keys are placed under.
pub const DEFAULT_UPLOAD_NAMESPACE: &str = "cameraVideos";

/// Extension used for destination keys when the source file has none.
pub const DEFAULT_VIDEO_EXTENSION: &str = "mp4";

/// Smallest part size S3 accepts for every part but the last one.
pub const MIN_MULTIPART_CHUNK_BYTES: usize = 5 * 1024 * 1024;

/// Largest part size S3 accepts, also the cap on the local read buffer.
pub const MAX_CHUNK_BYTES: u64 = 5 * 1024 * 1024 * 1024;
