//! Configuration module
//!
//! Storage backend and upload workflow settings, read from the environment
//! (and a `.env` file when present).

use std::env;
use std::path::PathBuf;

use crate::constants::{
    DEFAULT_UPLOAD_NAMESPACE, DEFAULT_VIDEO_EXTENSION, MAX_CHUNK_BYTES,
    MIN_MULTIPART_CHUNK_BYTES,
};
use crate::models::GatePolicy;
use crate::storage_types::StorageBackend;

const DATA_DIR: &str = "./clipvault-data";
const CHUNK_SIZE_KB: usize = 5 * 1024;

/// Remote object store settings
#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>, // Custom endpoint for S3-compatible providers (MinIO, etc.)
    pub aws_region: Option<String>,
    pub local_storage_path: PathBuf,
    pub local_storage_base_url: Option<String>,
    pub chunk_size_bytes: usize,
}

/// Upload workflow settings
#[derive(Clone, Debug)]
pub struct UploadConfig {
    pub namespace: String,
    pub state_path: PathBuf,
    pub gate_policy: GatePolicy,
    pub unique_keys: bool,
    pub default_extension: String,
}

#[derive(Clone, Debug)]
pub struct UploaderConfig {
    pub storage: StorageConfig,
    pub upload: UploadConfig,
}

impl Default for UploaderConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig {
                backend: StorageBackend::Local,
                s3_bucket: None,
                s3_region: None,
                s3_endpoint: None,
                aws_region: None,
                local_storage_path: PathBuf::from(DATA_DIR).join("objects"),
                local_storage_base_url: None,
                chunk_size_bytes: CHUNK_SIZE_KB * 1024,
            },
            upload: UploadConfig {
                namespace: DEFAULT_UPLOAD_NAMESPACE.to_string(),
                state_path: PathBuf::from(DATA_DIR).join("upload_prefs.json"),
                gate_policy: GatePolicy::Global,
                unique_keys: false,
                default_extension: DEFAULT_VIDEO_EXTENSION.to_string(),
            },
        }
    }
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config(pub Box<UploaderConfig>);

impl Config {
    fn as_uploader(&self) -> &UploaderConfig {
        &self.0
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        let config = UploaderConfig::from_env()?;
        Ok(Config(Box::new(config)))
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.as_uploader().validate()
    }

    pub fn storage(&self) -> &StorageConfig {
        &self.as_uploader().storage
    }

    pub fn upload(&self) -> &UploadConfig {
        &self.as_uploader().upload
    }

    pub fn storage_backend(&self) -> StorageBackend {
        self.storage().backend
    }

    pub fn s3_bucket(&self) -> Option<&str> {
        self.storage().s3_bucket.as_deref()
    }

    pub fn s3_region(&self) -> Option<&str> {
        self.storage().s3_region.as_deref()
    }

    pub fn s3_endpoint(&self) -> Option<&str> {
        self.storage().s3_endpoint.as_deref()
    }

    pub fn aws_region(&self) -> Option<&str> {
        self.storage().aws_region.as_deref()
    }

    pub fn local_storage_path(&self) -> &std::path::Path {
        &self.storage().local_storage_path
    }

    /// Base URL for local receipts; defaults to a `file://` URL of the storage root.
    pub fn local_storage_base_url(&self) -> String {
        self.storage()
            .local_storage_base_url
            .clone()
            .unwrap_or_else(|| format!("file://{}", self.local_storage_path().display()))
    }

    pub fn chunk_size_bytes(&self) -> usize {
        self.storage().chunk_size_bytes
    }

    pub fn upload_namespace(&self) -> &str {
        &self.upload().namespace
    }

    pub fn state_path(&self) -> &std::path::Path {
        &self.upload().state_path
    }

    pub fn gate_policy(&self) -> GatePolicy {
        self.upload().gate_policy
    }

    pub fn unique_keys(&self) -> bool {
        self.upload().unique_keys
    }

    pub fn default_extension(&self) -> &str {
        &self.upload().default_extension
    }
}

impl UploaderConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_vars(|name| env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    pub fn from_vars<F>(var: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = UploaderConfig::default();

        let backend = match var("STORAGE_BACKEND") {
            Some(raw) => raw.parse::<StorageBackend>()?,
            None => defaults.storage.backend,
        };

        let chunk_size_kb = var("UPLOAD_CHUNK_SIZE_KB")
            .unwrap_or_else(|| CHUNK_SIZE_KB.to_string())
            .parse::<usize>()
            .map_err(|_| anyhow::anyhow!("UPLOAD_CHUNK_SIZE_KB must be a valid number"))?;

        let chunk_size_bytes = chunk_size_kb
            .checked_mul(1024)
            .ok_or_else(|| anyhow::anyhow!("UPLOAD_CHUNK_SIZE_KB is too large"))?;

        let unique_keys = match var("UPLOAD_UNIQUE_KEYS") {
            Some(raw) => raw.trim().to_lowercase().parse::<bool>().map_err(|_| {
                anyhow::anyhow!("UPLOAD_UNIQUE_KEYS must be true or false, got {:?}", raw)
            })?,
            None => defaults.upload.unique_keys,
        };

        let gate_policy = match var("UPLOAD_GATE_POLICY") {
            Some(raw) => raw.parse::<GatePolicy>()?,
            None => defaults.upload.gate_policy,
        };

        let storage = StorageConfig {
            backend,
            s3_bucket: var("S3_BUCKET"),
            s3_region: var("S3_REGION"),
            s3_endpoint: var("S3_ENDPOINT"),
            aws_region: var("AWS_REGION"),
            local_storage_path: var("LOCAL_STORAGE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.storage.local_storage_path),
            local_storage_base_url: var("LOCAL_STORAGE_BASE_URL"),
            chunk_size_bytes,
        };

        let upload = UploadConfig {
            namespace: var("UPLOAD_NAMESPACE")
                .map(|s| s.trim().trim_matches('/').to_string())
                .unwrap_or(defaults.upload.namespace),
            state_path: var("UPLOAD_STATE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.upload.state_path),
            gate_policy,
            unique_keys,
            default_extension: var("UPLOAD_DEFAULT_EXTENSION")
                .map(|s| s.trim().trim_start_matches('.').to_lowercase())
                .filter(|s| !s.is_empty())
                .unwrap_or(defaults.upload.default_extension),
        };

        Ok(UploaderConfig { storage, upload })
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.upload.namespace.is_empty() {
            return Err(anyhow::anyhow!("UPLOAD_NAMESPACE must not be empty"));
        }
        if self.upload.namespace.contains("..") {
            return Err(anyhow::anyhow!("UPLOAD_NAMESPACE must not contain '..'"));
        }
        if self.storage.chunk_size_bytes == 0 {
            return Err(anyhow::anyhow!("UPLOAD_CHUNK_SIZE_KB must be greater than 0"));
        }
        if self.storage.chunk_size_bytes as u64 > MAX_CHUNK_BYTES {
            return Err(anyhow::anyhow!(
                "UPLOAD_CHUNK_SIZE_KB must be at most {}",
                MAX_CHUNK_BYTES / 1024
            ));
        }

        if self.storage.backend == StorageBackend::S3 {
            if self.storage.s3_bucket.is_none() {
                return Err(anyhow::anyhow!(
                    "S3_BUCKET must be set when STORAGE_BACKEND is s3"
                ));
            }
            if self.storage.s3_region.is_none() && self.storage.aws_region.is_none() {
                return Err(anyhow::anyhow!(
                    "S3_REGION or AWS_REGION must be set when STORAGE_BACKEND is s3"
                ));
            }
            if self.storage.chunk_size_bytes < MIN_MULTIPART_CHUNK_BYTES {
                return Err(anyhow::anyhow!(
                    "UPLOAD_CHUNK_SIZE_KB must be at least {} for S3 multipart uploads",
                    MIN_MULTIPART_CHUNK_BYTES / 1024
                ));
            }
        }

        Ok(())
    }
}
