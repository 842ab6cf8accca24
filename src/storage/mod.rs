// Storage layer (S3-compatible)

use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tokio::fs;

pub mod s3_client;
pub mod sniff;

pub use s3_client::*;
pub use sniff::sniff_content_type;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Failed to read {}: {source}", path.display())]
    LocalRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Upload of {key} failed: {reason}")]
    Upload { key: String, reason: String },

    #[error("Storage configuration error: {0}")]
    Config(String),
}

/// File content read fully into memory, with its sniffed content type.
#[derive(Debug, Clone)]
pub struct ObjectPayload {
    pub body: Bytes,
    pub content_type: String,
}

impl ObjectPayload {
    pub async fn read(path: &Path) -> Result<Self, StorageError> {
        let body = fs::read(path).await.map_err(|source| StorageError::LocalRead {
            path: path.to_path_buf(),
            source,
        })?;
        let content_type = sniff_content_type(&body, path);

        Ok(Self {
            body: Bytes::from(body),
            content_type,
        })
    }

    pub fn content_length(&self) -> usize {
        self.body.len()
    }
}

/// A single PutObject request.
#[derive(Debug, Clone)]
pub struct ObjectUpload {
    pub bucket: String,
    pub key: String,
    pub acl: String,
    pub content_type: String,
    pub content_length: usize,
    pub body: Bytes,
}

#[async_trait]
pub trait StorageAdapter: Send + Sync {
    /// Transfer one object. `content_length` always equals `body.len()`.
    async fn put_object(&self, upload: ObjectUpload) -> Result<(), StorageError>;

    /// Read `local_path` fully, sniff its content type and upload it to
    /// `bucket` under `remote_key` with the canned `acl`.
    async fn put(
        &self,
        bucket: &str,
        local_path: &Path,
        remote_key: &str,
        acl: &str,
    ) -> Result<(), StorageError> {
        let payload = ObjectPayload::read(local_path).await?;

        self.put_object(ObjectUpload {
            bucket: bucket.to_string(),
            key: remote_key.to_string(),
            acl: acl.to_string(),
            content_type: payload.content_type.clone(),
            content_length: payload.content_length(),
            body: payload.body,
        })
        .await
    }
}

/// Stand-in for runs that never reach storage, such as dry runs without
/// credentials. Every transfer is refused.
pub struct UnconfiguredStorage;

#[async_trait]
impl StorageAdapter for UnconfiguredStorage {
    async fn put_object(&self, upload: ObjectUpload) -> Result<(), StorageError> {
        Err(StorageError::Config(format!(
            "no storage backend configured for {}",
            upload.key
        )))
    }
}
