// S3 client backed by rust-s3

use async_trait::async_trait;
use s3::bucket::Bucket;
use s3::creds::Credentials;
use s3::region::Region;
use tracing::debug;

use super::{ObjectUpload, StorageAdapter, StorageError};
use crate::config::StorageConfig;

/// Header carrying the canned ACL on PutObject.
const ACL_HEADER: &str = "x-amz-acl";

/// Works with AWS S3, MinIO, DigitalOcean Spaces or any S3-compatible
/// endpoint. One client is shared by every upload of a run.
pub struct S3Client {
    region: Region,
    credentials: Credentials,
    path_style: bool,
}

impl S3Client {
    pub fn new(config: &StorageConfig) -> Result<Self, StorageError> {
        let region = Region::Custom {
            region: config.region.clone(),
            endpoint: config.endpoint.clone(),
        };
        let credentials = Credentials::new(
            Some(config.access_key.as_str()),
            Some(config.secret_key.as_str()),
            None,
            None,
            None,
        )
        .map_err(|e| StorageError::Config(format!("invalid credentials: {}", e)))?;

        Ok(Self {
            region,
            credentials,
            path_style: config.path_style,
        })
    }

    fn bucket(&self, name: &str, acl: &str) -> Result<Bucket, StorageError> {
        let mut bucket = Bucket::new(name, self.region.clone(), self.credentials.clone())
            .map_err(|e| StorageError::Config(format!("bucket {name:?}: {e}")))?;
        if self.path_style {
            bucket = bucket.with_path_style();
        }
        bucket.add_header(ACL_HEADER, acl);
        Ok(bucket)
    }
}

#[async_trait]
impl StorageAdapter for S3Client {
    async fn put_object(&self, upload: ObjectUpload) -> Result<(), StorageError> {
        let bucket = self.bucket(&upload.bucket, &upload.acl)?;

        let response = bucket
            .put_object_with_content_type(&upload.key, &upload.body, &upload.content_type)
            .await
            .map_err(|e| StorageError::Upload {
                key: upload.key.clone(),
                reason: e.to_string(),
            })?;

        let status = response.status_code();
        if !(200..300).contains(&status) {
            return Err(StorageError::Upload {
                key: upload.key,
                reason: format!(
                    "HTTP {}: {}",
                    status,
                    String::from_utf8_lossy(response.as_slice())
                ),
            });
        }

        debug!(
            bucket = %upload.bucket,
            key = %upload.key,
            content_type = %upload.content_type,
            bytes = upload.content_length,
            "PutObject complete"
        );
        Ok(())
    }
}
