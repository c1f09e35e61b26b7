// S3 client backed by rust-s3, path-style addressing, public-read objects

use async_trait::async_trait;
use bytes::Bytes;
use s3::{creds::Credentials as S3Credentials, region::Region, Bucket};
use tracing::debug;

use super::{ObjectStore, UploadedObject};
use crate::config::StorageConfig;
use crate::credentials::Credentials;
use crate::types::{AppError, AppResult};

pub struct S3Client {
    bucket: Bucket,
    endpoint: String,
}

impl S3Client {
    pub fn new(config: &StorageConfig, credentials: &Credentials) -> AppResult<Self> {
        let region = Region::Custom {
            region: config.region.clone(),
            endpoint: config.endpoint.clone(),
        };
        let s3_credentials = S3Credentials::new(
            Some(&credentials.access_key_id),
            Some(&credentials.secret_access_key),
            None,
            None,
            None,
        )
        .map_err(|e| AppError::Upload(format!("invalid storage credentials: {}", e)))?;

        let mut bucket = Bucket::new(&config.bucket, region, s3_credentials)
            .map_err(|e| AppError::Upload(format!("invalid bucket configuration: {}", e)))?
            .with_path_style();
        bucket.add_header("x-amz-acl", "public-read");

        Ok(Self {
            bucket,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
        })
    }

    /// Path-style public URL of an object
    pub fn object_url(&self, key: &str) -> String {
        object_url(&self.endpoint, &self.bucket.name, key)
    }
}

pub fn object_url(endpoint: &str, bucket: &str, key: &str) -> String {
    format!("{}/{}/{}", endpoint.trim_end_matches('/'), bucket, key)
}

#[async_trait]
impl ObjectStore for S3Client {
    async fn put_object(&self, key: &str, body: Bytes, content_type: &str) -> AppResult<UploadedObject> {
        let response = self
            .bucket
            .put_object_with_content_type(key, &body, content_type)
            .await
            .map_err(|e| AppError::Upload(e.to_string()))?;

        let status = response.status_code();
        debug!("PUT {} -> {}", key, status);
        if !(200..300).contains(&status) {
            let body = String::from_utf8_lossy(response.as_slice()).into_owned();
            return Err(AppError::Upload(format!("storage returned {}: {}", status, body)));
        }

        Ok(UploadedObject {
            key: key.to_string(),
            url: self.object_url(key),
        })
    }
}
