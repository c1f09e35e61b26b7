//! Object storage (S3-compatible)
//!
//! Uploads the job's input files to the bucket the inference handlers read
//! from. Objects are public-read and addressed path-style.

pub mod s3_client;

pub use s3_client::*;

use async_trait::async_trait;
use bytes::Bytes;
use futures::future::try_join_all;
use std::path::{Path, PathBuf};
use tracing::{error, info};

use crate::types::{AppError, AppResult};

/// An object written to the bucket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedObject {
    pub key: String,
    pub url: String,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put_object(&self, key: &str, body: Bytes, content_type: &str) -> AppResult<UploadedObject>;
}

/// A local file and the key it is stored under
#[derive(Debug, Clone)]
pub struct UploadSource {
    pub path: PathBuf,
    pub key: String,
}

impl UploadSource {
    /// Pair a file with a fresh random key that keeps its extension.
    pub fn new(path: impl Into<PathBuf>, prefix: Option<&str>) -> Self {
        let path = path.into();
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let key = crate::keygen::object_key(prefix, &file_name);
        Self { path, key }
    }
}

pub fn content_type_for(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

/// Read a local file and store it under `key`.
pub async fn upload_file<S: ObjectStore + ?Sized>(
    store: &S,
    path: &Path,
    key: &str,
) -> AppResult<UploadedObject> {
    let body = tokio::fs::read(path)
        .await
        .map_err(|e| AppError::Upload(format!("cannot read {}: {}", path.display(), e)))?;
    let content_type = content_type_for(path);

    info!("Uploading {} ({} bytes) as {}", path.display(), body.len(), key);
    let uploaded = store.put_object(key, Bytes::from(body), &content_type).await?;
    info!("Upload Success: {}", uploaded.url);
    Ok(uploaded)
}

/// Upload every source concurrently.
///
/// Fails with the first error; objects that were already written stay in
/// the bucket.
pub async fn upload_all<S: ObjectStore + ?Sized>(
    store: &S,
    sources: &[UploadSource],
) -> AppResult<Vec<UploadedObject>> {
    let uploads = sources
        .iter()
        .map(|source| upload_file(store, &source.path, &source.key));

    try_join_all(uploads).await.map_err(|e| {
        error!("Upload Error: {}", e);
        e
    })
}
