//! Public object storage for branding assets.
//!
//! A bucket is a directory under the storage root; every object in it is
//! publicly readable at `<public_url>/storage/<bucket>/<path>`, served by the
//! router's static file service.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tracing::info;

use super::BackendError;

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Store `bytes` at `bucket/path`, replacing any previous object, and
    /// return its public URL.
    async fn upload(&self, bucket: &str, path: &str, bytes: Vec<u8>) -> Result<String, BackendError>;
}

pub struct LocalBucket {
    root: PathBuf,
    public_url: String,
}

impl LocalBucket {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, public_url: &str) -> Self {
        Self { root: root.into(), public_url: public_url.trim_end_matches('/').to_owned() }
    }

    #[must_use]
    pub fn public_url_for(&self, bucket: &str, path: &str) -> String {
        format!("{}/storage/{bucket}/{path}", self.public_url)
    }
}

/// Only plain relative segments are accepted; `..`, absolute paths and empty
/// segments would escape or alias the bucket.
pub(crate) fn is_safe_object_path(path: &str) -> bool {
    !path.is_empty()
        && !path.contains('\\')
        && !path
            .split('/')
            .any(|segment| segment.is_empty() || segment == "." || segment == "..")
        && Path::new(path)
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
}

#[async_trait]
impl ObjectStorage for LocalBucket {
    async fn upload(&self, bucket: &str, path: &str, bytes: Vec<u8>) -> Result<String, BackendError> {
        if !is_safe_object_path(bucket) || bucket.contains('/') || !is_safe_object_path(path) {
            return Err(BackendError::Rejected(format!("invalid object path: {bucket}/{path}")));
        }

        let target = self.root.join(bucket).join(path);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let size = bytes.len();
        tokio::fs::write(&target, bytes).await?;

        info!(%bucket, %path, size, "storage: object written");
        Ok(self.public_url_for(bucket, path))
    }
}

#[cfg(test)]
#[path = "storage_test.rs"]
mod tests;
