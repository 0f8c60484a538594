//! Batch sources: local files and remote object storage
//!
//! [`SourceResolver`] is the single entry point the pipeline uses to obtain raw batch
//! bytes. Local paths are read from disk; remote `(bucket, key)` pairs go through an
//! [`ObjectStore`] collaborator, which is absent when the process only imports local
//! files.

mod local;
mod s3;

pub use local::{BATCH_SUFFIX, is_batch_file, read_batch, scan_batches};
pub use s3::S3ObjectStore;

use crate::error::FetchError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Trait for remote object storage
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Download an object's full contents
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, FetchError>;

    /// List object keys directly under `prefix`, excluding folder placeholders
    async fn list_objects(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, FetchError>;
}

/// Resolves batch locations to raw bytes
#[derive(Clone, Default)]
pub struct SourceResolver {
    store: Option<Arc<dyn ObjectStore>>,
}

impl SourceResolver {
    /// Resolver backed by an object store
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store: Some(store) }
    }

    /// Resolver that can only read local files
    pub fn local_only() -> Self {
        Self { store: None }
    }

    /// Read a local batch file
    pub async fn fetch_local(&self, path: &Path) -> Result<Vec<u8>, FetchError> {
        read_batch(path).await
    }

    /// Find batch files under a local directory, recursively, in a stable order
    pub async fn list_local(&self, dir: &Path) -> Result<Vec<PathBuf>, FetchError> {
        let root = dir.to_path_buf();
        tokio::task::spawn_blocking(move || scan_batches(&root))
            .await
            .map_err(|e| FetchError::LocalRead {
                path: dir.to_path_buf(),
                source: std::io::Error::other(e),
            })?
    }

    /// Download a remote batch
    ///
    /// # Errors
    /// [`FetchError::Unavailable`] when no object store is configured or the store
    /// cannot be reached; otherwise whatever the store reports.
    pub async fn fetch_remote(&self, bucket: &str, key: &str) -> Result<Vec<u8>, FetchError> {
        self.store()?.get_object(bucket, key).await
    }

    /// List remote batch keys under a prefix
    pub async fn list_remote(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, FetchError> {
        self.store()?.list_objects(bucket, prefix).await
    }

    fn store(&self) -> Result<&Arc<dyn ObjectStore>, FetchError> {
        self.store
            .as_ref()
            .ok_or_else(|| FetchError::Unavailable("no object store configured".to_string()))
    }
}
