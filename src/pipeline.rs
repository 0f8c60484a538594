//! Import actions over batch locations
//!
//! [`Pipeline`] ties a [`SourceResolver`] to a [`RecordImporter`]: it resolves a
//! location (local file or folder, remote object or prefix, or the keys named by a
//! queue notification) into raw batches and imports them one after the other,
//! stopping at the first batch that fails.

use crate::error::Result;
use crate::importer::RecordImporter;
use crate::queue::BatchPointer;
use crate::source::SourceResolver;
use crate::types::ImportSummary;
use std::path::Path;
use tracing::{info, warn};

/// Sequential batch importer over local and remote sources
pub struct Pipeline {
    importer: RecordImporter,
    sources: SourceResolver,
}

impl Pipeline {
    /// Create a pipeline
    pub fn new(importer: RecordImporter, sources: SourceResolver) -> Self {
        Self { importer, sources }
    }

    /// Records delivered since the pipeline was created
    pub fn delivered(&self) -> u64 {
        self.importer.channel().delivered()
    }

    /// Import a single local batch file
    pub async fn import_local_file(&mut self, path: &Path) -> Result<ImportSummary> {
        let mut summary = ImportSummary::default();
        self.local_batch(path, &mut summary).await?;
        Ok(summary)
    }

    /// Import every `.json.gz` file under a local directory, recursively
    pub async fn import_local_folder(&mut self, dir: &Path) -> Result<ImportSummary> {
        let files = self.sources.list_local(dir).await?;
        if files.is_empty() {
            warn!(dir = %dir.display(), "no batch files found");
        }

        let mut summary = ImportSummary::default();
        for path in &files {
            self.local_batch(path, &mut summary).await?;
        }
        Ok(summary)
    }

    /// Import a single remote object
    pub async fn import_remote_object(&mut self, bucket: &str, key: &str) -> Result<ImportSummary> {
        let mut summary = ImportSummary::default();
        self.remote_batch(bucket, key, &mut summary).await?;
        Ok(summary)
    }

    /// Import every object directly under a remote prefix
    pub async fn import_remote_prefix(
        &mut self,
        bucket: &str,
        prefix: &str,
    ) -> Result<ImportSummary> {
        let keys = self.sources.list_remote(bucket, prefix).await?;
        if keys.is_empty() {
            warn!(bucket = bucket, prefix = prefix, "no objects found");
        }
        self.remote_batches(bucket, &keys).await
    }

    /// Import the batches a queue notification points at, in listed order
    pub async fn import_pointer(&mut self, pointer: &BatchPointer) -> Result<ImportSummary> {
        self.remote_batches(&pointer.bucket, &pointer.keys).await
    }

    /// Close the sink connection
    pub async fn close(&mut self) {
        self.importer.close().await;
    }

    async fn remote_batches(&mut self, bucket: &str, keys: &[String]) -> Result<ImportSummary> {
        let mut summary = ImportSummary::default();
        for key in keys {
            self.remote_batch(bucket, key, &mut summary).await?;
        }
        Ok(summary)
    }

    async fn local_batch(&mut self, path: &Path, summary: &mut ImportSummary) -> Result<()> {
        info!(file = %path.display(), "importing file");
        let raw = self.sources.fetch_local(path).await?;
        summary.add(self.importer.import_batch(&raw).await?);
        Ok(())
    }

    async fn remote_batch(
        &mut self,
        bucket: &str,
        key: &str,
        summary: &mut ImportSummary,
    ) -> Result<()> {
        info!(bucket = bucket, key = key, "importing object");
        let raw = self.sources.fetch_remote(bucket, key).await?;
        summary.add(self.importer.import_batch(&raw).await?);
        Ok(())
    }
}
