//! Local filesystem batches

use crate::error::FetchError;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// File name suffix that identifies a batch file
pub const BATCH_SUFFIX: &str = ".json.gz";

/// Whether `path` names a batch file
pub fn is_batch_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.ends_with(BATCH_SUFFIX))
}

/// Read a batch file's raw bytes
pub async fn read_batch(path: &Path) -> Result<Vec<u8>, FetchError> {
    tokio::fs::read(path)
        .await
        .map_err(|source| FetchError::LocalRead {
            path: path.to_path_buf(),
            source,
        })
}

/// Recursively collect batch files under `root`
///
/// Entries are visited in file-name order within each directory, so repeated runs
/// over the same tree import batches in the same order. Other files are ignored.
pub fn scan_batches(root: &Path) -> Result<Vec<PathBuf>, FetchError> {
    let mut batches = Vec::new();

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            FetchError::LocalRead {
                path,
                source: e.into(),
            }
        })?;

        if entry.file_type().is_file() && is_batch_file(entry.path()) {
            batches.push(entry.into_path());
        }
    }

    debug!(root = %root.display(), count = batches.len(), "scanned for batch files");
    Ok(batches)
}
