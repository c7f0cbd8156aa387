//! Directory resolution for artifact keys

use crate::*;
use std::io::ErrorKind;
use std::path::Path;
use tokio::fs;

const STAGING_DIR: &str = ".staging";

/// Maps artifact keys to directories under a fixed storage root.
///
/// Directory structure: `root/organization/project/type`
#[derive(Debug, Clone)]
pub struct PathBuilder {
    root: PathBuf,
}

impl PathBuilder {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the directory path for an artifact. Performs no I/O.
    pub fn artifact_dir(&self, key: &ArtifactKey) -> PathBuf {
        key.segments()
            .iter()
            .fold(self.root.clone(), |dir, segment| dir.join(segment))
    }

    /// Directory where in-flight uploads are spooled
    pub fn staging_dir(&self) -> PathBuf {
        self.root.join(STAGING_DIR)
    }

    /// Write path: resolve the artifact directory, creating it if absent.
    pub async fn ensure_artifact_dir(&self, key: &ArtifactKey) -> Result<PathBuf> {
        let dir = self.artifact_dir(key);
        fs::create_dir_all(&dir)
            .await
            .map_err(ArtifactError::StorageUnavailable)?;
        Ok(dir)
    }

    /// Read path: resolve the artifact directory without creating anything.
    ///
    /// A missing directory means the key has never been uploaded to.
    pub async fn existing_artifact_dir(&self, key: &ArtifactKey) -> Result<PathBuf> {
        let dir = self.artifact_dir(key);
        match fs::metadata(&dir).await {
            Ok(meta) if meta.is_dir() => Ok(dir),
            Ok(_) => Err(ArtifactError::NotFound(key.to_string())),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(ArtifactError::NotFound(key.to_string()))
            }
            Err(e) => Err(ArtifactError::StorageUnavailable(e)),
        }
    }
}
