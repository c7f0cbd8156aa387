//! File system artifact store implementation

use crate::*;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::io::{self, ErrorKind};
use std::path::Path;
use std::sync::Arc;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::naming::MAX_SEQUENCE;

/// Source of capture instants for new versions
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

const STAGED_SUFFIX: &str = "partial";

/// File system artifact store.
///
/// Stores every upload as a file under `root/organization/project/type`.
/// Bytes are written to `root/.staging` first and hard-linked into the
/// artifact directory once complete; linking fails rather than overwriting,
/// which is what disambiguates uploads landing in the same second.
pub struct FileSystemArtifactStore {
    paths: PathBuilder,
    resolver: LatestResolver,
    clock: Clock,
}

impl FileSystemArtifactStore {
    /// Create a new file system artifact store
    pub fn new(root: impl Into<PathBuf>, policy: LatestPolicy) -> Self {
        Self {
            paths: PathBuilder::new(root),
            resolver: LatestResolver::new(policy),
            clock: Arc::new(Utc::now),
        }
    }

    /// Replace the clock used to stamp new versions
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn paths(&self) -> &PathBuilder {
        &self.paths
    }

    /// Create the storage root and staging area, and remove staged files
    /// left behind by a previous process. Returns how many were removed.
    pub async fn prepare(&self) -> Result<usize> {
        fs::create_dir_all(self.paths.staging_dir())
            .await
            .map_err(ArtifactError::StorageUnavailable)?;
        self.purge_staging().await
    }

    /// Remove leftover `*.partial` files from the staging directory
    pub async fn purge_staging(&self) -> Result<usize> {
        let staging = self.paths.staging_dir();
        let mut entries = match fs::read_dir(&staging).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(ArtifactError::StorageUnavailable(e)),
        };

        let mut removed = 0;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(ArtifactError::StorageUnavailable)?
        {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) == Some(STAGED_SUFFIX) {
                fs::remove_file(&path)
                    .await
                    .map_err(ArtifactError::StorageUnavailable)?;
                removed += 1;
            }
        }

        if removed > 0 {
            tracing::info!(removed, "Purged stale staged uploads");
        }
        Ok(removed)
    }

    /// Link the staged file into `dir`, bumping the sequence on collision.
    async fn publish(
        &self,
        staged: &Path,
        dir: &Path,
        mut version: ArtifactVersion,
    ) -> Result<(ArtifactVersion, PathBuf)> {
        loop {
            let target = dir.join(version.file_name());
            match fs::hard_link(staged, &target).await {
                Ok(()) => return Ok((version, target)),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if version.sequence >= MAX_SEQUENCE {
                        return Err(ArtifactError::WriteFailed(io::Error::new(
                            ErrorKind::AlreadyExists,
                            format!(
                                "more than {} uploads of {} within one second",
                                MAX_SEQUENCE, version.base_name
                            ),
                        )));
                    }
                    tracing::debug!(
                        file_name = %version.file_name(),
                        "Version name taken, retrying with next sequence"
                    );
                    version = version.with_sequence(version.sequence + 1);
                }
                Err(e) => return Err(ArtifactError::StorageUnavailable(e)),
            }
        }
    }
}

#[async_trait]
impl ArtifactStore for FileSystemArtifactStore {
    async fn put(
        &self,
        key: &ArtifactKey,
        raw_filename: &str,
        reader: &mut (dyn AsyncRead + Send + Unpin),
        size_limit: u64,
    ) -> Result<StoredArtifact> {
        // Captured once, before any I/O
        let captured_at = (self.clock)();
        let version = VersionNamer::name(raw_filename, captured_at)?;

        let dir = self.paths.ensure_artifact_dir(key).await?;
        let mut staged = StagedFile::create(&self.paths.staging_dir()).await?;

        let bytes_written = staged.fill(reader, size_limit).await?;
        let (version, path) = self.publish(staged.path(), &dir, version).await?;

        // Dropping the guard unlinks the staging name; the published link remains
        drop(staged);

        let file_name = version.file_name();
        tracing::debug!(key = %key, file_name = %file_name, bytes_written, "Stored artifact");

        Ok(StoredArtifact {
            file_name,
            path,
            bytes_written,
        })
    }

    async fn get_latest(&self, key: &ArtifactKey) -> Result<LatestArtifact> {
        let relabel = |e: ArtifactError| match e {
            ArtifactError::NotFound(_) => ArtifactError::NotFound(key.to_string()),
            other => other,
        };

        let dir = self.paths.existing_artifact_dir(key).await?;
        let file_name = self.resolver.resolve(&dir).await.map_err(relabel)?;

        let file = match fs::File::open(dir.join(&file_name)).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(ArtifactError::NotFound(key.to_string()));
            }
            Err(e) => return Err(ArtifactError::StorageUnavailable(e)),
        };
        let size_bytes = file
            .metadata()
            .await
            .map_err(ArtifactError::StorageUnavailable)?
            .len();

        Ok(LatestArtifact {
            file_name,
            size_bytes,
            reader: Box::new(file),
        })
    }

    async fn health_check(&self) -> Result<()> {
        let meta = fs::metadata(self.paths.root())
            .await
            .map_err(ArtifactError::StorageUnavailable)?;
        if !meta.is_dir() {
            return Err(ArtifactError::StorageUnavailable(io::Error::new(
                ErrorKind::NotADirectory,
                format!("{} is not a directory", self.paths.root().display()),
            )));
        }
        Ok(())
    }
}

/// An upload being spooled into the staging directory.
///
/// The staged file is removed when the guard drops, on every exit path,
/// including a cancelled request future.
struct StagedFile {
    path: PathBuf,
    file: Option<fs::File>,
}

impl StagedFile {
    async fn create(staging_dir: &Path) -> Result<Self> {
        fs::create_dir_all(staging_dir)
            .await
            .map_err(ArtifactError::StorageUnavailable)?;

        let path = staging_dir.join(format!("{}.{}", uuid::Uuid::new_v4(), STAGED_SUFFIX));
        let file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(ArtifactError::StorageUnavailable)?;

        Ok(Self {
            path,
            file: Some(file),
        })
    }

    fn path(&self) -> &Path {
        &self.path
    }

    /// Copy `reader` into the staged file, accepting at most `size_limit` bytes.
    async fn fill(
        &mut self,
        reader: &mut (dyn AsyncRead + Send + Unpin),
        size_limit: u64,
    ) -> Result<u64> {
        let Some(mut file) = self.file.take() else {
            return Err(ArtifactError::WriteFailed(io::Error::other(
                "staged file already written",
            )));
        };

        // One byte past the limit is enough to tell an oversized stream apart
        let mut limited = reader.take(size_limit.saturating_add(1));
        let copied = tokio::io::copy(&mut limited, &mut file)
            .await
            .map_err(|e| copy_error(e, size_limit))?;

        if copied > size_limit {
            return Err(ArtifactError::PayloadTooLarge { limit: size_limit });
        }

        file.flush().await.map_err(ArtifactError::WriteFailed)?;
        file.sync_all().await.map_err(ArtifactError::WriteFailed)?;

        Ok(copied)
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        self.file.take();
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != ErrorKind::NotFound {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to remove staged upload");
            }
        }
    }
}

/// Upstream body limits surface as `FileTooLarge` read errors.
fn copy_error(e: io::Error, size_limit: u64) -> ArtifactError {
    if e.kind() == ErrorKind::FileTooLarge {
        ArtifactError::PayloadTooLarge { limit: size_limit }
    } else {
        ArtifactError::WriteFailed(e)
    }
}
