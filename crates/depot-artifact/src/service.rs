//! Artifact store trait definition

use crate::*;
use async_trait::async_trait;

/// The artifact storage service trait.
///
/// An artifact is a lineage of files identified by an [`ArtifactKey`]. Each
/// upload adds a new version; downloads retrieve the latest one.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Store the bytes read from `reader` as a new version of `key`.
    ///
    /// At most `size_limit` bytes are accepted; anything larger fails with
    /// [`ArtifactError::PayloadTooLarge`] and leaves no version behind.
    async fn put(
        &self,
        key: &ArtifactKey,
        raw_filename: &str,
        reader: &mut (dyn AsyncRead + Send + Unpin),
        size_limit: u64,
    ) -> Result<StoredArtifact>;

    /// Open the latest version of `key` for streaming.
    async fn get_latest(&self, key: &ArtifactKey) -> Result<LatestArtifact>;

    /// Verify the backing storage is usable.
    async fn health_check(&self) -> Result<()>;
}
