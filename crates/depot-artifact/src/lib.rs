//! # Depot Artifact Store
//!
//! Versioned storage of uploaded files on the local file system.
//! Artifacts are identified by an organization, a project and a type; every
//! upload under that triple becomes a new, timestamped version.
//!
//! ## Layout
//!
//! ```text
//! {root}/{organization}/{project}/{type}/{base}.{YYYY-MM-DD-HH-MM-SS}[_{NNN}][.{ext}]
//! {root}/.staging/{uuid}.partial
//! ```
//!
//! Uploads are spooled into the staging directory and linked into place
//! only once complete, so a version never appears half-written.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use tokio::io::AsyncRead;

mod filesystem;
mod key;
mod latest;
mod naming;
mod path;
mod service;

pub use filesystem::{Clock, FileSystemArtifactStore};
pub use key::ArtifactKey;
pub use latest::{LatestResolver, VersionSelector};
pub use naming::{ArtifactVersion, VersionNamer};
pub use path::PathBuilder;
pub use service::*;

pub use depot_core::LatestPolicy;

/// Errors that can occur during artifact operations
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("Invalid artifact key: {0}")]
    InvalidKey(String),

    #[error("Invalid filename: {0}")]
    InvalidFilename(String),

    #[error("File too large. Maximum is {limit} bytes")]
    PayloadTooLarge { limit: u64 },

    #[error("Artifact not found: {0}")]
    NotFound(String),

    #[error("Unsupported version: {0}")]
    UnsupportedVersion(String),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(#[source] std::io::Error),

    #[error("Write failed: {0}")]
    WriteFailed(#[source] std::io::Error),
}

impl ArtifactError {
    /// Whether the failure is the caller's fault rather than the server's
    pub fn is_client_error(&self) -> bool {
        !matches!(
            self,
            Self::StorageUnavailable(_) | Self::WriteFailed(_)
        )
    }
}

/// Result type for artifact operations
pub type Result<T> = std::result::Result<T, ArtifactError>;

/// Outcome of a successful upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredArtifact {
    /// Versioned file name inside the artifact directory
    pub file_name: String,
    /// Full path of the stored file
    pub path: PathBuf,
    pub bytes_written: u64,
}

/// An open handle on the latest version of an artifact.
///
/// The reader is owned by the caller and closed when dropped.
pub struct LatestArtifact {
    pub file_name: String,
    pub size_bytes: u64,
    pub reader: Box<dyn AsyncRead + Send + Unpin>,
}

impl fmt::Debug for LatestArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LatestArtifact")
            .field("file_name", &self.file_name)
            .field("size_bytes", &self.size_bytes)
            .finish_non_exhaustive()
    }
}
