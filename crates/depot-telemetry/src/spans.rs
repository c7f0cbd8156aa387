//! Span creation helpers for artifact uploads and downloads

use crate::attributes::*;
use tracing::Span;
use tracing::field::Empty;

/// Attributes identifying the artifact an operation touches
#[derive(Debug, Clone)]
pub struct ArtifactSpanAttributes {
    pub organization: String,
    pub project: String,
    pub artifact_type: String,
}

/// Create a span for an upload.
///
/// The version and size fields start empty; record them once the upload has
/// been stored:
///
/// ```ignore
/// span.record(DEPOT_VERSION, file_name.as_str());
/// span.record(DEPOT_SIZE_BYTES, bytes_written);
/// ```
pub fn trace_upload(attrs: &ArtifactSpanAttributes) -> Span {
    tracing::info_span!(
        "upload_artifact",
        { DEPOT_OPERATION_NAME } = "upload",
        { DEPOT_ORGANIZATION } = %attrs.organization,
        { DEPOT_PROJECT } = %attrs.project,
        { DEPOT_TYPE } = %attrs.artifact_type,
        { DEPOT_VERSION } = Empty,
        { DEPOT_SIZE_BYTES } = Empty,
    )
}

/// Create a span for a download of the latest version.
pub fn trace_download(attrs: &ArtifactSpanAttributes) -> Span {
    tracing::info_span!(
        "download_artifact",
        { DEPOT_OPERATION_NAME } = "download",
        { DEPOT_ORGANIZATION } = %attrs.organization,
        { DEPOT_PROJECT } = %attrs.project,
        { DEPOT_TYPE } = %attrs.artifact_type,
        { DEPOT_VERSION } = Empty,
        { DEPOT_SIZE_BYTES } = Empty,
    )
}
