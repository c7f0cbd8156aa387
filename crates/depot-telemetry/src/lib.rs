//! # Depot Telemetry
//!
//! Structured logging and OpenTelemetry tracing for the artifact store.
//!
//! Upload and download spans carry the artifact key and version so a single
//! request can be followed from the HTTP layer down to the file it touched.

mod spans;
mod tracer;

pub use spans::{ArtifactSpanAttributes, trace_download, trace_upload};
pub use tracer::{flush_telemetry, init_telemetry, register_span_processor, tracer_provider};

/// Span attribute names for artifact operations.
pub mod attributes {
    pub const DEPOT_OPERATION_NAME: &str = "depot.operation.name";
    pub const DEPOT_ORGANIZATION: &str = "depot.artifact.organization";
    pub const DEPOT_PROJECT: &str = "depot.artifact.project";
    pub const DEPOT_TYPE: &str = "depot.artifact.type";
    pub const DEPOT_VERSION: &str = "depot.artifact.version";
    pub const DEPOT_SIZE_BYTES: &str = "depot.artifact.size_bytes";
}
