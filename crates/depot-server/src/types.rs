use crate::error::AppError;
use depot_artifact::ArtifactKey;
use depot_telemetry::ArtifactSpanAttributes;
use serde::{Deserialize, Serialize};

/// Response header carrying the stored or served version file name
pub const ARTIFACT_VERSION_HEADER: &str = "x-artifact-version";

/// The `meta` field of an upload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UploadMeta {
    pub organization: String,
    pub project: String,
    #[serde(rename = "type")]
    pub artifact_type: String,
    /// Accepted but not stored
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    /// Accepted but ignored; uploads cannot choose their version
    #[serde(default)]
    pub version: Option<String>,
}

impl UploadMeta {
    /// Parse the JSON `meta` field
    pub fn from_json(bytes: &[u8]) -> Result<Self, AppError> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Err(AppError::InvalidMetadata("meta is empty".to_string()));
        }
        serde_json::from_slice(bytes).map_err(|e| AppError::InvalidMetadata(e.to_string()))
    }

    pub fn key(&self) -> Result<ArtifactKey, AppError> {
        Ok(ArtifactKey::new(
            &self.organization,
            &self.project,
            &self.artifact_type,
        )?)
    }

    pub fn span_attributes(&self) -> ArtifactSpanAttributes {
        ArtifactSpanAttributes {
            organization: self.organization.clone(),
            project: self.project.clone(),
            artifact_type: self.artifact_type.clone(),
        }
    }
}

/// Query string of `PUT /upload`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UploadQuery {
    pub access_key: Option<String>,
}

/// Query string of `GET /download`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DownloadQuery {
    pub access_key: Option<String>,
    pub organization: Option<String>,
    pub project: Option<String>,
    #[serde(rename = "type")]
    pub artifact_type: Option<String>,
    pub version: Option<String>,
}

impl DownloadQuery {
    pub fn key(&self) -> Result<ArtifactKey, AppError> {
        Ok(ArtifactKey::new(
            self.organization.as_deref().unwrap_or_default(),
            self.project.as_deref().unwrap_or_default(),
            self.artifact_type.as_deref().unwrap_or_default(),
        )?)
    }

    pub fn span_attributes(&self) -> ArtifactSpanAttributes {
        ArtifactSpanAttributes {
            organization: self.organization.clone().unwrap_or_default(),
            project: self.project.clone().unwrap_or_default(),
            artifact_type: self.artifact_type.clone().unwrap_or_default(),
        }
    }
}
