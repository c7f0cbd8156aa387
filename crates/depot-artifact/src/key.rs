//! Artifact identity

use crate::*;

/// The `(organization, project, type)` triple identifying a lineage of uploads.
///
/// Every component is validated as a single, safe path segment when the key
/// is built, so a constructed key can be joined under the storage root
/// without further checks.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactKey {
    organization: String,
    project: String,
    artifact_type: String,
}

impl ArtifactKey {
    /// Build a key, trimming surrounding whitespace from each component.
    ///
    /// Fails with [`ArtifactError::InvalidKey`] when a component is empty or
    /// could escape its directory.
    pub fn new(
        organization: impl AsRef<str>,
        project: impl AsRef<str>,
        artifact_type: impl AsRef<str>,
    ) -> Result<Self> {
        Ok(Self {
            organization: clean_segment("organization", organization.as_ref())?,
            project: clean_segment("project", project.as_ref())?,
            artifact_type: clean_segment("type", artifact_type.as_ref())?,
        })
    }

    pub fn organization(&self) -> &str {
        &self.organization
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn artifact_type(&self) -> &str {
        &self.artifact_type
    }

    /// Components in directory order
    pub fn segments(&self) -> [&str; 3] {
        [&self.organization, &self.project, &self.artifact_type]
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.organization, self.project, self.artifact_type
        )
    }
}

fn clean_segment(field: &str, raw: &str) -> Result<String> {
    let value = raw.trim();

    if value.is_empty() {
        return Err(ArtifactError::InvalidKey(format!("{} is required", field)));
    }

    // A leading dot also keeps keys clear of the store's own `.staging` area
    if value.starts_with('.') || value.contains("..") {
        return Err(ArtifactError::InvalidKey(format!(
            "{} must not start with '.' or contain '..'",
            field
        )));
    }

    if value
        .chars()
        .any(|c| matches!(c, '/' | '\\' | ':') || c.is_control())
    {
        return Err(ArtifactError::InvalidKey(format!(
            "{} must not contain path separators",
            field
        )));
    }

    Ok(value.to_string())
}
