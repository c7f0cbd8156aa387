//! Selection of the "latest" version in an artifact directory

use crate::*;
use std::io::ErrorKind;
use std::path::Path;
use tokio::fs;

/// Which version a download asks for.
///
/// Only `latest` is supported; explicit versions are rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionSelector {
    Latest,
}

impl VersionSelector {
    /// Parse the optional `version` request parameter.
    ///
    /// Absent, empty, `.` and `latest` all select the latest version.
    pub fn parse(raw: Option<&str>) -> Result<Self> {
        match raw.map(str::trim) {
            None | Some("") | Some(".") | Some("latest") => Ok(Self::Latest),
            Some(other) => Err(ArtifactError::UnsupportedVersion(other.to_string())),
        }
    }
}

/// Picks the entry representing the most recent version of an artifact.
#[derive(Debug, Clone, Copy)]
pub struct LatestResolver {
    policy: LatestPolicy,
}

impl LatestResolver {
    pub fn new(policy: LatestPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> LatestPolicy {
        self.policy
    }

    /// List the regular files in `dir` and select the latest one.
    ///
    /// Fails with [`ArtifactError::NotFound`] when the directory is missing
    /// or holds no candidate.
    pub async fn resolve(&self, dir: &Path) -> Result<String> {
        let not_found = || ArtifactError::NotFound(dir.display().to_string());

        let mut entries = match fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(not_found()),
            Err(e) => return Err(ArtifactError::StorageUnavailable(e)),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(ArtifactError::StorageUnavailable)?
        {
            let file_type = entry
                .file_type()
                .await
                .map_err(ArtifactError::StorageUnavailable)?;
            if !file_type.is_file() {
                continue;
            }
            if let Ok(name) = entry.file_name().into_string() {
                names.push(name);
            }
        }

        self.select(names.iter().map(String::as_str))
            .map(str::to_string)
            .ok_or_else(not_found)
    }

    /// Select the latest name among `names` according to the policy.
    ///
    /// Lexicographic takes the greatest name in byte order. That matches upload
    /// order only while every version shares one base name. Chronological
    /// compares the embedded capture time and collision sequence, and ignores
    /// names that are not version names.
    pub fn select<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> Option<&'a str> {
        match self.policy {
            LatestPolicy::Lexicographic => names.into_iter().max(),
            LatestPolicy::Chronological => names
                .into_iter()
                .filter_map(|name| {
                    ArtifactVersion::parse(name)
                        .map(|version| ((version.captured_at, version.sequence), name))
                })
                .max()
                .map(|(_, name)| name),
        }
    }
}

impl Default for LatestResolver {
    fn default() -> Self {
        Self::new(LatestPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_version_selector() {
        assert_eq!(VersionSelector::parse(None).unwrap(), VersionSelector::Latest);
        assert_eq!(VersionSelector::parse(Some("")).unwrap(), VersionSelector::Latest);
        assert_eq!(VersionSelector::parse(Some(".")).unwrap(), VersionSelector::Latest);
        assert_eq!(
            VersionSelector::parse(Some("latest")).unwrap(),
            VersionSelector::Latest
        );

        let err = VersionSelector::parse(Some("2024-01-01-00-00-00")).unwrap_err();
        assert!(matches!(err, ArtifactError::UnsupportedVersion(_)));
    }

    #[test]
    fn test_lexicographic_takes_greatest_name() {
        let resolver = LatestResolver::new(LatestPolicy::Lexicographic);
        let names = [
            "zeta.2024-01-01-00-00-00.png",
            "alpha.2024-06-01-00-00-00.png",
        ];
        // Greatest name, not newest upload
        assert_eq!(
            resolver.select(names.iter().copied()),
            Some("zeta.2024-01-01-00-00-00.png")
        );
    }

    #[test]
    fn test_chronological_takes_newest_timestamp() {
        let resolver = LatestResolver::new(LatestPolicy::Chronological);
        let names = [
            "zeta.2024-01-01-00-00-00.png",
            "alpha.2024-06-01-00-00-00.png",
            "notes.txt",
        ];
        assert_eq!(
            resolver.select(names.iter().copied()),
            Some("alpha.2024-06-01-00-00-00.png")
        );
    }

    #[test]
    fn test_sequence_breaks_same_second_ties() {
        let names = [
            "logo.2024-01-01-00-00-00_002.png",
            "logo.2024-01-01-00-00-00.png",
            "logo.2024-01-01-00-00-00_001.png",
        ];
        for policy in [LatestPolicy::Lexicographic, LatestPolicy::Chronological] {
            let resolver = LatestResolver::new(policy);
            assert_eq!(
                resolver.select(names.iter().copied()),
                Some("logo.2024-01-01-00-00-00_002.png"),
                "{:?}",
                policy
            );
        }
    }

    #[test]
    fn test_no_candidates() {
        let resolver = LatestResolver::new(LatestPolicy::Chronological);
        assert_eq!(resolver.select(["README", "x.partial"]), None);
        assert_eq!(resolver.select(std::iter::empty()), None);
    }

    #[tokio::test]
    async fn test_resolve_missing_and_empty_dir() {
        let temp_dir = TempDir::new().unwrap();
        let resolver = LatestResolver::default();

        let missing = resolver.resolve(&temp_dir.path().join("absent")).await;
        assert!(matches!(missing, Err(ArtifactError::NotFound(_))));

        let empty = resolver.resolve(temp_dir.path()).await;
        assert!(matches!(empty, Err(ArtifactError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_resolve_skips_directories() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("a.2024-01-01-00-00-00.bin"), b"a").unwrap();
        std::fs::create_dir(temp_dir.path().join("b.2025-01-01-00-00-00.bin")).unwrap();

        let latest = LatestResolver::default()
            .resolve(temp_dir.path())
            .await
            .unwrap();
        assert_eq!(latest, "a.2024-01-01-00-00-00.bin");
    }
}
