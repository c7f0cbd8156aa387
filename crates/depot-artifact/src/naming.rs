//! Version-stamped file names

use crate::*;
use chrono::{DateTime, NaiveDateTime, SubsecRound, Utc};

/// Timestamp layout embedded in every version file name
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d-%H-%M-%S";

const TIMESTAMP_LEN: usize = 19;

/// Highest collision sequence before an upload is refused
pub const MAX_SEQUENCE: u32 = 999;

/// Longest rendered file name accepted, in bytes (the common `NAME_MAX`)
pub const MAX_FILE_NAME_BYTES: usize = 255;

/// A single stored upload, identified by its rendered file name.
///
/// Rendered as `{base}.{timestamp}[_{NNN}][.{ext}]`. `sequence` is zero for
/// the first upload of a base name within a second; later ones in the same
/// second get `_001`, `_002`, ... which sort after the unsuffixed name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactVersion {
    pub base_name: String,
    pub extension: Option<String>,
    pub captured_at: DateTime<Utc>,
    pub sequence: u32,
}

impl ArtifactVersion {
    /// Render the on-disk file name
    pub fn file_name(&self) -> String {
        let mut name = format!(
            "{}.{}",
            self.base_name,
            self.captured_at.format(TIMESTAMP_FORMAT)
        );
        if self.sequence > 0 {
            name.push_str(&format!("_{:03}", self.sequence));
        }
        if let Some(ext) = &self.extension {
            name.push('.');
            name.push_str(ext);
        }
        name
    }

    /// Same version with a different collision sequence
    pub fn with_sequence(&self, sequence: u32) -> Self {
        Self {
            sequence,
            ..self.clone()
        }
    }

    /// Recover a version from a file name, or `None` if the name was not
    /// produced by [`VersionNamer`].
    pub fn parse(file_name: &str) -> Option<Self> {
        let (head, last) = file_name.rsplit_once('.')?;

        // `{base}.{stamp}.{ext}`; an extension may itself look like a stamp
        if let Some((base, stamp)) = head.rsplit_once('.') {
            if let Some((captured_at, sequence)) = parse_stamp(stamp) {
                if !base.is_empty() && !last.is_empty() {
                    return Some(Self {
                        base_name: base.to_string(),
                        extension: Some(last.to_string()),
                        captured_at,
                        sequence,
                    });
                }
            }
        }

        // `{base}.{stamp}` with no extension
        let (captured_at, sequence) = parse_stamp(last)?;
        if head.is_empty() {
            return None;
        }
        Some(Self {
            base_name: head.to_string(),
            extension: None,
            captured_at,
            sequence,
        })
    }
}

fn parse_stamp(segment: &str) -> Option<(DateTime<Utc>, u32)> {
    let (stamp, sequence) = match segment.split_once('_') {
        Some((stamp, digits)) => {
            if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            let sequence: u32 = digits.parse().ok()?;
            if sequence == 0 {
                return None;
            }
            (stamp, sequence)
        }
        None => (segment, 0),
    };

    let well_formed = stamp.len() == TIMESTAMP_LEN
        && stamp.bytes().enumerate().all(|(i, b)| match i {
            4 | 7 | 10 | 13 | 16 => b == b'-',
            _ => b.is_ascii_digit(),
        });
    if !well_formed {
        return None;
    }

    let naive = NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT).ok()?;
    Some((naive.and_utc(), sequence))
}

/// Turns raw upload file names into version-stamped, path-safe names.
pub struct VersionNamer;

impl VersionNamer {
    /// Build the version for an upload of `raw_filename` captured at `captured_at`.
    ///
    /// Path separators and control characters are stripped, as are trailing
    /// dots. The extension is whatever follows the last `.`; a name without
    /// one (or a dotfile such as `.env`) keeps its whole name as the base and
    /// renders as `{base}.{timestamp}` with no trailing dot. Such a base never
    /// contains a `.` past its first character, which keeps rendered names
    /// parseable.
    ///
    /// Names that could not be stored even with the largest collision suffix
    /// are rejected up front.
    pub fn name(raw_filename: &str, captured_at: DateTime<Utc>) -> Result<ArtifactVersion> {
        let cleaned: String = raw_filename
            .chars()
            .filter(|c| !matches!(c, '/' | '\\') && !c.is_control())
            .collect();
        let cleaned = cleaned
            .trim()
            .trim_end_matches(|c: char| c == '.' || c.is_whitespace());

        if cleaned.is_empty() {
            return Err(ArtifactError::InvalidFilename(format!(
                "{:?} has no usable name",
                raw_filename
            )));
        }

        let (base, extension) = match cleaned.rfind('.') {
            None | Some(0) => (cleaned, None),
            Some(idx) => (&cleaned[..idx], Some(cleaned[idx + 1..].to_string())),
        };

        let version = ArtifactVersion {
            base_name: base.to_string(),
            extension,
            captured_at: captured_at.trunc_subsecs(0),
            sequence: 0,
        };

        let longest = version.with_sequence(MAX_SEQUENCE).file_name().len();
        if longest > MAX_FILE_NAME_BYTES {
            return Err(ArtifactError::InvalidFilename(format!(
                "name is too long ({} bytes once versioned, maximum is {})",
                longest, MAX_FILE_NAME_BYTES
            )));
        }

        Ok(version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, h, m, s).unwrap()
    }

    #[test]
    fn test_name_with_extension() {
        let version = VersionNamer::name("logo.png", at(0, 0, 0)).unwrap();
        assert_eq!(version.base_name, "logo");
        assert_eq!(version.extension.as_deref(), Some("png"));
        assert_eq!(version.file_name(), "logo.2024-01-01-00-00-00.png");
    }

    #[test]
    fn test_name_keeps_inner_dots() {
        let version = VersionNamer::name("bundle.tar.gz", at(13, 5, 9)).unwrap();
        assert_eq!(version.file_name(), "bundle.tar.2024-01-01-13-05-09.gz");
    }

    #[test]
    fn test_name_without_extension() {
        let version = VersionNamer::name("archive", at(0, 0, 0)).unwrap();
        assert_eq!(version.base_name, "archive");
        assert_eq!(version.extension, None);
        assert_eq!(version.file_name(), "archive.2024-01-01-00-00-00");
    }

    #[test]
    fn test_name_dotfile_and_trailing_dot() {
        let dotfile = VersionNamer::name(".env", at(0, 0, 0)).unwrap();
        assert_eq!(dotfile.file_name(), ".env.2024-01-01-00-00-00");

        let trailing = VersionNamer::name("notes.", at(0, 0, 0)).unwrap();
        assert_eq!(trailing.file_name(), "notes.2024-01-01-00-00-00");

        let trailing = VersionNamer::name("notes.txt..", at(0, 0, 0)).unwrap();
        assert_eq!(trailing.file_name(), "notes.2024-01-01-00-00-00.txt");
    }

    #[test]
    fn test_stamp_like_extension_parses_as_extension() {
        let version = VersionNamer::name("x.2000-01-01-00-00-00", at(0, 0, 2)).unwrap();
        let file_name = version.file_name();
        assert_eq!(file_name, "x.2024-01-01-00-00-02.2000-01-01-00-00-00");

        let parsed = ArtifactVersion::parse(&file_name).unwrap();
        assert_eq!(parsed.captured_at, at(0, 0, 2));
        assert_eq!(parsed, version);

        // A trailing dot no longer hides the stamp-like segment inside the base
        let version = VersionNamer::name("x.2000-01-01-00-00-00.", at(0, 0, 2)).unwrap();
        assert_eq!(version.base_name, "x");
        assert_eq!(
            ArtifactVersion::parse(&version.file_name()).unwrap(),
            version
        );
    }

    #[test]
    fn test_name_rejects_overlong() {
        let fits = format!("{}.png", "a".repeat(MAX_FILE_NAME_BYTES - 30));
        let version = VersionNamer::name(&fits, at(0, 0, 0)).unwrap();
        assert!(version.with_sequence(MAX_SEQUENCE).file_name().len() <= MAX_FILE_NAME_BYTES);

        let too_long = format!("{}.png", "a".repeat(250));
        let result = VersionNamer::name(&too_long, at(0, 0, 0));
        assert!(matches!(result, Err(ArtifactError::InvalidFilename(_))));
    }

    #[test]
    fn test_name_strips_separators() {
        for raw in ["../../etc/passwd", "dir/sub/file.txt", "C:\\tmp\\evil.exe", "a\nb.txt"] {
            let name = VersionNamer::name(raw, at(0, 0, 0)).unwrap().file_name();
            assert!(!name.contains('/'), "{}", name);
            assert!(!name.contains('\\'), "{}", name);
            assert!(!name.chars().any(char::is_control), "{}", name);
        }
        let version = VersionNamer::name("../../etc/passwd", at(0, 0, 0)).unwrap();
        assert_eq!(version.file_name(), "....2024-01-01-00-00-00.etcpasswd");
    }

    #[test]
    fn test_name_rejects_empty() {
        for raw in ["", "   ", "/", "//", ".", "..", "/../", "..."] {
            let result = VersionNamer::name(raw, at(0, 0, 0));
            assert!(
                matches!(result, Err(ArtifactError::InvalidFilename(_))),
                "{:?} should be rejected",
                raw
            );
        }
    }

    #[test]
    fn test_subsecond_precision_dropped() {
        let captured = at(0, 0, 0) + chrono::Duration::milliseconds(750);
        let version = VersionNamer::name("a.bin", captured).unwrap();
        assert_eq!(version.captured_at, at(0, 0, 0));
    }

    #[test]
    fn test_sequence_suffix() {
        let version = VersionNamer::name("logo.png", at(0, 0, 0)).unwrap();
        assert_eq!(
            version.with_sequence(1).file_name(),
            "logo.2024-01-01-00-00-00_001.png"
        );
        assert_eq!(
            version.with_sequence(12).file_name(),
            "logo.2024-01-01-00-00-00_012.png"
        );
        // Suffixed names sort after the unsuffixed one
        assert!(version.with_sequence(1).file_name() > version.file_name());
    }

    #[test]
    fn test_parse_rendered_names() {
        for raw in ["logo.png", "archive", ".env", "bundle.tar.gz", ".env.local"] {
            let version = VersionNamer::name(raw, at(9, 30, 0)).unwrap().with_sequence(3);
            let parsed = ArtifactVersion::parse(&version.file_name()).unwrap();
            assert_eq!(parsed, version);
        }
    }

    #[test]
    fn test_parse_rejects_foreign_names() {
        for name in [
            "logo.png",
            "README",
            "logo.2024-01-01.png",
            "logo.2024-13-01-00-00-00.png",
            "logo.2024-01-01-00-00-00_.png",
            "logo.2024-01-01-00-00-00_000.png",
            "logo.2024-01-01-00-00-00_x1.png",
            ".2024-01-01-00-00-00",
            "0d5a.partial",
        ] {
            assert!(ArtifactVersion::parse(name).is_none(), "{}", name);
        }
    }
}
