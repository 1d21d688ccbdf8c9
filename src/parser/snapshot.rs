//! Parser for JSON package database snapshots.
//!
//! A snapshot is a JSON array of package records, as produced by dumping a
//! package database (or a package archive) ahead of time.

use std::fs;
use std::path::{Path, PathBuf};

use super::types::PackageRecord;

/// Errors that can occur while reading package records.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// Failed to read a file from disk.
    #[error("Failed to read file: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse JSON content.
    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    /// A record is unusable (e.g. has an empty name).
    #[error("Invalid package record: {0}")]
    InvalidRecord(String),

    /// A pacman `desc` file could not be understood.
    #[error("Malformed desc file {}: {reason}", path.display())]
    MalformedDesc { path: PathBuf, reason: String },

    /// Failed to walk a database directory.
    #[error("Failed to walk directory: {0}")]
    WalkError(#[from] walkdir::Error),

    /// libalpm refused to open or read a database.
    #[cfg(feature = "alpm")]
    #[error("libalpm error: {0}")]
    AlpmError(#[from] alpm::Error),
}

/// Result type alias for parser operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// Parses a snapshot file from a file path.
///
/// # Example
///
/// ```ignore
/// use std::path::Path;
/// use pkgscope::parser::snapshot::parse_file;
///
/// let records = parse_file(Path::new("packages.json")).unwrap();
/// println!("{} packages", records.len());
/// ```
pub fn parse_file(path: &Path) -> ParseResult<Vec<PackageRecord>> {
    let content = fs::read_to_string(path)?;
    parse_str(&content)
}

/// Parses a snapshot from a string.
///
/// # Example
///
/// ```
/// use pkgscope::parser::snapshot::parse_str;
///
/// let json = r#"[{"name": "glibc", "version": "2.39-1", "isize": 48000000}]"#;
/// let records = parse_str(json).unwrap();
/// assert_eq!(records[0].name, "glibc");
/// assert_eq!(records[0].install_size, Some(48000000));
/// ```
pub fn parse_str(content: &str) -> ParseResult<Vec<PackageRecord>> {
    let records: Vec<PackageRecord> = serde_json::from_str(content)?;
    Ok(records)
}

/// Validates a list of records.
///
/// Rejects records with empty names. Duplicate names are left for the graph
/// builder, which treats them as a data-integrity failure.
pub fn validate(records: &[PackageRecord]) -> ParseResult<()> {
    if let Some(pos) = records.iter().position(|r| r.name.trim().is_empty()) {
        return Err(ParseError::InvalidRecord(format!(
            "record #{} has an empty name",
            pos
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_snapshot() {
        let json = r#"[
            {"name": "bash", "version": "5.2-1", "depends": ["readline", "glibc"], "groups": ["base"]},
            {"name": "readline", "version": "8.2-1", "explicit": false}
        ]"#;
        let records = parse_str(json).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].depends, vec!["readline", "glibc"]);
        assert_eq!(records[0].groups, vec!["base"]);
        assert!(!records[1].explicit);
    }

    #[test]
    fn test_parse_invalid_json() {
        let result = parse_str("{ not json");
        assert!(matches!(result, Err(ParseError::JsonError(_))));
    }

    #[test]
    fn test_parse_missing_file() {
        let result = parse_file(Path::new("/nonexistent/packages.json"));
        assert!(matches!(result, Err(ParseError::IoError(_))));
    }

    #[test]
    fn test_validate_empty_name() {
        let records = vec![PackageRecord::new("a", "1"), PackageRecord::new(" ", "1")];
        let err = validate(&records).unwrap_err();
        assert!(err.to_string().contains("#1"));
        assert!(validate(&records[..1]).is_ok());
    }
}
