//! Shared types for package records.
//!
//! This module defines the normalized package record that every database
//! adapter produces, independent of where the metadata was read from.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single package as reported by a package database.
///
/// This is the normalized form used throughout pkgscope, abstracting away
/// the differences between a pacman local database and a JSON snapshot.
///
/// # Example
///
/// ```
/// use pkgscope::parser::types::PackageRecord;
///
/// let json = r#"{"name": "bash", "version": "5.2.026-2", "depends": ["readline>=7.0"]}"#;
/// let record: PackageRecord = serde_json::from_str(json).unwrap();
/// assert_eq!(record.name, "bash");
/// assert!(record.explicit);
/// assert_eq!(record.install_size, None);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PackageRecord {
    /// The package name.
    pub name: String,

    /// The full version string (`[epoch:]version[-release]`).
    #[serde(default)]
    pub version: String,

    /// Name of the repository the package comes from.
    #[serde(default, alias = "section")]
    pub repo: String,

    /// Package groups this package belongs to.
    #[serde(default)]
    pub groups: Vec<String>,

    /// Capabilities this package provides, possibly versioned (`libfoo.so=1-64`).
    #[serde(default)]
    pub provides: Vec<String>,

    /// Raw dependency specifications (`name`, `name>=1.0`, ...).
    #[serde(default)]
    pub depends: Vec<String>,

    /// Raw optional dependency specifications (`name: reason`).
    #[serde(default)]
    pub optdepends: Vec<String>,

    /// Human readable description.
    #[serde(default)]
    pub description: String,

    /// Installed size in bytes, when the database records it.
    #[serde(default, alias = "isize")]
    pub install_size: Option<u64>,

    /// Whether the user asked for this package rather than it being pulled in.
    #[serde(default = "default_explicit")]
    pub explicit: bool,
}

fn default_explicit() -> bool {
    true
}

impl PackageRecord {
    /// Creates a record with the given name and version and no relations.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            repo: String::new(),
            groups: Vec::new(),
            provides: Vec::new(),
            depends: Vec::new(),
            optdepends: Vec::new(),
            description: String::new(),
            install_size: None,
            explicit: true,
        }
    }

    /// Sets the dependency list.
    pub fn with_depends<I, S>(mut self, depends: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends = depends.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the optional dependency list.
    pub fn with_optdepends<I, S>(mut self, optdepends: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.optdepends = optdepends.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the provides list.
    pub fn with_provides<I, S>(mut self, provides: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.provides = provides.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the group memberships.
    pub fn with_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups = groups.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the installed size in bytes.
    pub fn with_size(mut self, bytes: u64) -> Self {
        self.install_size = Some(bytes);
        self
    }

    /// Marks the package as installed only as a dependency.
    pub fn as_dependency(mut self) -> Self {
        self.explicit = false;
        self
    }

    /// Sets the repository name.
    pub fn with_repo(mut self, repo: impl Into<String>) -> Self {
        self.repo = repo.into();
        self
    }

    /// Sets the one-line description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

impl fmt::Display for PackageRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.repo.is_empty() {
            write!(f, "{} {}", self.name, self.version)
        } else {
            write!(f, "{}/{} {}", self.repo, self.name, self.version)
        }
    }
}
