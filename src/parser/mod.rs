//! Parser module for pkgscope.
//!
//! This module turns package databases into normalized [`PackageRecord`]s
//! and answers dependency-satisfaction queries over them.
//!
//! # Supported Sources
//!
//! - **pacman local database** (`/var/lib/pacman/local`) - read directly,
//!   with repositories taken from the sync databases
//! - **libalpm** - the same database through libalpm (`alpm` feature)
//! - **JSON snapshot** - an array of records dumped ahead of time
//!
//! # Example
//!
//! ```
//! use pkgscope::parser::{snapshot, DepSpec, PackageSource, RecordSource};
//!
//! let json = r#"[
//!     {"name": "bash", "version": "5.2-1", "provides": ["sh"]},
//!     {"name": "dash", "version": "0.5.12-1"}
//! ]"#;
//! let source = RecordSource::new(snapshot::parse_str(json).unwrap());
//!
//! assert_eq!(source.find_satisfier(&DepSpec::named("sh")), Some("bash"));
//! ```

#[cfg(feature = "alpm")]
pub mod alpm_db;
pub mod pacman_local;
pub mod snapshot;
pub mod source;
pub mod types;
pub mod version;

// Re-export commonly used types for convenience
pub use snapshot::{parse_file, parse_str, validate, ParseError, ParseResult};
pub use source::{PackageSource, RecordSource};
pub use types::PackageRecord;
pub use version::{compare_versions, Comparator, DepSpec, MalformedVersionSpec};
