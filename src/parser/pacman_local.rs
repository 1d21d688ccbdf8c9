//! Reader for the pacman local package database.
//!
//! The local database is a directory with one `<name>-<version>` entry per
//! installed package, each holding a `desc` file made of `%SECTION%`
//! headers followed by one value per line and a blank line.
//!
//! Each package's repository comes from the sync databases in the sibling
//! `sync/` directory: gzip'd tarballs (`core.db`, `extra.db`, ...) holding
//! the same `desc` layout.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use tracing::{debug, warn};
use walkdir::WalkDir;

use super::snapshot::{ParseError, ParseResult};
use super::types::PackageRecord;

/// Repository name for packages no sync database lists.
pub const LOCAL_REPO: &str = "local";

/// Default location of the pacman local database.
pub const DEFAULT_LOCAL_DB: &str = "/var/lib/pacman/local";

const SYNC_DIR: &str = "sync";
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Reads every `desc` file below `dir` and labels each package with its
/// sync repository.
///
/// Entries are returned sorted by package name so results do not depend on
/// directory iteration order.
pub fn read_local_db(dir: &Path) -> ParseResult<Vec<PackageRecord>> {
    let mut records = Vec::new();

    for entry in WalkDir::new(dir).min_depth(2).max_depth(2) {
        let entry = entry?;
        if !entry.file_type().is_file() || entry.file_name() != "desc" {
            continue;
        }
        let content = fs::read_to_string(entry.path())?;
        records.push(parse_desc(&content, entry.path())?);
    }

    if let Some(db_root) = dir.parent() {
        let repos = sync_repos(db_root);
        for record in &mut records {
            if let Some(repo) = repos.get(&record.name) {
                record.repo = repo.clone();
            }
        }
    }

    records.sort_by(|a, b| a.name.cmp(&b.name));
    debug!(dir = %dir.display(), packages = records.len(), "read local database");
    Ok(records)
}

/// Lists the sync databases under `<db_root>/sync` as `(repo, path)` pairs,
/// sorted by repository name.
///
/// A missing `sync/` directory yields an empty list.
pub fn sync_databases(db_root: &Path) -> Vec<(String, PathBuf)> {
    let sync_dir = db_root.join(SYNC_DIR);
    if !sync_dir.is_dir() {
        return Vec::new();
    }

    let mut dbs: Vec<(String, PathBuf)> = WalkDir::new(&sync_dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                warn!(%err, "skipping unreadable sync entry");
                None
            }
        })
        .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "db"))
        .filter_map(|entry| {
            let repo = entry.path().file_stem()?.to_str()?.to_string();
            Some((repo, entry.into_path()))
        })
        .collect();
    dbs.sort();
    dbs
}

/// Maps each package name to the first repository listing it.
///
/// Repositories are searched in name order. Unreadable databases are
/// skipped with a warning.
pub fn sync_repos(db_root: &Path) -> HashMap<String, String> {
    let mut repos = HashMap::new();
    for (repo, path) in sync_databases(db_root) {
        match read_sync_db(&path) {
            Ok(names) => {
                debug!(%repo, packages = names.len(), "read sync database");
                for name in names {
                    repos.entry(name).or_insert_with(|| repo.clone());
                }
            }
            Err(err) => warn!(%repo, %err, "skipping sync database"),
        }
    }
    repos
}

/// Package names listed in one gzip'd sync database.
///
/// Databases compressed any other way come back empty with a warning.
pub fn read_sync_db(path: &Path) -> ParseResult<Vec<String>> {
    let mut reader = BufReader::new(File::open(path)?);
    if !reader.fill_buf()?.starts_with(&GZIP_MAGIC) {
        warn!(path = %path.display(), "sync database is not gzip compressed");
        return Ok(Vec::new());
    }

    let mut archive = tar::Archive::new(GzDecoder::new(reader));
    let mut names = Vec::new();
    for entry in archive.entries()? {
        let mut entry = entry?;
        let entry_path = entry.path()?.into_owned();
        if entry_path.file_name().map_or(true, |f| f != "desc") {
            continue;
        }
        let mut content = String::new();
        entry.read_to_string(&mut content)?;
        names.push(parse_desc(&content, &entry_path)?.name);
    }
    Ok(names)
}

/// Parses the contents of a single `desc` file.
///
/// # Example
///
/// ```
/// use std::path::Path;
/// use pkgscope::parser::pacman_local::parse_desc;
///
/// let desc = "%NAME%\nzlib\n\n%VERSION%\n1:1.3.1-1\n\n%SIZE%\n372157\n\n%REASON%\n1\n";
/// let record = parse_desc(desc, Path::new("zlib-1:1.3.1-1/desc")).unwrap();
/// assert_eq!(record.name, "zlib");
/// assert_eq!(record.install_size, Some(372157));
/// assert!(!record.explicit);
/// ```
pub fn parse_desc(content: &str, path: &Path) -> ParseResult<PackageRecord> {
    let malformed = |reason: String| ParseError::MalformedDesc {
        path: path.to_path_buf(),
        reason,
    };

    let mut record = PackageRecord::new("", "").with_repo(LOCAL_REPO);
    let mut section: Option<&str> = None;

    for line in content.lines() {
        let line = line.trim_end();
        if line.is_empty() {
            section = None;
            continue;
        }
        if line.len() > 2 && line.starts_with('%') && line.ends_with('%') {
            section = Some(&line[1..line.len() - 1]);
            continue;
        }
        let Some(current) = section else {
            return Err(malformed(format!("value '{}' outside of a section", line)));
        };
        match current {
            "NAME" => record.name = line.to_string(),
            "VERSION" => record.version = line.to_string(),
            "DESC" => {
                if !record.description.is_empty() {
                    record.description.push(' ');
                }
                record.description.push_str(line);
            }
            "GROUPS" => record.groups.push(line.to_string()),
            "DEPENDS" => record.depends.push(line.to_string()),
            "OPTDEPENDS" => record.optdepends.push(line.to_string()),
            "PROVIDES" => record.provides.push(line.to_string()),
            "SIZE" => {
                let size = line
                    .parse::<u64>()
                    .map_err(|e| malformed(format!("bad %SIZE% '{}': {}", line, e)))?;
                record.install_size = Some(size);
            }
            "REASON" => record.explicit = line == "0",
            _ => {}
        }
    }

    if record.name.is_empty() {
        return Err(malformed("missing %NAME%".to_string()));
    }
    Ok(record)
}
