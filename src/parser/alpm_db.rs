//! Package records read through libalpm.
//!
//! Needs the `alpm` feature. Gives the same records as
//! [`pacman_local::read_local_db`](super::pacman_local::read_local_db), but
//! lets libalpm parse the database and resolve sync repositories.

use std::path::Path;

use alpm::{Alpm, Package, PackageReason, SigLevel};
use tracing::debug;

use super::pacman_local::{sync_databases, LOCAL_REPO};
use super::snapshot::ParseResult;
use super::types::PackageRecord;

/// Filesystem root handed to libalpm.
pub const DEFAULT_ROOT: &str = "/";

/// Reads the local database in `local_dir` (normally `/var/lib/pacman/local`).
///
/// libalpm always opens `<dbpath>/local`, so `local_dir`'s parent is used as
/// the database path. Every sync database found next to it is registered.
pub fn read_local_db(local_dir: &Path) -> ParseResult<Vec<PackageRecord>> {
    let db_root = local_dir.parent().unwrap_or(local_dir);
    let mut handle = Alpm::new(DEFAULT_ROOT, &*db_root.to_string_lossy())?;

    for (repo, _) in sync_databases(db_root) {
        handle.register_syncdb(repo.as_str(), SigLevel::USE_DEFAULT)?;
    }

    let mut records: Vec<PackageRecord> = handle
        .localdb()
        .pkgs()
        .iter()
        .map(|pkg| to_record(pkg, find_repo(&handle, pkg.name())))
        .collect();

    records.sort_by(|a, b| a.name.cmp(&b.name));
    debug!(db = %db_root.display(), packages = records.len(), "read database through libalpm");
    Ok(records)
}

/// First registered sync database that has `name`, else [`LOCAL_REPO`].
fn find_repo(handle: &Alpm, name: &str) -> String {
    handle
        .syncdbs()
        .iter()
        .find(|db| db.pkg(name).is_ok())
        .map(|db| db.name().to_string())
        .unwrap_or_else(|| LOCAL_REPO.to_string())
}

fn to_record(pkg: &Package, repo: String) -> PackageRecord {
    let mut record = PackageRecord::new(pkg.name(), pkg.version().to_string())
        .with_repo(repo)
        .with_description(pkg.desc().unwrap_or_default())
        .with_depends(pkg.depends().iter().map(|d| d.to_string()))
        .with_optdepends(pkg.optdepends().iter().map(|d| d.to_string()))
        .with_provides(pkg.provides().iter().map(|d| d.to_string()))
        .with_groups(pkg.groups().iter());
    record.install_size = u64::try_from(pkg.isize()).ok();
    if pkg.reason() != PackageReason::Explicit {
        record = record.as_dependency();
    }
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_read_local_db_through_libalpm() {
        let tmp = tempfile::tempdir().unwrap();
        let local = tmp.path().join("local");
        let entry = local.join("zlib-1:1.3.1-1");
        fs::create_dir_all(&entry).unwrap();
        fs::write(local.join("ALPM_DB_VERSION"), "9\n").unwrap();
        fs::write(
            entry.join("desc"),
            "%NAME%\nzlib\n\n%VERSION%\n1:1.3.1-1\n\n%DESC%\nCompression library\n\n\
             %SIZE%\n372157\n\n%REASON%\n1\n\n%DEPENDS%\nglibc\n\n",
        )
        .unwrap();

        let records = read_local_db(&local).unwrap();
        assert_eq!(records.len(), 1);
        let zlib = &records[0];
        assert_eq!(zlib.name, "zlib");
        assert_eq!(zlib.version, "1:1.3.1-1");
        assert_eq!(zlib.description, "Compression library");
        assert_eq!(zlib.install_size, Some(372157));
        assert_eq!(zlib.depends, vec!["glibc"]);
        assert_eq!(zlib.repo, LOCAL_REPO);
        assert!(!zlib.explicit);
    }
}
