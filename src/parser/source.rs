//! Package record sources.
//!
//! A source hands the graph builder its package records and answers
//! "which package satisfies this dependency specification?", honoring
//! `provides` declarations the way the package manager does.

use std::collections::HashMap;

use super::types::PackageRecord;
use super::version::DepSpec;

/// Something that can feed package records into the graph builder.
pub trait PackageSource {
    /// All package records, in database order.
    fn records(&self) -> &[PackageRecord];

    /// Finds the name of a package satisfying `spec`, if any.
    fn find_satisfier(&self, spec: &DepSpec) -> Option<&str>;

    /// Returns true if no record reports an installed size.
    fn sizes_unavailable(&self) -> bool {
        self.records().iter().all(|r| r.install_size.is_none())
    }
}

/// An in-memory source over a list of records.
///
/// # Example
///
/// ```
/// use pkgscope::parser::{DepSpec, PackageRecord, PackageSource, RecordSource};
///
/// let source = RecordSource::new(vec![
///     PackageRecord::new("bash", "5.2-1").with_provides(["sh"]),
///     PackageRecord::new("foo", "1.5"),
/// ]);
///
/// assert_eq!(source.find_satisfier(&DepSpec::named("sh")), Some("bash"));
/// assert_eq!(source.find_satisfier(&DepSpec::parse("foo>=2.0").unwrap()), None);
/// ```
#[derive(Debug, Clone, Default)]
pub struct RecordSource {
    records: Vec<PackageRecord>,
    /// Maps package names to the index of their first record.
    by_name: HashMap<String, usize>,
    /// Maps capability names to `(record index, parsed provide)` pairs.
    providers: HashMap<String, Vec<(usize, DepSpec)>>,
}

impl RecordSource {
    /// Creates a source, indexing names and provides.
    pub fn new(records: Vec<PackageRecord>) -> Self {
        let mut by_name = HashMap::with_capacity(records.len());
        let mut providers: HashMap<String, Vec<(usize, DepSpec)>> = HashMap::new();

        for (idx, record) in records.iter().enumerate() {
            by_name.entry(record.name.clone()).or_insert(idx);
            for provide in &record.provides {
                let parsed = match DepSpec::parse(provide) {
                    Ok(parsed) => parsed,
                    Err(err) => {
                        tracing::warn!(package = %record.name, %err, "ignoring unparsable provide");
                        continue;
                    }
                };
                providers
                    .entry(parsed.name.clone())
                    .or_default()
                    .push((idx, parsed));
            }
        }

        Self {
            records,
            by_name,
            providers,
        }
    }

    /// Returns the record for a package name.
    pub fn get(&self, name: &str) -> Option<&PackageRecord> {
        self.by_name.get(name).map(|&idx| &self.records[idx])
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if the source holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl PackageSource for RecordSource {
    fn records(&self) -> &[PackageRecord] {
        &self.records
    }

    fn find_satisfier(&self, spec: &DepSpec) -> Option<&str> {
        if let Some(record) = self.get(&spec.name) {
            if spec.satisfied_by(&record.version) {
                return Some(record.name.as_str());
            }
        }

        self.providers
            .get(&spec.name)?
            .iter()
            .find(|(_, provide)| spec.satisfied_by_provide(provide))
            .map(|&(idx, _)| self.records[idx].name.as_str())
    }
}

impl From<Vec<PackageRecord>> for RecordSource {
    fn from(records: Vec<PackageRecord>) -> Self {
        Self::new(records)
    }
}
