//! Dependency specifications and version comparison.
//!
//! A dependency string is a package (or capability) name optionally followed
//! by a comparator and a version, e.g. `glibc`, `readline>=7.0` or
//! `libfoo.so=1-64`. Versions follow the `[epoch:]version[-release]` form and
//! are compared segment by segment the way pacman's `vercmp` does.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Characters that may make up a comparator.
const OPERATOR_CHARS: &[char] = &['<', '>', '='];

/// A dependency string whose comparator or version could not be understood.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed version spec '{spec}': {reason}")]
pub struct MalformedVersionSpec {
    /// The raw specification as it appeared in the record.
    pub spec: String,
    /// What was wrong with it.
    pub reason: String,
}

impl MalformedVersionSpec {
    fn new(spec: &str, reason: impl Into<String>) -> Self {
        Self {
            spec: spec.to_string(),
            reason: reason.into(),
        }
    }
}

/// Version comparison operator.
///
/// | Operator     | Meaning |
/// |--------------|---------|
/// | `<<`         | candidate is strictly less than the constraint |
/// | `<=` and `<` | candidate is less than or equal to the constraint |
/// | `=`          | candidate is equal to the constraint |
/// | `>=` and `>` | candidate is greater than or equal to the constraint |
/// | `>>`         | candidate is strictly greater than the constraint |
///
/// A bare `<` or `>` is the legacy spelling of the or-equal variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparator {
    StrictlyLess,
    LessOrEqual,
    Equal,
    GreaterOrEqual,
    StrictlyGreater,
}

impl Comparator {
    /// Returns true if `ordering` (candidate compared to constraint) is accepted.
    pub fn accepts(self, ordering: Ordering) -> bool {
        match self {
            Comparator::StrictlyLess => ordering == Ordering::Less,
            Comparator::LessOrEqual => ordering != Ordering::Greater,
            Comparator::Equal => ordering == Ordering::Equal,
            Comparator::GreaterOrEqual => ordering != Ordering::Less,
            Comparator::StrictlyGreater => ordering == Ordering::Greater,
        }
    }

    /// Canonical spelling of the operator.
    pub fn symbol(self) -> &'static str {
        match self {
            Comparator::StrictlyLess => "<<",
            Comparator::LessOrEqual => "<=",
            Comparator::Equal => "=",
            Comparator::GreaterOrEqual => ">=",
            Comparator::StrictlyGreater => ">>",
        }
    }
}

impl FromStr for Comparator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "<<" => Ok(Comparator::StrictlyLess),
            "<=" | "<" => Ok(Comparator::LessOrEqual),
            "=" => Ok(Comparator::Equal),
            ">=" | ">" => Ok(Comparator::GreaterOrEqual),
            ">>" => Ok(Comparator::StrictlyGreater),
            _ => Err(format!("unknown comparator '{}'", s)),
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// A version requirement: comparator plus the version it compares against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraint {
    pub comparator: Comparator,
    pub version: String,
}

/// A parsed dependency specification.
///
/// # Example
///
/// ```
/// use pkgscope::parser::version::DepSpec;
///
/// let spec = DepSpec::parse("foo>=2.0").unwrap();
/// assert_eq!(spec.name, "foo");
/// assert!(!spec.satisfied_by("1.5"));
/// assert!(spec.satisfied_by("2.0"));
/// assert!(spec.satisfied_by("2.1"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepSpec {
    /// Package or capability name.
    pub name: String,
    /// Optional version requirement.
    pub constraint: Option<Constraint>,
}

impl DepSpec {
    /// Creates an unversioned specification.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            constraint: None,
        }
    }

    /// Parses `name[<op>version]`.
    pub fn parse(raw: &str) -> Result<Self, MalformedVersionSpec> {
        let trimmed = raw.trim();
        let Some(op_start) = trimmed.find(OPERATOR_CHARS) else {
            if trimmed.is_empty() {
                return Err(MalformedVersionSpec::new(raw, "empty name"));
            }
            if trimmed.contains(char::is_whitespace) {
                return Err(MalformedVersionSpec::new(raw, "name contains whitespace"));
            }
            return Ok(Self::named(trimmed));
        };

        let name = trimmed[..op_start].trim();
        if name.is_empty() {
            return Err(MalformedVersionSpec::new(raw, "empty name"));
        }
        if name.contains(char::is_whitespace) {
            return Err(MalformedVersionSpec::new(raw, "name contains whitespace"));
        }

        let rest = &trimmed[op_start..];
        let op_len = rest
            .find(|c: char| !OPERATOR_CHARS.contains(&c))
            .unwrap_or(rest.len());
        let comparator = rest[..op_len]
            .parse::<Comparator>()
            .map_err(|reason| MalformedVersionSpec::new(raw, reason))?;

        let version = rest[op_len..].trim();
        if version.is_empty() {
            return Err(MalformedVersionSpec::new(raw, "missing version"));
        }
        if version.contains(char::is_whitespace) {
            return Err(MalformedVersionSpec::new(raw, "version contains whitespace"));
        }

        Ok(Self {
            name: name.to_string(),
            constraint: Some(Constraint {
                comparator,
                version: version.to_string(),
            }),
        })
    }

    /// Returns the bare name of a possibly versioned string (`libfoo.so=1-64` -> `libfoo.so`).
    pub fn strip_version(raw: &str) -> &str {
        match raw.find(OPERATOR_CHARS) {
            Some(idx) => raw[..idx].trim(),
            None => raw.trim(),
        }
    }

    /// Returns true if a package at `version` satisfies this specification.
    pub fn satisfied_by(&self, version: &str) -> bool {
        match &self.constraint {
            None => true,
            Some(c) => c.comparator.accepts(compare_versions(version, &c.version)),
        }
    }

    /// Returns true if a `provides` entry satisfies this specification.
    ///
    /// An unversioned provide only satisfies an unversioned dependency; a
    /// versioned provide is checked like a package at that version.
    pub fn satisfied_by_provide(&self, provide: &DepSpec) -> bool {
        if provide.name != self.name {
            return false;
        }
        match (&self.constraint, &provide.constraint) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(_), Some(p)) => self.satisfied_by(&p.version),
        }
    }
}

impl fmt::Display for DepSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.constraint {
            None => write!(f, "{}", self.name),
            Some(c) => write!(f, "{}{}{}", self.name, c.comparator, c.version),
        }
    }
}

/// Extracts the package name from an optional dependency string (`name: reason`).
pub fn optdepend_name(raw: &str) -> &str {
    raw.split(':').next().unwrap_or(raw).trim()
}

/// Compares two full version strings.
///
/// Epochs are compared first, then the version part, then the release part
/// when both sides carry one. With the `alpm` feature this is libalpm's own
/// `alpm_pkg_vercmp`.
///
/// # Example
///
/// ```
/// use std::cmp::Ordering;
/// use pkgscope::parser::version::compare_versions;
///
/// assert_eq!(compare_versions("1.5", "2.0"), Ordering::Less);
/// assert_eq!(compare_versions("1:1.0", "2.0"), Ordering::Greater);
/// assert_eq!(compare_versions("1.0-1", "1.0"), Ordering::Equal);
/// ```
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    #[cfg(feature = "alpm")]
    {
        alpm::vercmp(a, b)
    }
    #[cfg(not(feature = "alpm"))]
    {
        vercmp(a, b)
    }
}

/// pacman's version comparison, for builds without libalpm.
#[cfg_attr(feature = "alpm", allow(dead_code))]
fn vercmp(a: &str, b: &str) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }
    let (epoch_a, ver_a, rel_a) = split_evr(a);
    let (epoch_b, ver_b, rel_b) = split_evr(b);

    compare_segments(epoch_a, epoch_b)
        .then_with(|| compare_segments(ver_a, ver_b))
        .then_with(|| match (rel_a, rel_b) {
            (Some(ra), Some(rb)) => compare_segments(ra, rb),
            _ => Ordering::Equal,
        })
}

/// Splits `[epoch:]version[-release]`; a missing epoch is `0`.
fn split_evr(full: &str) -> (&str, &str, Option<&str>) {
    let (epoch, rest) = match full.find(':') {
        Some(idx) if full[..idx].bytes().all(|b| b.is_ascii_digit()) => {
            let epoch = if idx == 0 { "0" } else { &full[..idx] };
            (epoch, &full[idx + 1..])
        }
        _ => ("0", full),
    };
    match rest.rfind('-') {
        Some(idx) => (epoch, &rest[..idx], Some(&rest[idx + 1..])),
        None => (epoch, rest, None),
    }
}

/// Segment-wise comparison of a single version component.
///
/// Alphanumeric runs are compared pairwise: numeric runs numerically,
/// alphabetic runs lexically, and a numeric run is newer than an alphabetic
/// one. Separator runs of different length decide immediately. A trailing
/// alphabetic run is older than nothing at all (`1.0a < 1.0`).
fn compare_segments(a: &str, b: &str) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }
    let one = a.as_bytes();
    let two = b.as_bytes();
    let (mut i, mut j) = (0usize, 0usize);
    let (mut seg_end_a, mut seg_end_b) = (0usize, 0usize);

    while i < one.len() && j < two.len() {
        while i < one.len() && !one[i].is_ascii_alphanumeric() {
            i += 1;
        }
        while j < two.len() && !two[j].is_ascii_alphanumeric() {
            j += 1;
        }
        if i >= one.len() || j >= two.len() {
            break;
        }

        let sep_a = i - seg_end_a;
        let sep_b = j - seg_end_b;
        if sep_a != sep_b {
            return sep_a.cmp(&sep_b);
        }

        let numeric = one[i].is_ascii_digit();
        let run = |bytes: &[u8], start: usize| -> usize {
            let mut end = start;
            while end < bytes.len()
                && if numeric {
                    bytes[end].is_ascii_digit()
                } else {
                    bytes[end].is_ascii_alphabetic()
                }
            {
                end += 1;
            }
            end
        };
        seg_end_a = run(one, i);
        seg_end_b = run(two, j);

        let mut seg_a = &a[i..seg_end_a];
        let mut seg_b = &b[j..seg_end_b];
        if seg_b.is_empty() {
            // Mismatched segment types: numeric beats alphabetic.
            return if numeric {
                Ordering::Greater
            } else {
                Ordering::Less
            };
        }

        if numeric {
            seg_a = seg_a.trim_start_matches('0');
            seg_b = seg_b.trim_start_matches('0');
            match seg_a.len().cmp(&seg_b.len()) {
                Ordering::Equal => {}
                other => return other,
            }
        }
        match seg_a.cmp(seg_b) {
            Ordering::Equal => {}
            other => return other,
        }

        i = seg_end_a;
        j = seg_end_b;
    }

    let done_a = i >= one.len();
    let done_b = j >= two.len();
    if done_a && done_b {
        return Ordering::Equal;
    }
    let alpha_a = !done_a && one[i].is_ascii_alphabetic();
    let alpha_b = !done_b && two[j].is_ascii_alphabetic();
    if (done_a && !alpha_b) || alpha_a {
        Ordering::Less
    } else {
        Ordering::Greater
    }
}
