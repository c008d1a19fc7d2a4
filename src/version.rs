use std::cmp::Ordering;
use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref VERSION_NUMERIC_COMPONENTS_REGEX: Regex =
        Regex::new(r"^\d+(\.\d+)?(\.\d+)?").unwrap();
}

/// A semantic version as used by the VERSION targeting value kind.
///
/// Minor and patch components may be omitted ("2" and "2.1" are read as "2.0.0" and "2.1.0").
/// Ordering compares the numeric core, then pre-release identifiers with SemVer precedence.
/// Build metadata is kept but never takes part in ordering or equality.
#[derive(Clone, Debug)]
pub struct Version(semver::Version);

impl Version {
    /// Parse a version string, returning None if it is not a (possibly abbreviated) semantic
    /// version.
    pub fn parse(version_str: &str) -> Option<Version> {
        semver::Version::parse(version_str)
            .ok()
            .or_else(|| Version::parse_loose(version_str))
            .map(Version)
    }

    fn parse_loose(version_str: &str) -> Option<semver::Version> {
        let parts = VERSION_NUMERIC_COMPONENTS_REGEX.captures(version_str)?;

        let numeric_parts = parts.get(0)?;
        let mut transformed_version_str = numeric_parts.as_str().to_string();

        for i in 1..parts.len() {
            if parts.get(i).is_none() {
                transformed_version_str.push_str(".0");
            }
        }

        let rest = &version_str[numeric_parts.end()..];
        transformed_version_str.push_str(rest);

        semver::Version::parse(&transformed_version_str).ok()
    }

    pub fn major(&self) -> u64 {
        self.0.major
    }

    pub fn minor(&self) -> u64 {
        self.0.minor
    }

    pub fn patch(&self) -> u64 {
        self.0.patch
    }

    /// Pre-release identifiers, empty for a release version.
    pub fn pre_release(&self) -> Vec<&str> {
        identifiers(self.0.pre.as_str())
    }

    /// Build metadata identifiers, empty when absent.
    pub fn build(&self) -> Vec<&str> {
        identifiers(self.0.build.as_str())
    }
}

fn identifiers(s: &str) -> Vec<&str> {
    if s.is_empty() {
        Vec::new()
    } else {
        s.split('.').collect()
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        // semver's Prerelease ordering already follows SemVer precedence, including an empty
        // pre-release sorting after any non-empty one.
        (self.0.major, self.0.minor, self.0.patch, &self.0.pre).cmp(&(
            other.0.major,
            other.0.minor,
            other.0.patch,
            &other.0.pre,
        ))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
