//! Module version parsing and the "newer release" rule.

use std::cmp::Ordering;

/// A `major.minor[.patch]` version with an optional pre-release tag.
///
/// Build metadata (`+...`) is accepted and dropped; it never affects
/// ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
    /// Pre-release tag (e.g., "alpha", "rc.1")
    pub prerelease: Option<String>,
}

impl ModuleVersion {
    /// Parse from string (e.g., "v1.2.3-alpha+build123"); a leading `v` is ignored.
    pub fn parse(version: &str) -> Result<Self, String> {
        let version = strip_tag_prefix(version.trim());

        let version_pre = version.split_once('+').map_or(version, |(head, _)| head);

        let (version_core, prerelease) = match version_pre.split_once('-') {
            Some((_, "")) => return Err(format!("Empty pre-release tag: {}", version)),
            Some((core, pre)) => (core, Some(pre.to_string())),
            None => (version_pre, None),
        };

        let parts: Vec<&str> = version_core.split('.').collect();
        if parts.len() < 2 || parts.len() > 3 {
            return Err(format!("Invalid version format: {}", version));
        }

        let major = parts[0]
            .parse::<u32>()
            .map_err(|_| format!("Invalid major version: {}", parts[0]))?;
        let minor = parts[1]
            .parse::<u32>()
            .map_err(|_| format!("Invalid minor version: {}", parts[1]))?;
        let patch = match parts.get(2) {
            Some(p) => p
                .parse::<u32>()
                .map_err(|_| format!("Invalid patch version: {}", p))?,
            None => 0,
        };

        Ok(Self {
            major,
            minor,
            patch,
            prerelease,
        })
    }

    /// Check if this version is newer than another
    pub fn is_newer_than(&self, other: &ModuleVersion) -> bool {
        let core = (self.major, self.minor, self.patch).cmp(&(other.major, other.minor, other.patch));
        let ordering = core.then_with(|| {
            compare_prerelease(self.prerelease.as_deref(), other.prerelease.as_deref())
        });
        ordering == Ordering::Greater
    }
}

/// A release outranks every pre-release of its core. Pre-release identifiers
/// compare left to right: numbers numerically and below any alphanumeric
/// identifier, and a shorter tag below a longer one it prefixes.
fn compare_prerelease(a: Option<&str>, b: Option<&str>) -> Ordering {
    let (a, b) = match (a, b) {
        (None, None) => return Ordering::Equal,
        (None, Some(_)) => return Ordering::Greater,
        (Some(_), None) => return Ordering::Less,
        (Some(a), Some(b)) => (a, b),
    };

    let mut left = a.split('.');
    let mut right = b.split('.');
    loop {
        let (l, r) = match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(l), Some(r)) => (l, r),
        };
        let ordering = match (l.parse::<u64>(), r.parse::<u64>()) {
            (Ok(l), Ok(r)) => l.cmp(&r),
            (Ok(_), Err(_)) => Ordering::Less,
            (Err(_), Ok(_)) => Ordering::Greater,
            (Err(_), Err(_)) => l.cmp(r),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
}

/// Strip a leading `v`/`V` from a release tag.
pub fn strip_tag_prefix(tag: &str) -> &str {
    tag.strip_prefix(['v', 'V']).unwrap_or(tag)
}

/// Whether a release tag names a version newer than `current`.
///
/// Both sides are compared by version order when they parse; otherwise any
/// textual difference (after stripping a leading `v`) counts as newer.
pub fn is_newer_release(latest_tag: &str, current: &str) -> bool {
    let latest = strip_tag_prefix(latest_tag.trim());
    let current = strip_tag_prefix(current.trim());
    if latest.is_empty() {
        return false;
    }

    match (ModuleVersion::parse(latest), ModuleVersion::parse(current)) {
        (Ok(l), Ok(c)) => l.is_newer_than(&c),
        _ => latest != current,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        let v = ModuleVersion::parse("v2.4").unwrap();
        assert_eq!((v.major, v.minor, v.patch), (2, 4, 0));
        assert_eq!(v.prerelease, None);

        let v = ModuleVersion::parse("1.2.3-rc.1+b7").unwrap();
        assert_eq!((v.major, v.minor, v.patch), (1, 2, 3));
        assert_eq!(v.prerelease.as_deref(), Some("rc.1"));

        assert!(ModuleVersion::parse("1").is_err());
        assert!(ModuleVersion::parse("1.x.0").is_err());
        assert!(ModuleVersion::parse("1.2.3.4").is_err());
        assert!(ModuleVersion::parse("1.2.3-").is_err());
    }

    #[test]
    fn test_numeric_comparison() {
        assert!(is_newer_release("v1.10.0", "1.9.9"));
        assert!(is_newer_release("2.0", "1.99.0"));
        assert!(!is_newer_release("v1.0.0", "1.0.0"));
        assert!(!is_newer_release("1.0.0", "1.2.0"));
        assert!(!is_newer_release("v1.2", "1.2.0"));
        assert!(is_newer_release("v1.2.0", "1.2.0-rc.1"));
        assert!(!is_newer_release("v1.2.0-rc.1", "1.2.0"));
    }

    #[test]
    fn test_prerelease_ordering() {
        assert!(is_newer_release("1.2.0-rc.2", "1.2.0-rc.1"));
        assert!(is_newer_release("1.2.0-alpha.10", "1.2.0-alpha.9"));
        assert!(is_newer_release("1.2.0-beta", "1.2.0-alpha.9"));
        assert!(is_newer_release("1.2.0-alpha.1", "1.2.0-alpha"));
        assert!(is_newer_release("1.2.0-alpha.beta", "1.2.0-alpha.1"));
        assert!(!is_newer_release("1.2.0-rc.1", "1.2.0-rc.1"));
        assert!(!is_newer_release("1.2.0+b2", "1.2.0+b1"));
        assert!(is_newer_release("1.2.1-rc.1", "1.2.0"));
    }

    #[test]
    fn test_textual_fallback() {
        assert!(is_newer_release("nightly-42", "1.0.0"));
        assert!(is_newer_release("1.0.1", "snapshot"));
        assert!(!is_newer_release("snapshot", "snapshot"));
        assert!(!is_newer_release("", "1.0.0"));
    }
}
