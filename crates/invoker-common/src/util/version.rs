// Runtime version comparison mapping `lithops.utils.version_str` and the
// major.minor equality check `ServerlessInvoker.select_runtime` performs
// between the local interpreter and the remote runtime's metadata.

/// A parsed `major.minor[.patch]` version string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeVersion {
    pub major: u32,
    pub minor: u32,
}

impl RuntimeVersion {
    /// Parse a version string such as `"3.11.4"` or `"3.11"`. Only the
    /// major and minor components are kept — patch-level drift between
    /// local and remote is not considered incompatible.
    pub fn parse(raw: &str) -> Option<Self> {
        let mut parts = raw.trim().splitn(3, '.');
        let major: u32 = parts.next()?.parse().ok()?;
        let minor: u32 = parts.next()?.parse().ok()?;
        Some(Self { major, minor })
    }
}

impl std::fmt::Display for RuntimeVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Returns `true` when `local` and `remote` agree on major.minor, or when
/// either fails to parse (an unparseable version is never treated as a
/// mismatch — the original system only ever compared well-formed strings).
pub fn major_minor_compatible(local: &str, remote: &str) -> bool {
    match (RuntimeVersion::parse(local), RuntimeVersion::parse(remote)) {
        (Some(l), Some(r)) => l == r,
        _ => local == remote,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_major_minor_is_compatible() {
        assert!(major_minor_compatible("3.11.4", "3.11.0"));
    }

    #[test]
    fn different_minor_is_incompatible() {
        assert!(!major_minor_compatible("3.11", "3.9"));
    }

    #[test]
    fn unparseable_falls_back_to_exact_match() {
        assert!(major_minor_compatible("dev", "dev"));
        assert!(!major_minor_compatible("dev", "other"));
    }
}
