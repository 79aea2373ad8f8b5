/// Build constants for the invoker package.
/// Mirrors `lithops.version.__version__`, which callers embed in every
/// dispatched payload so the remote runtime can assert wire compatibility.

/// Source control information.
pub struct Source;

impl Source {
    /// The commit hash from which this binary was built.
    /// Set via the `INVOKER_COMMIT_HASH` env var at compile time, or "N/A".
    pub const COMMIT_HASH: &'static str = match option_env!("INVOKER_COMMIT_HASH") {
        Some(h) => h,
        None => "N/A",
    };
}

/// Invocation-core package metadata.
#[derive(Debug, Clone)]
pub struct InvokerPackage;

impl InvokerPackage {
    /// The semantic version of the invocation core, embedded in every
    /// dispatched payload as `lithops_version` in the original system.
    pub const VERSION: &'static str = env!("CARGO_PKG_VERSION");

    /// The package / distribution name.
    pub const PACKAGE_NAME: &'static str = match option_env!("INVOKER_PACKAGE_NAME") {
        Some(n) => n,
        None => "N/A",
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_not_empty() {
        assert!(!InvokerPackage::VERSION.is_empty());
    }

    #[test]
    fn commit_hash_has_default() {
        assert!(!Source::COMMIT_HASH.is_empty());
    }
}
