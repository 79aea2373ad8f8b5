// Error kinds for the invocation core, grounded on the taxonomy the source
// system used (`Exceptions.cs`-style: distinguish retryable from fatal).
//
// `InvokerError` covers the fatal paths that must surface out of
// `InvokerFacade::run` (runtime mismatch, a backend exception, a failed
// remote-invoker spawn). Quota rejection, a metadata-store miss, and a
// transient store error during polling are recovered internally by the
// dispatcher and monitor respectively and never reach this type.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum InvokerError {
    /// The remote runtime's language/ABI version does not match the local
    /// one (major.minor equality). Fatal to the job.
    #[error(
        "runtime '{runtime_name}' is running version {remote_version}, \
         which is incompatible with the local version {local_version}"
    )]
    RuntimeIncompatible {
        runtime_name: String,
        remote_version: String,
        local_version: String,
    },

    /// `backend.invoke` raised rather than returning `None`. Fatal to the
    /// call; propagates out of `run` after the facade calls `stop()`.
    #[error("backend invocation failed: {0}")]
    BackendInvokeError(#[source] anyhow::Error),

    /// The remote-invoker branch could not obtain an activation id for the
    /// single delegating activation.
    #[error("unable to spawn remote invoker")]
    RemoteInvokerSpawnFailed,

    /// `execution_timeout` could not be reconciled against
    /// `runtime_timeout` (the guard left nothing to work with).
    #[error("runtime_timeout {runtime_timeout}s leaves no room for execution_timeout")]
    InvalidTimeoutBudget { runtime_timeout: u64 },

    /// Surfaced by a `ComputeBackend`/`MetadataStore` adapter for anything
    /// the core treats as an opaque setup failure.
    #[error(transparent)]
    Adapter(#[from] anyhow::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runtime_incompatible_message() {
        let err = InvokerError::RuntimeIncompatible {
            runtime_name: "python3.11".into(),
            remote_version: "3.9".into(),
            local_version: "3.11".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("3.9"));
        assert!(msg.contains("3.11"));
    }
}
