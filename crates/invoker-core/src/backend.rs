// Compute Backend Interface (C1): the abstract contract the core consumes
// to create runtimes and invoke calls. A concrete adapter speaks the FaaS
// provider's HTTP protocol; the core never does.

use async_trait::async_trait;

use crate::job::{Payload, RemoteInvokerPayload};
use crate::runtime::RuntimeMeta;

/// An opaque, backend-assigned activation identifier.
pub type ActivationId = String;

#[async_trait]
pub trait ComputeBackend: Send + Sync {
    /// Deterministic, stable key for `(runtime_name, runtime_memory)`, used
    /// to look up and store [`RuntimeMeta`] in the metadata store.
    fn get_runtime_key(&self, runtime_name: &str, runtime_memory: u32) -> String;

    /// Provisions (or re-provisions) the runtime. Must be idempotent:
    /// concurrent callers racing on the same key may both invoke this, and
    /// the last `put_runtime_meta` wins.
    async fn create_runtime(
        &self,
        runtime_name: &str,
        runtime_memory: u32,
        timeout: u64,
    ) -> anyhow::Result<RuntimeMeta>;

    /// Dispatches one call. `Ok(None)` encodes quota rejection — the caller
    /// retries. `Err` is fatal and propagates out of the invocation that
    /// triggered it.
    async fn invoke(
        &self,
        runtime_name: &str,
        runtime_memory: u32,
        payload: &Payload,
    ) -> anyhow::Result<Option<ActivationId>>;

    /// Dispatches the remote-invoker branch's single delegating activation.
    async fn invoke_remote(
        &self,
        runtime_name: &str,
        runtime_memory: u32,
        payload: &RemoteInvokerPayload,
    ) -> anyhow::Result<Option<ActivationId>>;

    /// Ships an entire job description to a single standalone worker.
    /// Only used by the standalone (non-serverless) variant, which this
    /// core does not schedule; kept on the trait so an adapter implements
    /// one coherent surface.
    async fn run_job(&self, payload: &Payload) -> anyhow::Result<Option<ActivationId>>;
}
