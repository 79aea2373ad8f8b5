// Runtime Selector (C3): lazily provisions/validates the backend runtime
// for a job, mapping `ServerlessInvoker.select_runtime` in the source
// system.

use std::sync::Arc;

use invoker_common::tracing::Tracing;
use invoker_common::{major_minor_compatible, InvokerError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::backend::ComputeBackend;
use crate::store::MetadataStore;

/// Persisted once per `(runtime_name, runtime_memory)`, immutable
/// thereafter. `preinstalled_modules` is opaque to the core — it is
/// forwarded verbatim between `create_runtime` and whatever consumes it
/// downstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeMeta {
    pub runtime_name: String,
    pub language_version: String,
    pub preinstalled_modules: Value,
}

/// The local interpreter/ABI version the runtime selector compares against.
/// In the source system this is `sys.version_info`; here it's the version
/// of the invocation core itself, standing in for "the local runtime ABI".
pub const LOCAL_LANGUAGE_VERSION: &str = invoker_sdk::InvokerPackage::VERSION;

pub struct RuntimeSelector {
    backend: Arc<dyn ComputeBackend>,
    store: Arc<dyn MetadataStore>,
    trace: Tracing,
}

impl RuntimeSelector {
    pub fn new(backend: Arc<dyn ComputeBackend>, store: Arc<dyn MetadataStore>, trace: Tracing) -> Self {
        Self {
            backend,
            store,
            trace,
        }
    }

    /// Lazily provisions and validates a runtime. Concurrent calls for the
    /// same `runtime_key` may both reach `create_runtime`; the backend is
    /// expected to be idempotent and the later `put_runtime_meta` wins —
    /// deliberately no distributed lock here.
    pub async fn select_runtime(
        &self,
        runtime_name: &str,
        runtime_memory: u32,
        runtime_timeout: u64,
    ) -> Result<RuntimeMeta, InvokerError> {
        let runtime_key = self.backend.get_runtime_key(runtime_name, runtime_memory);

        let meta = match self.store.get_runtime_meta(&runtime_key).await {
            Ok(meta) => meta,
            Err(_) => {
                self.trace
                    .verbose(&format!("runtime '{runtime_key}' not deployed, creating"));
                let meta = self
                    .backend
                    .create_runtime(runtime_name, runtime_memory, runtime_timeout)
                    .await
                    .map_err(InvokerError::Adapter)?;
                self.store
                    .put_runtime_meta(&runtime_key, &meta)
                    .await
                    .map_err(InvokerError::Adapter)?;
                meta
            }
        };

        if !major_minor_compatible(LOCAL_LANGUAGE_VERSION, &meta.language_version) {
            return Err(InvokerError::RuntimeIncompatible {
                runtime_name: runtime_name.to_string(),
                remote_version: meta.language_version.clone(),
                local_version: LOCAL_LANGUAGE_VERSION.to_string(),
            });
        }

        Ok(meta)
    }
}
