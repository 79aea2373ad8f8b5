// Data model mapping `lithops/invokers.py`'s job description dict and the
// per-call payload it assembles inside `_invoke`.

use std::collections::HashMap;

use invoker_common::constants::{CALL_ID_WIDTH, EXECUTION_TIMEOUT_GUARD_SECS};
use invoker_common::InvokerError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Opaque metadata bag copied verbatim into every call's [`Payload`] and
/// into the [`crate::call_handle::CallHandle`] returned to the caller.
pub type JobMetadata = HashMap<String, Value>;

/// A zero-padded decimal call index, stable across retries. See invariant 6:
/// `CallId::new(i)` is exactly `format!("{:05}", i)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CallId(String);

impl CallId {
    pub fn new(index: usize) -> Self {
        Self(format!("{index:0width$}", width = CALL_ID_WIDTH))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn index(&self) -> Result<usize, std::num::ParseIntError> {
        self.0.parse()
    }
}

impl std::fmt::Display for CallId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A byte range within `data_key`'s serialized blob assigned to one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataRange {
    pub start: u64,
    pub end: u64,
}

/// An admitted, immutable job description. Shared by reference among
/// dispatcher workers; never mutated after [`Job::admit`].
#[derive(Debug, Clone)]
pub struct Job {
    pub executor_id: String,
    pub job_id: String,
    pub function_name: String,
    pub total_calls: usize,
    pub runtime_name: String,
    pub runtime_memory: u32,
    pub runtime_timeout: u64,
    pub execution_timeout: u64,
    pub func_key: String,
    pub data_key: String,
    pub data_ranges: Vec<DataRange>,
    pub extra_env: HashMap<String, String>,
    pub invoke_pool_threads: usize,
    pub metadata: JobMetadata,
}

/// Raw, unvalidated job description as a caller would assemble it before
/// handing it to [`crate::facade::InvokerFacade::run`].
#[derive(Debug, Clone)]
pub struct JobDescription {
    pub executor_id: String,
    pub job_id: String,
    pub function_name: String,
    pub total_calls: usize,
    pub func_key: String,
    pub data_key: String,
    pub data_ranges: Vec<DataRange>,
    pub extra_env: HashMap<String, String>,
    pub invoke_pool_threads: usize,
    pub metadata: JobMetadata,
    pub execution_timeout: u64,
}

impl Job {
    /// Admits a raw description, filling in runtime settings from config and
    /// truncating `execution_timeout` against the `runtime_timeout` guard
    /// (the invariant from the data model: `execution_timeout <=
    /// runtime_timeout - 5`). Fails if `runtime_timeout` is too small to
    /// leave any budget at all after the guard is applied.
    pub fn admit(
        desc: JobDescription,
        runtime_name: String,
        runtime_memory: u32,
        runtime_timeout: u64,
    ) -> Result<Self, InvokerError> {
        let guard = runtime_timeout.saturating_sub(EXECUTION_TIMEOUT_GUARD_SECS);
        if guard == 0 {
            return Err(InvokerError::InvalidTimeoutBudget { runtime_timeout });
        }
        let execution_timeout = desc.execution_timeout.min(guard);
        Ok(Self {
            executor_id: desc.executor_id,
            job_id: desc.job_id,
            function_name: desc.function_name,
            total_calls: desc.total_calls,
            runtime_name,
            runtime_memory,
            runtime_timeout,
            execution_timeout,
            func_key: desc.func_key,
            data_key: desc.data_key,
            data_ranges: desc.data_ranges,
            extra_env: desc.extra_env,
            invoke_pool_threads: desc.invoke_pool_threads,
            metadata: desc.metadata,
        })
    }

    pub fn call_ids(&self) -> impl Iterator<Item = CallId> + '_ {
        (0..self.total_calls).map(CallId::new)
    }
}

/// Per-invocation wire payload. Mirrors the JSON body the source system
/// sends to the backend's action entrypoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payload {
    pub log_level: String,
    pub func_key: String,
    pub data_key: String,
    pub extra_env: HashMap<String, String>,
    pub execution_timeout: u64,
    pub data_byte_range: Option<DataRange>,
    pub executor_id: String,
    pub job_id: String,
    pub call_id: CallId,
    pub host_submit_tstamp: f64,
    pub lithops_version: String,
    pub runtime_name: String,
    pub runtime_memory: u32,
    pub runtime_timeout: u64,
}

impl Payload {
    pub fn for_call(job: &Job, call_id: CallId, host_submit_tstamp: f64) -> Self {
        let index = call_id.index().unwrap_or(0);
        Self {
            log_level: "INFO".to_string(),
            func_key: job.func_key.clone(),
            data_key: job.data_key.clone(),
            extra_env: job.extra_env.clone(),
            execution_timeout: job.execution_timeout,
            data_byte_range: job.data_ranges.get(index).copied(),
            executor_id: job.executor_id.clone(),
            job_id: job.job_id.clone(),
            call_id,
            host_submit_tstamp,
            lithops_version: invoker_sdk::InvokerPackage::VERSION.to_string(),
            runtime_name: job.runtime_name.clone(),
            runtime_memory: job.runtime_memory,
            runtime_timeout: job.runtime_timeout,
        }
    }
}

/// Payload for the remote-invoker branch: the whole job description is
/// handed to a single activation that runs its own embedded dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteInvokerPayload {
    pub job_description: RemoteJobDescription,
    pub remote_invoker: bool,
    pub invokers: u32,
    pub lithops_version: String,
    pub runtime_name: String,
    pub runtime_memory: u32,
    pub runtime_timeout: u64,
}

/// The subset of [`Job`] fields serialized into [`RemoteInvokerPayload`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteJobDescription {
    pub executor_id: String,
    pub job_id: String,
    pub function_name: String,
    pub total_calls: usize,
    pub func_key: String,
    pub data_key: String,
    pub extra_env: HashMap<String, String>,
    pub execution_timeout: u64,
}

impl From<&Job> for RemoteJobDescription {
    fn from(job: &Job) -> Self {
        Self {
            executor_id: job.executor_id.clone(),
            job_id: job.job_id.clone(),
            function_name: job.function_name.clone(),
            total_calls: job.total_calls,
            func_key: job.func_key.clone(),
            data_key: job.data_key.clone(),
            extra_env: job.extra_env.clone(),
            execution_timeout: job.execution_timeout,
        }
    }
}
