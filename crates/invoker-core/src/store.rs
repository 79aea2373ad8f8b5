// Metadata Store Interface (C2): the abstract contract for persisted
// runtime metadata and job status, backed by an object-storage adapter the
// core treats as an external collaborator.

use async_trait::async_trait;

use crate::runtime::RuntimeMeta;

/// Monotonic sets of call ids reported by the backend for one job.
#[derive(Debug, Clone, Default)]
pub struct JobStatus {
    pub running_ids: Vec<String>,
    pub done_ids: Vec<String>,
}

#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Raises (returns `Err`) on a miss — the runtime selector treats any
    /// failure here as "not deployed" and proceeds to create one.
    async fn get_runtime_meta(&self, key: &str) -> anyhow::Result<RuntimeMeta>;

    async fn put_runtime_meta(&self, key: &str, meta: &RuntimeMeta) -> anyhow::Result<()>;

    /// Polled by the storage-polling job monitor once per second.
    async fn get_job_status(&self, executor_id: &str, job_id: &str) -> anyhow::Result<JobStatus>;
}
