// Invoker Facade (C8): entry point orchestrating the first-burst dispatch
// and monitor startup, mapping `ServerlessInvoker.run`/`stop` in the source
// system.

use std::sync::Arc;

use invoker_common::constants::{INVOKER_PROCESSES, REMOTE_INVOKER_FANOUT, REMOTE_INVOKER_MEMORY};
use invoker_common::tracing::{TraceManager, Tracing};
use invoker_common::{InvokerConfig, InvokerError};
use tokio::sync::Mutex;
use tokio::task::JoinSet;

use crate::backend::ComputeBackend;
use crate::call_handle::CallHandle;
use crate::dispatcher::{invoke, DispatcherPool};
use crate::job::{CallId, Job, JobDescription, RemoteInvokerPayload, RemoteJobDescription};
use crate::monitor::{JobMonitor, JobMonitorHandle};
use crate::queues::{PendingQueue, TokenBucket};
use crate::runtime::RuntimeSelector;
use crate::store::MetadataStore;

struct FacadeInner {
    running: bool,
    ongoing_activations: usize,
    dispatcher_pool: Option<DispatcherPool>,
    monitors: Vec<JobMonitorHandle>,
}

/// Owns the Token Bucket, Pending Queue, running flag, and Dispatcher Pool
/// for the process lifetime. One facade normally serves a single logical
/// job stream; see the open question in the module-level design notes
/// about `run -> stop -> run` reuse, resolved here by making the facade
/// restartable (a fresh `run` after `stop` starts a new dispatcher pool).
pub struct InvokerFacade {
    config: InvokerConfig,
    backend: Arc<dyn ComputeBackend>,
    selector: RuntimeSelector,
    token_bucket: TokenBucket,
    pending: PendingQueue,
    job_monitor: JobMonitor,
    runtime_handle: tokio::runtime::Handle,
    trace: Tracing,
    inner: Mutex<FacadeInner>,
}

impl InvokerFacade {
    pub fn new(
        config: InvokerConfig,
        backend: Arc<dyn ComputeBackend>,
        store: Arc<dyn MetadataStore>,
        runtime_handle: tokio::runtime::Handle,
        trace_manager: TraceManager,
    ) -> Self {
        let token_bucket = TokenBucket::new();
        let pending = PendingQueue::new();
        let selector = RuntimeSelector::new(
            backend.clone(),
            store.clone(),
            trace_manager.get("RuntimeSelector"),
        );
        let job_monitor = JobMonitor::new(store, token_bucket.clone(), trace_manager.get("JobMonitor"));

        Self {
            config,
            backend,
            selector,
            token_bucket,
            pending,
            job_monitor,
            runtime_handle,
            trace: trace_manager.get("InvokerFacade"),
            inner: Mutex::new(FacadeInner {
                running: false,
                ongoing_activations: 0,
                dispatcher_pool: None,
                monitors: Vec::new(),
            }),
        }
    }

    /// Admits and dispatches a job. Returns one [`CallHandle`] per call, all
    /// in the `Invoked` state, or an error if admission or the initial
    /// dispatch fails — in which case `stop()` is called before the error
    /// is re-raised.
    pub async fn run(&self, desc: JobDescription) -> Result<Vec<CallHandle>, InvokerError> {
        let serverless = self.config.serverless.clone();
        let result = self.admit_and_run(desc, &serverless).await;
        match result {
            Ok(handles) => Ok(handles),
            Err(err) => {
                self.stop().await;
                Err(err)
            }
        }
    }

    async fn admit_and_run(
        &self,
        desc: JobDescription,
        serverless: &invoker_common::ServerlessSection,
    ) -> Result<Vec<CallHandle>, InvokerError> {
        let job = Arc::new(Job::admit(
            desc,
            serverless.runtime.clone(),
            serverless.runtime_memory,
            serverless.runtime_timeout,
        )?);
        self.try_run(job, serverless).await
    }

    async fn try_run(
        &self,
        job: Arc<Job>,
        serverless: &invoker_common::ServerlessSection,
    ) -> Result<Vec<CallHandle>, InvokerError> {
        // Drain stale tokens minted after a prior job's last dispatch so
        // they don't leak into this job's capacity accounting.
        let drained = self.token_bucket.drain();
        if drained > 0 {
            let mut inner = self.inner.lock().await;
            inner.ongoing_activations = inner.ongoing_activations.saturating_sub(drained);
        }

        if serverless.remote_invoker {
            self.run_remote_invoker(job).await
        } else {
            self.run_local(job).await
        }
    }

    async fn run_remote_invoker(&self, job: Arc<Job>) -> Result<Vec<CallHandle>, InvokerError> {
        self.selector
            .select_runtime(&job.runtime_name, REMOTE_INVOKER_MEMORY, job.runtime_timeout)
            .await?;

        let payload = RemoteInvokerPayload {
            job_description: RemoteJobDescription::from(job.as_ref()),
            remote_invoker: true,
            invokers: REMOTE_INVOKER_FANOUT,
            lithops_version: invoker_sdk::InvokerPackage::VERSION.to_string(),
            runtime_name: job.runtime_name.clone(),
            runtime_memory: REMOTE_INVOKER_MEMORY,
            runtime_timeout: job.runtime_timeout,
        };

        let activation_id = self
            .backend
            .invoke_remote(&job.runtime_name, REMOTE_INVOKER_MEMORY, &payload)
            .await
            .map_err(InvokerError::Adapter)?;

        if activation_id.is_none() {
            return Err(InvokerError::RemoteInvokerSpawnFailed);
        }

        self.trace.info(&format!(
            "delegated job {}/{} to remote invoker with fanout {REMOTE_INVOKER_FANOUT}",
            job.executor_id, job.job_id
        ));

        Ok(job
            .call_ids()
            .map(|id| CallHandle::invoked(id, job.metadata.clone()))
            .collect())
    }

    async fn run_local(&self, job: Arc<Job>) -> Result<Vec<CallHandle>, InvokerError> {
        self.selector
            .select_runtime(&job.runtime_name, job.runtime_memory, job.runtime_timeout)
            .await?;

        let (direct_ids, queued_ids) = {
            let mut inner = self.inner.lock().await;
            if !inner.running {
                inner.ongoing_activations = 0;
                inner.running = true;
                let pool = DispatcherPool::start(
                    INVOKER_PROCESSES,
                    self.backend.clone(),
                    self.token_bucket.clone(),
                    self.pending.clone(),
                    self.runtime_handle.clone(),
                    self.trace.clone(),
                );
                inner.dispatcher_pool = Some(pool);
            }

            let direct = self
                .config
                .lithops
                .workers
                .saturating_sub(inner.ongoing_activations)
                .min(job.total_calls);
            let direct_ids: Vec<CallId> = (0..direct).map(CallId::new).collect();
            let queued_ids: Vec<CallId> = (direct..job.total_calls).map(CallId::new).collect();
            inner.ongoing_activations += direct_ids.len();
            (direct_ids, queued_ids)
        };

        // The direct burst represents the initial worker budget and does
        // not consume tokens; every call after it is paced by completion
        // tokens the monitor mints. Scoped to this call and fully awaited
        // before `run` returns, so a failure here leaks no workers and
        // surfaces to the caller of `run` (via `?`, which unwinds through
        // `try_run` into `run`'s `stop()`-then-reraise handling).
        self.submit_direct_burst(job.clone(), direct_ids).await?;

        for call_id in queued_ids {
            self.pending.put(job.clone(), call_id);
        }

        let monitor_handle = self.start_monitor_for(job.clone()).await?;
        {
            let mut inner = self.inner.lock().await;
            inner.monitors.push(monitor_handle);
        }

        Ok(job
            .call_ids()
            .map(|id| CallHandle::invoked(id, job.metadata.clone()))
            .collect())
    }

    /// Awaits the whole burst so a backend exception surfaces out of `run`
    /// rather than being swallowed: the first `Err` any call in the burst
    /// returns is carried back as [`InvokerError::BackendInvokeError`] once
    /// every spawned call has settled.
    async fn submit_direct_burst(
        &self,
        job: Arc<Job>,
        direct_ids: Vec<CallId>,
    ) -> Result<(), InvokerError> {
        if direct_ids.is_empty() {
            return Ok(());
        }
        let concurrency = job.invoke_pool_threads.max(1);
        let semaphore = Arc::new(tokio::sync::Semaphore::new(concurrency));
        let mut set = JoinSet::new();

        for call_id in direct_ids {
            let backend = self.backend.clone();
            let token_bucket = self.token_bucket.clone();
            let pending = self.pending.clone();
            let trace = self.trace.clone();
            let job = job.clone();
            let semaphore = semaphore.clone();
            set.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                invoke(job, call_id, backend, token_bucket, pending, trace).await
            });
        }

        let mut first_err = None;
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(Err(err)) if first_err.is_none() => first_err = Some(err),
                Ok(_) => {}
                Err(join_err) if first_err.is_none() => {
                    first_err = Some(anyhow::Error::from(join_err));
                }
                Err(_) => {}
            }
        }

        match first_err {
            Some(err) => Err(InvokerError::BackendInvokeError(err)),
            None => Ok(()),
        }
    }

    async fn start_monitor_for(&self, job: Arc<Job>) -> Result<JobMonitorHandle, InvokerError> {
        if self.config.lithops.rabbitmq_monitor {
            return self.start_message_bus_monitor(job).await;
        }
        Ok(self.job_monitor.start_storage_polling(job))
    }

    #[cfg(feature = "rabbitmq")]
    async fn start_message_bus_monitor(&self, job: Arc<Job>) -> Result<JobMonitorHandle, InvokerError> {
        let amqp_url = self.config.rabbitmq.amqp_url.clone().ok_or_else(|| {
            InvokerError::Adapter(anyhow::anyhow!(
                "rabbitmq.amqp_url is required when lithops.rabbitmq_monitor is enabled"
            ))
        })?;
        self.job_monitor
            .start_message_bus(job, &amqp_url)
            .await
            .map_err(InvokerError::Adapter)
    }

    #[cfg(not(feature = "rabbitmq"))]
    async fn start_message_bus_monitor(&self, _job: Arc<Job>) -> Result<JobMonitorHandle, InvokerError> {
        Err(InvokerError::Adapter(anyhow::anyhow!(
            "lithops.rabbitmq_monitor was requested but this build was compiled without the rabbitmq feature"
        )))
    }

    /// Signals the Job Monitor(s) to stop, flips the running flag, unblocks
    /// every dispatcher worker with a sentinel token and pair, and discards
    /// unstarted pending work. Cooperative: in-flight HTTP calls run to
    /// completion.
    pub async fn stop(&self) {
        let (pool, monitors) = {
            let mut inner = self.inner.lock().await;
            inner.running = false;
            (inner.dispatcher_pool.take(), std::mem::take(&mut inner.monitors))
        };

        for monitor in monitors {
            monitor.stop();
        }

        if let Some(pool) = pool {
            let _ = tokio::task::spawn_blocking(move || pool.stop()).await;
        }

        self.pending.drain();
    }
}
