// Dispatcher Pool (C6): a fixed set of worker loops that pair tokens with
// pending calls and invoke them, mapping `ServerlessInvoker._run_invoker_process`.
//
// The source system forks a dispatcher onto a separate OS process when the
// platform supports it and the caller isn't already inside a worker,
// otherwise runs it as a thread. A tokio-based port has no sound
// equivalent to that fork: trait objects and an async runtime handle don't
// survive a process boundary without a serialization contract the spec
// doesn't define. `DispatcherExecutor` models the choice as a single
// abstraction anyway, selected by `select_executor`, so a future executor
// (e.g. one that shells out to a subprocess dispatcher binary) can slot in
// without touching `DispatcherPool`. Today it always resolves to
// [`ThreadedDispatcherExecutor`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use invoker_common::constants::{EXECUTOR_POOL_CAP, QUOTA_BACKOFF_MAX_SECS, QUOTA_BACKOFF_MIN_SECS};
use invoker_common::tracing::Tracing;
use rand::Rng;
use tokio::sync::Semaphore;

use crate::backend::ComputeBackend;
use crate::job::{CallId, Job, Payload};
use crate::queues::{PendingItem, PendingQueue, Token, TokenBucket};

fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Executes a single call: builds the payload, invokes the backend, and
/// reacts to quota rejection by re-enqueueing the call and minting a
/// replacement token. Runs as a tokio task so the dispatcher thread never
/// blocks on the outbound HTTP call.
///
/// Returns `Err` only when the backend call itself raised (as opposed to a
/// quota rejection, which is recovered here and never surfaced). Callers on
/// the queued dispatcher-worker path are detached background tasks with no
/// caller to propagate to and treat this as already having been logged; the
/// direct-burst path in the facade is awaited synchronously and surfaces
/// this error out of `run`.
pub async fn invoke(
    job: Arc<Job>,
    call_id: CallId,
    backend: Arc<dyn ComputeBackend>,
    token_bucket: TokenBucket,
    pending: PendingQueue,
    trace: Tracing,
) -> Result<(), anyhow::Error> {
    let payload = Payload::for_call(&job, call_id.clone(), now_secs());
    let started = std::time::Instant::now();

    match backend.invoke(&job.runtime_name, job.runtime_memory, &payload).await {
        Ok(Some(activation_id)) => {
            trace.info(&format!(
                "call {call_id} invoked as {activation_id} in {:?}",
                started.elapsed()
            ));
            Ok(())
        }
        Ok(None) => {
            let backoff_secs = rand::thread_rng().gen_range(QUOTA_BACKOFF_MIN_SECS..=QUOTA_BACKOFF_MAX_SECS);
            trace.warning(&format!(
                "call {call_id} quota-rejected, retrying after {backoff_secs}s"
            ));
            tokio::time::sleep(Duration::from_secs(backoff_secs)).await;
            pending.put(job, call_id);
            token_bucket.put(Token::Unit);
            Ok(())
        }
        Err(err) => {
            trace.error(&format!("call {call_id} backend invoke failed: {err:#}"));
            Err(err)
        }
    }
}

/// Abstraction over how a dispatcher worker's control loop is scheduled.
pub trait DispatcherExecutor: Send + Sync {
    #[allow(clippy::too_many_arguments)]
    fn spawn_worker(
        &self,
        worker_id: usize,
        backend: Arc<dyn ComputeBackend>,
        token_bucket: TokenBucket,
        pending: PendingQueue,
        running: Arc<AtomicBool>,
        runtime_handle: tokio::runtime::Handle,
        trace: Tracing,
    ) -> std::thread::JoinHandle<()>;
}

/// Runs each dispatcher's control loop (`token <- get(); pending <- get();
/// submit invoke`) on its own OS thread, and each submitted `invoke` call as
/// a tokio task bounded by a per-worker semaphore (the executor pool cap).
pub struct ThreadedDispatcherExecutor;

impl DispatcherExecutor for ThreadedDispatcherExecutor {
    fn spawn_worker(
        &self,
        worker_id: usize,
        backend: Arc<dyn ComputeBackend>,
        token_bucket: TokenBucket,
        pending: PendingQueue,
        running: Arc<AtomicBool>,
        runtime_handle: tokio::runtime::Handle,
        trace: Tracing,
    ) -> std::thread::JoinHandle<()> {
        let semaphore = Arc::new(Semaphore::new(EXECUTOR_POOL_CAP));
        std::thread::Builder::new()
            .name(format!("dispatcher-{worker_id}"))
            .spawn(move || loop {
                let token = token_bucket.get();
                if token == Token::Sentinel {
                    trace.verbose(&format!("dispatcher {worker_id} observed sentinel token, exiting"));
                    break;
                }

                let item = pending.get();
                let (job, call_id) = match item {
                    PendingItem::Sentinel => {
                        trace.verbose(&format!("dispatcher {worker_id} observed sentinel pair, exiting"));
                        break;
                    }
                    PendingItem::Call(job, call_id) => (job, call_id),
                };

                if !running.load(Ordering::SeqCst) {
                    break;
                }

                let backend = backend.clone();
                let token_bucket = token_bucket.clone();
                let pending = pending.clone();
                let trace = trace.clone();
                let semaphore = semaphore.clone();

                runtime_handle.spawn(async move {
                    let _permit = semaphore.acquire_owned().await;
                    // Errors are already logged inside `invoke`; this is a
                    // detached worker task with no caller to propagate to.
                    let _ = invoke(job, call_id, backend, token_bucket, pending, trace).await;
                });
            })
            .expect("failed to spawn dispatcher worker thread")
    }
}

/// Always resolves to the threaded executor. A config-predicate selector
/// kept distinct from `DispatcherPool::start` so a future process-based
/// executor can be added without changing call sites — see the module
/// doc comment for why that executor doesn't exist yet.
pub fn select_executor() -> Arc<dyn DispatcherExecutor> {
    Arc::new(ThreadedDispatcherExecutor)
}

/// Fixed set of P dispatcher workers owned by the facade for the process
/// lifetime.
pub struct DispatcherPool {
    workers: Vec<std::thread::JoinHandle<()>>,
    running: Arc<AtomicBool>,
    token_bucket: TokenBucket,
    pending: PendingQueue,
}

impl DispatcherPool {
    pub fn start(
        num_workers: usize,
        backend: Arc<dyn ComputeBackend>,
        token_bucket: TokenBucket,
        pending: PendingQueue,
        runtime_handle: tokio::runtime::Handle,
        trace: Tracing,
    ) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let executor = select_executor();
        let workers = (0..num_workers)
            .map(|worker_id| {
                executor.spawn_worker(
                    worker_id,
                    backend.clone(),
                    token_bucket.clone(),
                    pending.clone(),
                    running.clone(),
                    runtime_handle.clone(),
                    trace.clone(),
                )
            })
            .collect();

        Self {
            workers,
            running,
            token_bucket,
            pending,
        }
    }

    /// Signals shutdown, unblocks every worker with one sentinel token and
    /// one sentinel pending pair, then joins all worker threads.
    pub fn stop(self) {
        self.running.store(false, Ordering::SeqCst);
        for _ in &self.workers {
            self.token_bucket.put(Token::Sentinel);
            self.pending.put_sentinel();
        }
        for worker in self.workers {
            let _ = worker.join();
        }
    }
}
