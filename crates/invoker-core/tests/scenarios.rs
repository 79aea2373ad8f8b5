// End-to-end scenarios exercising `InvokerFacade::run` against fake
// `ComputeBackend`/`MetadataStore` adapters, covering the burst/overflow/
// quota-storm/version-mismatch/remote-invoker behaviors.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use invoker_common::config::{InvokerConfig, LithopsSection, RabbitmqSection, ServerlessSection};
use invoker_common::tracing::TraceManager;
use invoker_core::{
    ComputeBackend, DataRange, Job, JobDescription, JobStatus, MetadataStore, Payload,
    RemoteInvokerPayload, RuntimeMeta,
};
use parking_lot::Mutex;

struct FakeBackend {
    invoke_calls: AtomicUsize,
    remote_calls: AtomicUsize,
    /// First `reject_first_n` calls to `invoke` return `Ok(None)` (quota
    /// rejection); every call after that succeeds.
    reject_first_n: usize,
    language_version: String,
    /// Shared with the store: marks a call done shortly after invocation so
    /// the storage-polling monitor observes real completions.
    done_sink: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl ComputeBackend for FakeBackend {
    fn get_runtime_key(&self, runtime_name: &str, runtime_memory: u32) -> String {
        format!("{runtime_name}-{runtime_memory}")
    }

    async fn create_runtime(
        &self,
        runtime_name: &str,
        _runtime_memory: u32,
        _timeout: u64,
    ) -> anyhow::Result<RuntimeMeta> {
        Ok(RuntimeMeta {
            runtime_name: runtime_name.to_string(),
            language_version: self.language_version.clone(),
            preinstalled_modules: serde_json::Value::Null,
        })
    }

    async fn invoke(
        &self,
        _runtime_name: &str,
        _runtime_memory: u32,
        payload: &Payload,
    ) -> anyhow::Result<Option<String>> {
        let n = self.invoke_calls.fetch_add(1, Ordering::SeqCst);
        if n < self.reject_first_n {
            return Ok(None);
        }
        let call_id = payload.call_id.as_str().to_string();
        let done_sink = self.done_sink.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            done_sink.lock().push(call_id);
        });
        Ok(Some(format!("act-{n}")))
    }

    async fn invoke_remote(
        &self,
        _runtime_name: &str,
        _runtime_memory: u32,
        _payload: &RemoteInvokerPayload,
    ) -> anyhow::Result<Option<String>> {
        self.remote_calls.fetch_add(1, Ordering::SeqCst);
        Ok(Some("act-remote".to_string()))
    }

    async fn run_job(&self, _payload: &Payload) -> anyhow::Result<Option<String>> {
        unimplemented!("standalone variant is out of scope")
    }
}

#[derive(Default)]
struct FakeStore {
    metas: DashMap<String, RuntimeMeta>,
    done: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl MetadataStore for FakeStore {
    async fn get_runtime_meta(&self, key: &str) -> anyhow::Result<RuntimeMeta> {
        self.metas
            .get(key)
            .map(|m| m.clone())
            .ok_or_else(|| anyhow::anyhow!("miss"))
    }

    async fn put_runtime_meta(&self, key: &str, meta: &RuntimeMeta) -> anyhow::Result<()> {
        self.metas.insert(key.to_string(), meta.clone());
        Ok(())
    }

    async fn get_job_status(&self, _executor_id: &str, _job_id: &str) -> anyhow::Result<JobStatus> {
        Ok(JobStatus {
            running_ids: vec![],
            done_ids: self.done.lock().clone(),
        })
    }
}

fn config(workers: usize, remote_invoker: bool) -> InvokerConfig {
    InvokerConfig {
        lithops: LithopsSection {
            workers,
            rabbitmq_monitor: false,
        },
        serverless: ServerlessSection {
            runtime: "python3.11".to_string(),
            runtime_memory: 256,
            runtime_timeout: 300,
            remote_invoker,
        },
        rabbitmq: RabbitmqSection::default(),
    }
}

fn job_description(total_calls: usize) -> JobDescription {
    JobDescription {
        executor_id: "e1".into(),
        job_id: "j1".into(),
        function_name: "double".into(),
        total_calls,
        func_key: "funcs/double.pickle".into(),
        data_key: "data/double.pickle".into(),
        data_ranges: (0..total_calls)
            .map(|i| DataRange {
                start: i as u64 * 10,
                end: i as u64 * 10 + 10,
            })
            .collect(),
        extra_env: HashMap::new(),
        invoke_pool_threads: 8,
        metadata: HashMap::new(),
        execution_timeout: 60,
    }
}

#[tokio::test]
async fn s1_burst_fits_budget() {
    let done = Arc::new(Mutex::new(Vec::new()));
    let backend = Arc::new(FakeBackend {
        invoke_calls: AtomicUsize::new(0),
        remote_calls: AtomicUsize::new(0),
        reject_first_n: 0,
        language_version: invoker_sdk::InvokerPackage::VERSION.to_string(),
        done_sink: done.clone(),
    });
    let store = Arc::new(FakeStore {
        done: done.clone(),
        ..Default::default()
    });
    let facade = Arc::new(invoker_core::InvokerFacade::new(
        config(10, false),
        backend.clone(),
        store,
        tokio::runtime::Handle::current(),
        TraceManager,
    ));

    let handles = facade.run(job_description(5)).await.unwrap();
    assert_eq!(handles.len(), 5);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(backend.invoke_calls.load(Ordering::SeqCst), 5);

    facade.stop().await;
}

#[tokio::test]
async fn s2_overflow_dispatches_remainder_as_tokens_arrive() {
    let done = Arc::new(Mutex::new(Vec::new()));
    let backend = Arc::new(FakeBackend {
        invoke_calls: AtomicUsize::new(0),
        remote_calls: AtomicUsize::new(0),
        reject_first_n: 0,
        language_version: invoker_sdk::InvokerPackage::VERSION.to_string(),
        done_sink: done.clone(),
    });
    let store = Arc::new(FakeStore {
        done: done.clone(),
        ..Default::default()
    });
    let facade = Arc::new(invoker_core::InvokerFacade::new(
        config(4, false),
        backend.clone(),
        store,
        tokio::runtime::Handle::current(),
        TraceManager,
    ));

    let handles = facade.run(job_description(10)).await.unwrap();
    assert_eq!(handles.len(), 10);
    let ids: Vec<String> = handles.iter().map(|h| h.call_id.as_str().to_string()).collect();
    let expected: Vec<String> = (0..10).map(|i| format!("{i:05}")).collect();
    assert_eq!(ids, expected);

    // All ten must eventually be invoked: 4 direct, the rest paced by
    // completion tokens from the storage-polling monitor.
    for _ in 0..100 {
        if backend.invoke_calls.load(Ordering::SeqCst) >= 10 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert_eq!(backend.invoke_calls.load(Ordering::SeqCst), 10);

    facade.stop().await;
}

#[tokio::test]
async fn s3_quota_storm_eventually_succeeds() {
    let done = Arc::new(Mutex::new(Vec::new()));
    let backend = Arc::new(FakeBackend {
        invoke_calls: AtomicUsize::new(0),
        remote_calls: AtomicUsize::new(0),
        reject_first_n: 4,
        language_version: invoker_sdk::InvokerPackage::VERSION.to_string(),
        done_sink: done.clone(),
    });
    let store = Arc::new(FakeStore {
        done: done.clone(),
        ..Default::default()
    });
    let facade = Arc::new(invoker_core::InvokerFacade::new(
        config(2, false),
        backend.clone(),
        store,
        tokio::runtime::Handle::current(),
        TraceManager,
    ));

    let handles = facade.run(job_description(3)).await.unwrap();
    assert_eq!(handles.len(), 3);

    for _ in 0..300 {
        if done.lock().len() >= 3 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert_eq!(done.lock().len(), 3);
    // 4 rejections + 3 eventual successes.
    assert_eq!(backend.invoke_calls.load(Ordering::SeqCst), 7);

    facade.stop().await;
}

#[tokio::test]
async fn s5_version_mismatch_raises_before_any_dispatch() {
    let done = Arc::new(Mutex::new(Vec::new()));
    let backend = Arc::new(FakeBackend {
        invoke_calls: AtomicUsize::new(0),
        remote_calls: AtomicUsize::new(0),
        reject_first_n: 0,
        language_version: "0.0.1-incompatible".to_string(),
        done_sink: done.clone(),
    });
    let store = Arc::new(FakeStore {
        done: done.clone(),
        ..Default::default()
    });
    let facade = invoker_core::InvokerFacade::new(
        config(10, false),
        backend.clone(),
        store,
        tokio::runtime::Handle::current(),
        TraceManager,
    );

    let err = facade.run(job_description(5)).await.unwrap_err();
    assert!(matches!(err, invoker_common::InvokerError::RuntimeIncompatible { .. }));
    assert_eq!(backend.invoke_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn s6_remote_invoker_branch_delegates_a_single_activation() {
    let done = Arc::new(Mutex::new(Vec::new()));
    let backend = Arc::new(FakeBackend {
        invoke_calls: AtomicUsize::new(0),
        remote_calls: AtomicUsize::new(0),
        reject_first_n: 0,
        language_version: invoker_sdk::InvokerPackage::VERSION.to_string(),
        done_sink: done.clone(),
    });
    let store = Arc::new(FakeStore {
        done: done.clone(),
        ..Default::default()
    });
    let facade = invoker_core::InvokerFacade::new(
        config(10, true),
        backend.clone(),
        store,
        tokio::runtime::Handle::current(),
        TraceManager,
    );

    let handles = facade.run(job_description(100)).await.unwrap();
    assert_eq!(handles.len(), 100);
    assert_eq!(backend.remote_calls.load(Ordering::SeqCst), 1);
    assert_eq!(backend.invoke_calls.load(Ordering::SeqCst), 0);
}
