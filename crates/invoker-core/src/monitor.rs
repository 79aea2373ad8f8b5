// Job Monitor (C7): background task(s) that detect completions and mint
// fresh tokens, mapping `JobMonitor._job_monitoring_os` and
// `_job_monitoring_rabbitmq` in the source system.
//
// State machine per monitored job: Started -> Observing -> Drained
// (terminal, `seen_done == total_calls`) or Started -> Stopped (terminal
// via `stop()`).

use std::sync::Arc;

use invoker_common::constants::MONITOR_POLL_INTERVAL;
use invoker_common::tracing::Tracing;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::job::Job;
use crate::queues::{Token, TokenBucket};
use crate::store::MetadataStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Started,
    Observing,
    Drained,
    Stopped,
}

/// A running monitor task for one job. Dropping this without calling
/// [`JobMonitorHandle::stop`] leaves the task running until it drains
/// naturally.
pub struct JobMonitorHandle {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<MonitorState>,
}

impl JobMonitorHandle {
    /// Signals the monitor task to stop at its next poll/message boundary.
    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }

    pub async fn join(self) -> MonitorState {
        self.task.await.unwrap_or(MonitorState::Stopped)
    }
}

pub struct JobMonitor {
    store: Arc<dyn MetadataStore>,
    token_bucket: TokenBucket,
    trace: Tracing,
}

impl JobMonitor {
    pub fn new(store: Arc<dyn MetadataStore>, token_bucket: TokenBucket, trace: Tracing) -> Self {
        Self {
            store,
            token_bucket,
            trace,
        }
    }

    /// Once per second, queries the metadata store for `(running_ids,
    /// done_ids)`. Mints one token per newly observed completion. Exactly
    /// `job.total_calls` completion tokens are minted over the job's
    /// lifetime (quota-retry tokens are minted by the dispatcher, not
    /// here).
    pub fn start_storage_polling(&self, job: Arc<Job>) -> JobMonitorHandle {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let store = self.store.clone();
        let token_bucket = self.token_bucket.clone();
        let trace = self.trace.clone();

        let task = tokio::spawn(async move {
            let mut seen_done = 0usize;
            let final_state = loop {
                tokio::select! {
                    _ = stop_rx.changed() => {
                        if *stop_rx.borrow() {
                            break MonitorState::Stopped;
                        }
                    }
                    _ = tokio::time::sleep(MONITOR_POLL_INTERVAL) => {
                        match store.get_job_status(&job.executor_id, &job.job_id).await {
                            Ok(status) => {
                                let done = status.done_ids.len();
                                if done > seen_done {
                                    let new_done = done - seen_done;
                                    for _ in 0..new_done {
                                        token_bucket.put(Token::Unit);
                                    }
                                    seen_done = done;
                                }
                                if seen_done >= job.total_calls {
                                    break MonitorState::Drained;
                                }
                            }
                            Err(err) => {
                                trace.verbose(&format!(
                                    "transient metadata store error during poll, retrying next tick: {err:#}"
                                ));
                            }
                        }
                    }
                }
            };
            trace.verbose(&format!(
                "job monitor for {}/{} terminated in state {final_state:?}",
                job.executor_id, job.job_id
            ));
            final_state
        });

        JobMonitorHandle { stop_tx, task }
    }

    /// Subscribes to the job-specific exchange/queue named deterministically
    /// from `(executor_id, job_id)`. Every `"__end__"`-typed message mints
    /// one token.
    #[cfg(feature = "rabbitmq")]
    pub async fn start_message_bus(
        &self,
        job: Arc<Job>,
        amqp_url: &str,
    ) -> anyhow::Result<JobMonitorHandle> {
        use futures_util::StreamExt;
        use lapin::options::{
            BasicConsumeOptions, ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions,
        };
        use lapin::types::FieldTable;
        use lapin::{Connection, ConnectionProperties, ExchangeKind};

        let options = ConnectionProperties::default()
            .with_executor(tokio_executor_trait::Tokio::current())
            .with_reactor(tokio_reactor_trait::Tokio);
        let connection = Connection::connect(amqp_url, options).await?;
        let channel = connection.create_channel().await?;

        let exchange = format!("lithops-{}-{}", job.executor_id, job.job_id);
        let queue_name = format!("{exchange}-1");

        channel
            .exchange_declare(
                &exchange,
                ExchangeKind::Fanout,
                ExchangeDeclareOptions::default(),
                FieldTable::default(),
            )
            .await?;
        channel
            .queue_declare(&queue_name, QueueDeclareOptions::default(), FieldTable::default())
            .await?;
        channel
            .queue_bind(
                &queue_name,
                &exchange,
                "",
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await?;

        let mut consumer = channel
            .basic_consume(
                &queue_name,
                "invoker-job-monitor",
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await?;

        let (stop_tx, mut stop_rx) = watch::channel(false);
        let token_bucket = self.token_bucket.clone();
        let trace = self.trace.clone();

        let task = tokio::spawn(async move {
            let mut seen_done = 0usize;
            let final_state = loop {
                tokio::select! {
                    _ = stop_rx.changed() => {
                        if *stop_rx.borrow() {
                            break MonitorState::Stopped;
                        }
                    }
                    delivery = consumer.next() => {
                        let Some(delivery) = delivery else {
                            break MonitorState::Stopped;
                        };
                        let Ok(delivery) = delivery else {
                            continue;
                        };
                        let is_end = serde_json::from_slice::<serde_json::Value>(&delivery.data)
                            .ok()
                            .and_then(|v| v.get("type").and_then(|t| t.as_str().map(str::to_string)))
                            .map(|t| t == "__end__")
                            .unwrap_or(false);
                        let _ = delivery.ack(lapin::options::BasicAckOptions::default()).await;
                        if is_end {
                            token_bucket.put(Token::Unit);
                            seen_done += 1;
                            if seen_done >= job.total_calls {
                                break MonitorState::Drained;
                            }
                        }
                    }
                }
            };
            trace.verbose(&format!(
                "message-bus job monitor for {}/{} terminated in state {final_state:?}",
                job.executor_id, job.job_id
            ));
            final_state
        });

        Ok(JobMonitorHandle { stop_tx, task })
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::store::JobStatus;

    struct CountingStore {
        done: parking_lot::Mutex<Vec<String>>,
    }

    #[async_trait]
    impl MetadataStore for CountingStore {
        async fn get_runtime_meta(&self, _key: &str) -> anyhow::Result<crate::runtime::RuntimeMeta> {
            unimplemented!()
        }

        async fn put_runtime_meta(
            &self,
            _key: &str,
            _meta: &crate::runtime::RuntimeMeta,
        ) -> anyhow::Result<()> {
            unimplemented!()
        }

        async fn get_job_status(&self, _executor_id: &str, _job_id: &str) -> anyhow::Result<JobStatus> {
            Ok(JobStatus {
                running_ids: vec![],
                done_ids: self.done.lock().clone(),
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn mints_one_token_per_new_completion() {
        let store = Arc::new(CountingStore {
            done: parking_lot::Mutex::new(vec!["00000".to_string()]),
        });
        let token_bucket = TokenBucket::new();
        let monitor = JobMonitor::new(store.clone(), token_bucket.clone(), Tracing::new("test"));

        let job = Arc::new(Job {
            executor_id: "e".into(),
            job_id: "j".into(),
            function_name: "f".into(),
            total_calls: 2,
            runtime_name: "python3.11".into(),
            runtime_memory: 256,
            runtime_timeout: 300,
            execution_timeout: 295,
            func_key: "fk".into(),
            data_key: "dk".into(),
            data_ranges: vec![],
            extra_env: Default::default(),
            invoke_pool_threads: 4,
            metadata: Default::default(),
        });

        let handle = monitor.start_storage_polling(job);
        tokio::time::advance(MONITOR_POLL_INTERVAL + std::time::Duration::from_millis(10)).await;
        tokio::task::yield_now().await;

        assert_eq!(token_bucket.get(), Token::Unit);

        store.done.lock().push("00001".to_string());
        tokio::time::advance(MONITOR_POLL_INTERVAL + std::time::Duration::from_millis(10)).await;

        let state = handle.join().await;
        assert_eq!(state, MonitorState::Drained);
        assert_eq!(token_bucket.get(), Token::Unit);
    }
}
