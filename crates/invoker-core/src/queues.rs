// Token Bucket (C4) and Pending-Call Queue (C5): multi-producer /
// multi-consumer FIFOs with blocking `get` and non-blocking `put`, built on
// `crossbeam-channel`'s unbounded MPMC channel so `put` never blocks a
// producer (the monitor, a dispatcher re-minting a rebate token) on a full
// queue.

use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, TryRecvError};

use crate::job::{CallId, Job};

/// A unit of free worker capacity, or the sentinel used to unblock a
/// dispatcher worker during shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    Unit,
    Sentinel,
}

/// Cardinality, not contents, is the state: every dispatch consumes one,
/// every completion or quota-rejection mints one.
#[derive(Clone)]
pub struct TokenBucket {
    tx: Sender<Token>,
    rx: Receiver<Token>,
}

impl TokenBucket {
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self { tx, rx }
    }

    /// Non-blocking; mints one token.
    pub fn put(&self, token: Token) {
        let _ = self.tx.send(token);
    }

    /// Blocks the calling thread until a token is available.
    pub fn get(&self) -> Token {
        self.rx.recv().unwrap_or(Token::Sentinel)
    }

    /// Non-blocking drain used by the facade to reconcile stale tokens
    /// minted after a prior job's last dispatch. Returns the count of
    /// genuine (non-sentinel) tokens drained.
    pub fn drain(&self) -> usize {
        let mut drained = 0;
        loop {
            match self.rx.try_recv() {
                Ok(Token::Unit) => drained += 1,
                Ok(Token::Sentinel) => {}
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        drained
    }
}

impl Default for TokenBucket {
    fn default() -> Self {
        Self::new()
    }
}

/// A pending `(job, call_id)` pair awaiting a token, or the sentinel
/// `(⊥, ⊥)` used to unblock a dispatcher worker during shutdown.
#[derive(Clone)]
pub enum PendingItem {
    Call(Arc<Job>, CallId),
    Sentinel,
}

#[derive(Clone)]
pub struct PendingQueue {
    tx: Sender<PendingItem>,
    rx: Receiver<PendingItem>,
}

impl PendingQueue {
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self { tx, rx }
    }

    pub fn put(&self, job: Arc<Job>, call_id: CallId) {
        let _ = self.tx.send(PendingItem::Call(job, call_id));
    }

    pub fn put_sentinel(&self) {
        let _ = self.tx.send(PendingItem::Sentinel);
    }

    pub fn get(&self) -> PendingItem {
        self.rx.recv().unwrap_or(PendingItem::Sentinel)
    }

    /// Non-blocking drain, called by `stop()` to discard unstarted work.
    pub fn drain(&self) {
        while self.rx.try_recv().is_ok() {}
    }
}

impl Default for PendingQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_put_then_get_round_trips() {
        let bucket = TokenBucket::new();
        bucket.put(Token::Unit);
        assert_eq!(bucket.get(), Token::Unit);
    }

    #[test]
    fn drain_counts_only_unit_tokens() {
        let bucket = TokenBucket::new();
        bucket.put(Token::Unit);
        bucket.put(Token::Unit);
        bucket.put(Token::Sentinel);
        assert_eq!(bucket.drain(), 2);
        assert_eq!(bucket.drain(), 0);
    }

    #[test]
    fn pending_fifo_order() {
        let job = Arc::new(test_job());
        let pending = PendingQueue::new();
        pending.put(job.clone(), CallId::new(0));
        pending.put(job.clone(), CallId::new(1));
        match pending.get() {
            PendingItem::Call(_, id) => assert_eq!(id.as_str(), "00000"),
            PendingItem::Sentinel => panic!("unexpected sentinel"),
        }
    }

    fn test_job() -> Job {
        Job {
            executor_id: "e".into(),
            job_id: "j".into(),
            function_name: "f".into(),
            total_calls: 1,
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
        }
    }
}
