// Constants shared across the invocation core, grounded on `Constants.cs`'s
// role in the source runner: a single place for the magic numbers the rest
// of the workspace would otherwise scatter as literals.
use std::time::Duration;

/// Memory (MB) reserved for the single activation that runs the
/// remote-invoker branch's embedded dispatcher.
pub const REMOTE_INVOKER_MEMORY: u32 = 2048;

/// Fan-out the remote-invoker payload advertises to the backend-side
/// dispatcher it delegates to.
pub const REMOTE_INVOKER_FANOUT: u32 = 4;

/// Default number of dispatcher workers in the local-invoker pool.
pub const INVOKER_PROCESSES: usize = 2;

/// Bounded-executor cap per dispatcher worker: at most this many concurrent
/// outbound `backend.invoke` calls per worker. `INVOKER_PROCESSES *
/// EXECUTOR_POOL_CAP` intentionally exceeds typical `workers` budgets — the
/// token bucket, not this cap, is the binding constraint.
pub const EXECUTOR_POOL_CAP: usize = 250;

/// How often the storage-polling job monitor re-checks job status.
pub const MONITOR_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Inclusive bounds of the uniform random backoff applied after a
/// quota-rejected invocation, in whole seconds.
pub const QUOTA_BACKOFF_MIN_SECS: u64 = 0;
pub const QUOTA_BACKOFF_MAX_SECS: u64 = 5;

/// `execution_timeout` must leave at least this many seconds of headroom
/// under `runtime_timeout`; the facade truncates it otherwise.
pub const EXECUTION_TIMEOUT_GUARD_SECS: u64 = 5;

/// Width of a zero-padded `CallID` (e.g. `"00000"`).
pub const CALL_ID_WIDTH: usize = 5;
