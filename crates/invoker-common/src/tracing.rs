// Tracing infrastructure mapping `Tracing.cs` / `TraceManager.cs`: every
// component (runtime selector, dispatcher worker, job monitor, facade) gets
// its own named trace source, all backed by the `tracing` crate so a single
// `tracing-subscriber` install at process startup governs formatting and
// filtering for the whole core.

use chrono::Utc;
use invoker_sdk::TraceWriter;

/// Trace event severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TraceEventType {
    Verbose,
    Information,
    Warning,
    Error,
}

impl std::fmt::Display for TraceEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TraceEventType::Verbose => write!(f, "VERB"),
            TraceEventType::Information => write!(f, "INFO"),
            TraceEventType::Warning => write!(f, "WARN"),
            TraceEventType::Error => write!(f, "ERR "),
        }
    }
}

/// A named trace source. Maps `Tracing` in the source system: components
/// reach for `TraceManager.get("RuntimeSelector")` and log through the
/// returned handle rather than calling the `tracing` crate macros directly,
/// so the component name is always in the formatted line.
#[derive(Clone)]
pub struct Tracing {
    name: String,
}

impl Tracing {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    fn trace(&self, event_type: TraceEventType, message: &str) {
        let timestamp = Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ");
        let formatted = format!("[{}][{}] {}: {}", timestamp, &self.name, event_type, message);
        match event_type {
            TraceEventType::Error => tracing::error!("{}", formatted),
            TraceEventType::Warning => tracing::warn!("{}", formatted),
            TraceEventType::Information => tracing::info!("{}", formatted),
            TraceEventType::Verbose => tracing::debug!("{}", formatted),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl TraceWriter for Tracing {
    fn info(&self, message: &str) {
        self.trace(TraceEventType::Information, message);
    }

    fn verbose(&self, message: &str) {
        self.trace(TraceEventType::Verbose, message);
    }

    fn warning(&self, message: &str) {
        self.trace(TraceEventType::Warning, message);
    }

    fn error(&self, message: &str) {
        self.trace(TraceEventType::Error, message);
    }
}

/// Creates named trace sources. Stateless today (each `Tracing` is just a
/// name), kept as a type so call sites don't need to change if per-source
/// configuration (independent levels, sinks) is added later.
#[derive(Default, Clone, Copy)]
pub struct TraceManager;

impl TraceManager {
    pub fn get(&self, name: &str) -> Tracing {
        Tracing::new(name)
    }
}
