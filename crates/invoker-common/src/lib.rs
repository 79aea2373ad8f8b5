// invoker-common: Shared services and infrastructure for the invocation
// core. Maps the source system's cross-cutting modules (config loading,
// error taxonomy, trace sources, constants) that every other crate in the
// workspace depends on.

pub mod config;
pub mod constants;
pub mod errors;
pub mod telemetry;
pub mod tracing;
pub mod util;

pub use config::{InvokerConfig, LithopsSection, RabbitmqSection, ServerlessSection};
pub use errors::InvokerError;
pub use telemetry::init_tracing;
pub use tracing::{TraceEventType, TraceManager, Tracing};
pub use util::version::{major_minor_compatible, RuntimeVersion};
