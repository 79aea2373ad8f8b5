// Process-wide tracing-subscriber bootstrap, mapping the
// `tracing_subscriber::fmt()...init()` call every runner binary makes at
// the top of `main`. The invocation core has no CLI of its own (callers
// embed it), so this is exposed as a function the embedding application
// calls once at startup rather than wired into a `main.rs` here.

use tracing_subscriber::EnvFilter;

/// Installs a global `tracing-subscriber` formatter honoring `RUST_LOG`,
/// defaulting to `info` when unset. Idempotent-adjacent: calling this twice
/// in one process panics (the underlying subscriber is process-global),
/// matching the teacher's single-call-per-binary assumption.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();
}
