// invoker-sdk: Foundation layer for the serverless invocation core.
// This crate has ZERO dependencies on other workspace crates and provides
// the small set of traits and build-time constants the rest of the
// workspace builds on.

pub mod build_constants;
pub mod trace;

pub use build_constants::{InvokerPackage, Source};
pub use trace::TraceWriter;
