// invoker-core: the client-side invocation core of a serverless-function
// execution framework. Given a job that fans out into N homogeneous
// function calls, dispatches those calls to a remote FaaS backend under a
// configured concurrency ceiling, reacting to quota rejections and driving
// further dispatches as earlier calls complete.
//
// The compute backend and metadata store are external collaborators (see
// `backend` and `store`) — this crate only consumes their trait contracts.

pub mod backend;
pub mod call_handle;
pub mod dispatcher;
pub mod facade;
pub mod job;
pub mod monitor;
pub mod queues;
pub mod runtime;
pub mod store;

pub use backend::{ActivationId, ComputeBackend};
pub use call_handle::{CallHandle, CallState};
pub use facade::InvokerFacade;
pub use job::{
    CallId, DataRange, Job, JobDescription, JobMetadata, Payload, RemoteInvokerPayload,
    RemoteJobDescription,
};
pub use monitor::{JobMonitor, JobMonitorHandle, MonitorState};
pub use queues::{PendingItem, PendingQueue, Token, TokenBucket};
pub use runtime::{RuntimeMeta, RuntimeSelector};
pub use store::{JobStatus, MetadataStore};
