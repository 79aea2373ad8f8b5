// Minimal per-call handle returned by `InvokerFacade::run`. Constructing a
// fully-functional future that polls storage for a call's result and
// deserializes it is the `ResponseFuture` collaborator's job, not the
// invocation core's — this type only carries the identity and metadata the
// core is responsible for at the moment a call enters the `Invoked` state.

use crate::job::{CallId, JobMetadata};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    Invoked,
}

#[derive(Debug, Clone)]
pub struct CallHandle {
    pub call_id: CallId,
    pub metadata: JobMetadata,
    pub state: CallState,
}

impl CallHandle {
    pub fn invoked(call_id: CallId, metadata: JobMetadata) -> Self {
        Self {
            call_id,
            metadata,
            state: CallState::Invoked,
        }
    }
}
