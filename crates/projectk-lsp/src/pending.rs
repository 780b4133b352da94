//! Table of in-flight requests and their cancellation state.
//!
//! A request is registered when dispatched and leaves the table when its
//! response is handed to the emitter or dropped. The state check and the
//! hand-off happen under one lock, so a cancelled request never gets a
//! response.

use crate::emitter::Emitter;
use crate::error::ServerError;
use lsp_server::{RequestId, Response};
use parking_lot::Mutex;
use std::collections::HashMap;

/// Lifecycle of a dispatched request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    /// Queued on the worker pool.
    Received,
    /// A worker is computing the response.
    InProgress,
    /// The response was sent.
    Completed,
    /// The client cancelled it; its result is discarded.
    Cancelled,
}

#[derive(Debug)]
struct PendingRequest {
    method: &'static str,
    version: i32,
    state: RequestState,
}

/// In-flight requests, keyed by id.
#[derive(Debug, Default)]
pub struct RequestQueue {
    requests: Mutex<HashMap<RequestId, PendingRequest>>,
}

impl RequestQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a request issued against `version` of its document.
    pub fn register(&self, id: RequestId, method: &'static str, version: i32) {
        tracing::debug!(%id, method, version, "request received");
        self.requests.lock().insert(
            id,
            PendingRequest {
                method,
                version,
                state: RequestState::Received,
            },
        );
    }

    /// Move a request to `InProgress`.
    ///
    /// Returns `false` if it was cancelled while queued, in which case it
    /// leaves the table and there is nothing to compute.
    pub fn start(&self, id: &RequestId) -> bool {
        let mut requests = self.requests.lock();
        match requests.get_mut(id) {
            Some(request) if request.state == RequestState::Received => {
                request.state = RequestState::InProgress;
                true
            }
            Some(request) if request.state == RequestState::Cancelled => {
                tracing::debug!(%id, method = request.method, "skipping cancelled request");
                requests.remove(id);
                false
            }
            _ => false,
        }
    }

    /// Mark a live request cancelled. Unknown and finished ids are ignored.
    pub fn cancel(&self, id: &RequestId) {
        let mut requests = self.requests.lock();
        if let Some(request) = requests.get_mut(id) {
            if matches!(
                request.state,
                RequestState::Received | RequestState::InProgress
            ) {
                tracing::debug!(%id, method = request.method, "request cancelled");
                request.state = RequestState::Cancelled;
            }
        } else {
            tracing::debug!(%id, "ignoring cancellation of unknown request");
        }
    }

    /// Hand the response of a finished request to the emitter, unless it
    /// was cancelled.
    ///
    /// Returns whether the response was sent.
    pub fn complete(
        &self,
        id: &RequestId,
        response: Response,
        emitter: &Emitter,
    ) -> Result<bool, ServerError> {
        let mut requests = self.requests.lock();
        let Some(mut request) = requests.remove(id) else {
            return Ok(false);
        };
        if request.state == RequestState::Cancelled {
            tracing::debug!(%id, method = request.method, "discarding cancelled response");
            return Ok(false);
        }
        request.state = RequestState::Completed;
        tracing::debug!(%id, method = request.method, version = request.version, "request completed");
        emitter.respond(response)?;
        Ok(true)
    }

    /// Current state of a request still in the table.
    pub fn state(&self, id: &RequestId) -> Option<RequestState> {
        self.requests.lock().get(id).map(|request| request.state)
    }

    /// Number of requests in the table.
    pub fn len(&self) -> usize {
        self.requests.lock().len()
    }

    /// Whether no request is in flight.
    pub fn is_empty(&self) -> bool {
        self.requests.lock().is_empty()
    }
}
