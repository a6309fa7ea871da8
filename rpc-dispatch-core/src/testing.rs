//! Test utilities for dispatch-driven request flows
//!
//! - [`MockTransport`]: scripted transport that records every call and pops
//!   queued replies, for exercising request orchestration without a server.
//! - [`PayloadLog`]: subscriber that snapshots every dispatched payload's
//!   kind and fields.
//!
//! # Example
//!
//! ```ignore
//! use rpc_dispatch_core::testing::{MockTransport, PayloadLog};
//!
//! let transport = Arc::new(MockTransport::new());
//! transport.push_json(json!({ "items": [1, 2] }));
//!
//! let dispatcher = Arc::new(Dispatcher::new(transport.clone()));
//! let log = PayloadLog::new();
//! dispatcher.subscribe(log.subscriber());
//!
//! // ... dispatch, await the handle ...
//! assert_eq!(log.kinds(), ["load", "loadResponse"]);
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::client::{Response, Transport, TransportError};
use crate::payload::Payload;

/// One recorded transport call.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    /// The backend action the call targeted.
    pub action: String,
    /// The JSON body that was posted.
    pub body: Map<String, Value>,
}

/// Scripted [`Transport`] for tests.
///
/// Replies are queued with [`push_response`](Self::push_response) /
/// [`push_json`](Self::push_json) / [`push_failure`](Self::push_failure) and
/// consumed in order, one per call. A call with no scripted reply fails with
/// [`TransportError::Other`].
#[derive(Default)]
pub struct MockTransport {
    replies: Mutex<VecDeque<Result<Response, TransportError>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockTransport {
    /// Create a transport with no scripted replies.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a full response.
    pub fn push_response(&self, response: Response) {
        self.lock_replies().push_back(Ok(response));
    }

    /// Queue a 200 response with the given JSON body.
    pub fn push_json(&self, body: Value) {
        self.push_response(Response::json(body));
    }

    /// Queue a transport failure with the given reason.
    pub fn push_failure(&self, reason: impl Into<String>) {
        self.lock_replies()
            .push_back(Err(TransportError::Other(reason.into())));
    }

    /// All calls recorded so far, in order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn lock_replies(&self) -> std::sync::MutexGuard<'_, VecDeque<Result<Response, TransportError>>> {
        self.replies.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn post(
        &self,
        action: &str,
        body: &Map<String, Value>,
    ) -> Result<Response, TransportError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedCall {
                action: action.to_string(),
                body: body.clone(),
            });

        self.lock_replies()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Other("no scripted reply".into())))
    }
}

/// Snapshot of one dispatched payload.
#[derive(Debug, Clone)]
pub struct LoggedPayload {
    /// The payload's dispatch discriminant.
    pub kind: String,
    /// Message fields, or the extra fields of a request payload.
    pub fields: Map<String, Value>,
}

/// Subscriber that records every dispatched payload.
///
/// Clone-cheap: clones share the same log, so a test can keep one end and
/// hand the subscriber to the dispatcher.
#[derive(Clone, Default)]
pub struct PayloadLog {
    entries: Arc<Mutex<Vec<LoggedPayload>>>,
}

impl PayloadLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the callback to hand to [`Dispatcher::subscribe`](crate::Dispatcher::subscribe).
    pub fn subscriber(&self) -> impl Fn(&Payload) + Send + Sync + 'static {
        let entries = Arc::clone(&self.entries);
        move |payload| {
            let logged = LoggedPayload {
                kind: payload.kind().to_string(),
                fields: match payload {
                    Payload::Message(message) => message.fields().clone(),
                    Payload::Request(request) => request.extra().clone(),
                },
            };
            entries
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(logged);
        }
    }

    /// Take all recorded payloads, clearing the log.
    pub fn drain(&self) -> Vec<LoggedPayload> {
        std::mem::take(&mut *self.entries.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// The recorded payload kinds, in dispatch order.
    pub fn kinds(&self) -> Vec<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|entry| entry.kind.clone())
            .collect()
    }

    /// Number of recorded payloads.
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether nothing has been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
