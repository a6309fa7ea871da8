//! One-shot backend request orchestration
//!
//! A [`BackendRequest`] is bound to one dispatcher and one request payload.
//! [`execute`](BackendRequest::execute) assembles the outgoing body and
//! returns the pair of a [`RequestHandle`] (the observable outcome) and a job
//! future that performs the POST. The dispatcher stores the handle on the
//! payload, fans the payload out, and only then starts the job, so the
//! triggering dispatch always completes before the follow-up dispatch begins.
//!
//! Per request the lifecycle is Created -> Sent -> settled exactly once as
//! success or failure. No retries, no timeout, no cancellation.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::sync::oneshot;
use tracing::debug;

use crate::client::{Body, Response, TransportError};
use crate::dispatcher::Dispatcher;
use crate::payload::{Message, Payload, RequestPayload};

/// What a settled request handle resolves to on failure.
#[derive(Debug)]
pub enum RequestError {
    /// The call itself failed; an error-action message was dispatched.
    Transport(TransportError),
    /// The call succeeded but the response body is an error value.
    Body(String),
    /// The request job was torn down before settling, e.g. at runtime
    /// shutdown.
    Dropped,
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestError::Transport(e) => write!(f, "{}", e),
            RequestError::Body(reason) => write!(f, "backend response body is an error: {}", reason),
            RequestError::Dropped => write!(f, "backend request dropped before completion"),
        }
    }
}

impl std::error::Error for RequestError {}

/// Observable outcome of one in-flight backend request.
///
/// Stored write-once on the triggering [`RequestPayload`]. Awaiting it is
/// optional: an unobserved failing request only surfaces through its
/// error-action dispatch.
#[derive(Debug)]
pub struct RequestHandle {
    outcome: oneshot::Receiver<Result<Response, RequestError>>,
}

impl RequestHandle {
    /// Wait for the request to settle and return its outcome.
    pub async fn outcome(self) -> Result<Response, RequestError> {
        match self.outcome.await {
            Ok(outcome) => outcome,
            Err(_) => Err(RequestError::Dropped),
        }
    }
}

/// One-shot orchestrator for a single backend call.
pub struct BackendRequest<'a> {
    dispatcher: Arc<Dispatcher>,
    payload: &'a RequestPayload,
}

impl<'a> BackendRequest<'a> {
    /// Bind an orchestrator to a dispatcher and the payload that triggered it.
    pub fn new(dispatcher: Arc<Dispatcher>, payload: &'a RequestPayload) -> Self {
        Self {
            dispatcher,
            payload,
        }
    }

    /// Assemble the outgoing call and split it into handle and job.
    ///
    /// The body is the payload's extra fields with the `requestPayload`
    /// entries copied over them, so caller-supplied fields win collisions
    /// against reserved-looking names. The job performs the POST when driven
    /// and re-dispatches the derived follow-up message:
    ///
    /// - transport failure -> `{ type: errorAction, error: <reason> }`, and
    ///   the handle resolves to the same failure.
    /// - JSON object body -> `responsePayload` fields overwritten by the
    ///   body's fields, with `type = responseAction`.
    /// - error-value body -> handle failure only, no follow-up dispatch.
    /// - any other body -> no follow-up dispatch.
    pub fn execute(self) -> (RequestHandle, impl Future<Output = ()> + Send + 'static) {
        let mut data = self.payload.extra().clone();
        if let Some(request_payload) = self.payload.request_payload() {
            for (key, value) in request_payload {
                data.insert(key.clone(), value.clone());
            }
        }

        let action = self.payload.action().to_string();
        let error_action = self.payload.error_action().to_string();
        let response_action = self.payload.response_action().to_string();
        let response_payload = self.payload.response_payload().cloned();
        let dispatcher = self.dispatcher;

        let (settled, outcome) = oneshot::channel();
        let job = async move {
            let transport = dispatcher.transport();
            let result = match transport.post(&action, &data).await {
                Err(reason) => {
                    debug!(action = %action, error = %reason, "backend request failed");
                    let failure = Message::new(error_action)
                        .with_field("error", Value::String(reason.to_string()));
                    let _ = dispatcher.dispatch(&mut Payload::from(failure));
                    Err(RequestError::Transport(reason))
                }
                Ok(response) => {
                    settle_success(&dispatcher, response, response_action, response_payload)
                }
            };

            // Nobody awaiting the handle is a fire-and-forget call site.
            let _ = settled.send(result);
        };

        (RequestHandle { outcome }, job)
    }
}

/// Success continuation: classify the body and dispatch the response message
/// when it is a JSON object. The original response is returned unchanged.
fn settle_success(
    dispatcher: &Arc<Dispatcher>,
    response: Response,
    response_action: String,
    response_payload: Option<Map<String, Value>>,
) -> Result<Response, RequestError> {
    match &response.body {
        Body::Error(reason) => Err(RequestError::Body(reason.clone())),
        Body::Json(Value::Object(body)) => {
            debug!(kind = %response_action, "backend request succeeded");
            let mut fields = response_payload.unwrap_or_default();
            for (key, value) in body {
                fields.insert(key.clone(), value.clone());
            }
            // The discriminant is carried by the message kind; a response
            // field named "type" must not shadow it.
            fields.remove(crate::payload::KEY_TYPE);
            let message = Message::new(response_action).with_fields(fields);
            let _ = dispatcher.dispatch(&mut Payload::from(message));
            Ok(response)
        }
        _ => Ok(response),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::PayloadError;
    use crate::testing::MockTransport;
    use serde_json::json;

    fn handle_pair() -> (
        oneshot::Sender<Result<Response, RequestError>>,
        RequestHandle,
    ) {
        let (tx, rx) = oneshot::channel();
        (tx, RequestHandle { outcome: rx })
    }

    #[test]
    fn test_handle_is_write_once() {
        let mut payload = RequestPayload::new("load").unwrap();
        assert!(payload.handle().is_none());

        let (_tx, handle) = handle_pair();
        payload.set_handle(handle).unwrap();
        assert!(payload.handle().is_some());

        let (_tx, second) = handle_pair();
        let err = payload.set_handle(second).unwrap_err();
        assert_eq!(err, PayloadError::HandleAlreadySet);
    }

    #[tokio::test]
    async fn test_handle_resolves_to_sent_outcome() {
        let mut payload = RequestPayload::new("load").unwrap();
        let (tx, handle) = handle_pair();
        payload.set_handle(handle).unwrap();

        tx.send(Ok(Response::json(json!({ "ok": true }))))
            .expect("receiver alive");

        let handle = payload.take_handle().expect("handle stored");
        let response = handle.outcome().await.unwrap();
        assert_eq!(response.body, Body::Json(json!({ "ok": true })));
        assert!(payload.handle().is_none());
    }

    #[tokio::test]
    async fn test_handle_reports_dropped_job() {
        let (tx, handle) = handle_pair();
        drop(tx);

        let err = handle.outcome().await.unwrap_err();
        assert!(matches!(err, RequestError::Dropped));
    }

    #[tokio::test]
    async fn test_body_assembly_partitions_and_merges() {
        let transport = Arc::new(MockTransport::new());
        transport.push_response(Response::json(json!("done")));
        let dispatcher = Arc::new(Dispatcher::new(transport.clone()));

        let payload = RequestPayload::from_fields(
            json!({
                "type": "load",
                "requestPayload": { "id": 7 },
                "id": "ignored",
                "name": "first",
            })
            .as_object()
            .cloned()
            .unwrap(),
        )
        .unwrap();

        let (handle, job) = BackendRequest::new(dispatcher, &payload).execute();
        job.await;
        handle.outcome().await.unwrap();

        let calls = transport.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].action, "load");
        assert_eq!(calls[0].body.get("id"), Some(&json!(7)));
        assert_eq!(calls[0].body.get("name"), Some(&json!("first")));
        assert!(!calls[0].body.contains_key("type"));
        assert!(!calls[0].body.contains_key("requestPayload"));
        assert!(!calls[0].body.contains_key("errorAction"));
        assert!(!calls[0].body.contains_key("responseAction"));
    }
}
