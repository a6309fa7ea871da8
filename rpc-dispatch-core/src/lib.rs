//! Core payload, dispatcher and backend request types for rpc-dispatch
//!
//! This crate bridges a unidirectional action-dispatch pattern and backend
//! RPC calls issued over HTTP POST. One payload in, one POST out, one derived
//! payload back into the same action stream.
//!
//! # Core Concepts
//!
//! - **Message**: a plain action payload broadcast to subscribers
//! - **RequestPayload**: a backend-call request with derived follow-up
//!   action names
//! - **Dispatcher**: the single broadcast point, intercepting request
//!   payloads to trigger backend calls
//! - **Transport**: the HTTP seam; `HttpClient` is the reqwest-backed
//!   implementation, `testing::MockTransport` the scripted one
//!
//! # Basic Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use rpc_dispatch_core::{Dispatcher, HttpClient, Payload, RequestPayload};
//! use serde_json::json;
//!
//! let transport = Arc::new(HttpClient::new("https://host/app/".parse()?));
//! let dispatcher = Arc::new(Dispatcher::new(transport));
//!
//! dispatcher.subscribe(|payload| println!("saw {}", payload.kind()));
//!
//! // "load" derives errorAction = "loadError", responseAction = "loadResponse"
//! let request = RequestPayload::new("load")?.with_field("id", json!(7));
//! let mut payload = Payload::from(request);
//! dispatcher.dispatch(&mut payload)?;
//!
//! // Subscribers saw "load" already; once the POST to ./load settles they
//! // see "loadResponse" (body fields merged in) or "loadError".
//! if let Some(handle) = payload.as_request_mut().and_then(|r| r.take_handle()) {
//!     let response = handle.outcome().await?;
//! }
//! ```
//!
//! # Flow
//!
//! Dispatching a request payload stores the in-flight handle on the payload
//! (write-once), fans the payload out to all subscribers synchronously, and
//! only then starts the request job. The job POSTs the assembled body to the
//! endpoint named by the backend action and re-dispatches exactly one
//! follow-up message, so for every request the triggering dispatch completes
//! strictly before its outcome dispatch begins.

pub mod client;
pub mod dispatcher;
pub mod payload;
pub mod request;
pub mod testing;

// Payload exports
pub use payload::{Message, Payload, PayloadError, RequestPayload};

// Dispatcher exports
pub use dispatcher::{Dispatcher, SubscriberId};

// Backend request exports
pub use request::{BackendRequest, RequestError, RequestHandle};

// Transport exports
pub use client::{Body, HttpClient, Response, Transport, TransportError};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::client::{Body, HttpClient, Response, Transport, TransportError};
    pub use crate::dispatcher::{Dispatcher, SubscriberId};
    pub use crate::payload::{Message, Payload, PayloadError, RequestPayload};
    pub use crate::request::{BackendRequest, RequestError, RequestHandle};
}
