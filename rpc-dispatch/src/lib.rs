//! rpc-dispatch: action-dispatch bridge for backend RPC calls
//!
//! A single dispatcher with registered callbacks, plus an interception layer
//! that turns a request payload into an HTTP POST and feeds the outcome back
//! into the same action stream as a derived follow-up action.
//!
//! # Example
//! ```ignore
//! use rpc_dispatch::prelude::*;
//!
//! let transport = Arc::new(HttpClient::new("https://host/app/".parse()?));
//! let dispatcher = Arc::new(Dispatcher::new(transport));
//!
//! dispatcher.subscribe(|payload| match payload.kind() {
//!     "loadResponse" => { /* render the data */ }
//!     "loadError" => { /* render the failure */ }
//!     _ => {}
//! });
//!
//! let mut payload = Payload::from(RequestPayload::new("load")?);
//! dispatcher.dispatch(&mut payload)?;
//! ```

// Re-export everything from core
pub use rpc_dispatch_core::*;

/// Prelude for convenient imports
pub mod prelude {
    // Payload model
    pub use rpc_dispatch_core::{Message, Payload, PayloadError, RequestPayload};

    // Dispatch
    pub use rpc_dispatch_core::{Dispatcher, SubscriberId};

    // Backend requests
    pub use rpc_dispatch_core::{BackendRequest, RequestError, RequestHandle};

    // Transport
    pub use rpc_dispatch_core::{Body, HttpClient, Response, Transport, TransportError};
}
