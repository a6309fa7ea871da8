//! Dispatcher with backend-call interception
//!
//! A single broadcast point: subscribers register callbacks and every
//! dispatched payload fans out to all of them synchronously, in registration
//! order. Dispatching a [`Payload::Request`] additionally triggers a backend
//! call whose outcome is dispatched again as a derived follow-up message.
//!
//! Dispatchers are caller-owned and used behind [`Arc`]; each test constructs
//! its own together with its own transport.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use crate::client::Transport;
use crate::payload::{Payload, PayloadError};
use crate::request::BackendRequest;

/// Identifies a registered subscriber for later removal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

type Subscriber = Arc<dyn Fn(&Payload) + Send + Sync>;

/// Broadcast point for action payloads.
pub struct Dispatcher {
    transport: Arc<dyn Transport>,
    subscribers: Mutex<Vec<(SubscriberId, Subscriber)>>,
    next_id: AtomicU64,
}

impl Dispatcher {
    /// Create a dispatcher bound to the transport its backend requests use.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            subscribers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// The transport shared by all backend requests of this dispatcher.
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Register a callback invoked for every dispatched payload.
    pub fn subscribe(&self, callback: impl Fn(&Payload) + Send + Sync + 'static) -> SubscriberId {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock_subscribers().push((id, Arc::new(callback)));
        id
    }

    /// Remove a previously registered callback.
    pub fn unsubscribe(&self, id: SubscriberId) {
        self.lock_subscribers()
            .retain(|(subscriber, _)| *subscriber != id);
    }

    /// Number of currently registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.lock_subscribers().len()
    }

    /// Dispatch a payload to all registered subscribers.
    ///
    /// A [`Payload::Request`] is intercepted first: a backend request bound
    /// to this dispatcher is assembled, its handle is stored on the payload,
    /// and after the synchronous fan-out the request job is spawned. The job
    /// re-dispatches the derived follow-up message once the call settles, so
    /// subscribers observe the triggering payload strictly before its
    /// outcome.
    ///
    /// Fails with [`PayloadError::HandleAlreadySet`] when a request payload
    /// is dispatched a second time; no fan-out happens in that case.
    ///
    /// # Panics
    ///
    /// Dispatching a request payload spawns its job onto the ambient tokio
    /// runtime and therefore panics outside of one. Plain messages dispatch
    /// anywhere.
    pub fn dispatch(self: &Arc<Self>, payload: &mut Payload) -> Result<(), PayloadError> {
        if let Payload::Request(request) = payload {
            debug!(
                kind = %request.kind(),
                action = %request.action(),
                "intercepted backend request payload"
            );

            let (handle, job) = BackendRequest::new(Arc::clone(self), request).execute();
            request.set_handle(handle)?;
            self.broadcast(payload);
            tokio::spawn(job);
            return Ok(());
        }

        self.broadcast(payload);
        Ok(())
    }

    fn broadcast(&self, payload: &Payload) {
        debug!(kind = %payload.kind(), "dispatching payload");

        // Snapshot under the lock, invoke outside it: a callback is allowed
        // to re-enter the dispatcher.
        let subscribers: Vec<Subscriber> = self
            .lock_subscribers()
            .iter()
            .map(|(_, subscriber)| Arc::clone(subscriber))
            .collect();

        for subscriber in subscribers {
            subscriber(payload);
        }
    }

    fn lock_subscribers(&self) -> std::sync::MutexGuard<'_, Vec<(SubscriberId, Subscriber)>> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::Message;
    use crate::testing::MockTransport;
    use serde_json::json;

    fn dispatcher() -> Arc<Dispatcher> {
        Arc::new(Dispatcher::new(Arc::new(MockTransport::new())))
    }

    #[test]
    fn test_subscribe_unsubscribe() {
        let dispatcher = dispatcher();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let seen_by_first = Arc::clone(&seen);
        let first = dispatcher.subscribe(move |payload| {
            seen_by_first.lock().unwrap().push(payload.kind().to_string());
        });
        assert_eq!(dispatcher.subscriber_count(), 1);

        dispatcher
            .dispatch(&mut Payload::from(Message::new("ping")))
            .unwrap();
        assert_eq!(seen.lock().unwrap().as_slice(), ["ping"]);

        dispatcher.unsubscribe(first);
        assert_eq!(dispatcher.subscriber_count(), 0);

        dispatcher
            .dispatch(&mut Payload::from(Message::new("pong")))
            .unwrap();
        assert_eq!(seen.lock().unwrap().as_slice(), ["ping"]);
    }

    #[test]
    fn test_fan_out_in_registration_order() {
        let dispatcher = dispatcher();
        let order = Arc::new(Mutex::new(Vec::new()));

        for tag in ["a", "b", "c"] {
            let order = Arc::clone(&order);
            dispatcher.subscribe(move |_| order.lock().unwrap().push(tag));
        }

        dispatcher
            .dispatch(&mut Payload::from(Message::new("tick")))
            .unwrap();
        assert_eq!(order.lock().unwrap().as_slice(), ["a", "b", "c"]);
    }

    #[test]
    fn test_subscribers_see_payload_fields() {
        let dispatcher = dispatcher();
        let seen = Arc::new(Mutex::new(None));

        let seen_in_callback = Arc::clone(&seen);
        dispatcher.subscribe(move |payload| {
            let message = payload.as_message().expect("message payload");
            *seen_in_callback.lock().unwrap() = message.field("id").cloned();
        });

        let message = Message::new("load").with_field("id", json!(7));
        dispatcher.dispatch(&mut Payload::from(message)).unwrap();

        assert_eq!(seen.lock().unwrap().clone(), Some(json!(7)));
    }
}
