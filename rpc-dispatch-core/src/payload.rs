//! Payload types and follow-up action name derivation
//!
//! Two payload flavors flow through a [`Dispatcher`](crate::Dispatcher):
//!
//! - [`Message`]: a plain action message, a discriminant plus arbitrary
//!   string-keyed fields. Subscribers match on [`Message::kind`].
//! - [`RequestPayload`]: a backend-call request. Dispatching one triggers an
//!   HTTP POST; its outcome comes back as a second, derived `Message`.
//!
//! Follow-up action names are generated from the camel-case variant of the
//! backend action with `"Error"` or `"Response"` appended when not given
//! explicitly. Actions can be dotted, e.g. `"store.doSomething"` derives
//! `"storeDoSomethingError"` and `"storeDoSomethingResponse"`.

use std::fmt;

use serde_json::{Map, Value};

use crate::request::RequestHandle;

/// Reserved field routing the dispatch discriminant.
pub const KEY_TYPE: &str = "type";
/// Reserved field naming the backend action to invoke.
pub const KEY_ACTION: &str = "action";
/// Reserved field naming the action dispatched on failure.
pub const KEY_ERROR_ACTION: &str = "errorAction";
/// Reserved field naming the action dispatched on success.
pub const KEY_RESPONSE_ACTION: &str = "responseAction";
/// Reserved field holding body fields that win key collisions.
pub const KEY_REQUEST_PAYLOAD: &str = "requestPayload";
/// Reserved field holding base fields of the success follow-up.
pub const KEY_RESPONSE_PAYLOAD: &str = "responsePayload";

/// Errors produced while building or dispatching a payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadError {
    /// The `type` field is missing, empty, or not a JSON string.
    InvalidType,
    /// A reserved field is present but has the wrong shape for its key.
    InvalidField(&'static str),
    /// The backend action contains no alphanumeric word fragments.
    EmptyAction,
    /// The in-flight request handle was assigned a second time.
    HandleAlreadySet,
}

impl fmt::Display for PayloadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayloadError::InvalidType => {
                write!(f, "payload type must be a non-empty string")
            }
            PayloadError::InvalidField(key) => {
                write!(f, "reserved payload field {:?} has an invalid value", key)
            }
            PayloadError::EmptyAction => {
                write!(f, "backend action contains no word fragments")
            }
            PayloadError::HandleAlreadySet => {
                write!(f, "request payload can not hold more than one request handle")
            }
        }
    }
}

impl std::error::Error for PayloadError {}

/// A plain action message broadcast to subscribers.
///
/// Carries the dispatch discriminant plus an open field map. The follow-up
/// payloads produced by a backend call are `Message`s, so re-dispatching them
/// never triggers another backend call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Message {
    kind: String,
    fields: Map<String, Value>,
}

impl Message {
    /// Create a message with the given discriminant and no fields.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            fields: Map::new(),
        }
    }

    /// Add a single field.
    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    /// Merge a whole field map into the message, overwriting on collision.
    pub fn with_fields(mut self, fields: Map<String, Value>) -> Self {
        for (key, value) in fields {
            self.fields.insert(key, value);
        }
        self
    }

    /// The dispatch discriminant.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Look up a single field.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// All fields of the message.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }
}

/// A backend-call request payload.
///
/// Built from a raw field map; reserved keys are routed into typed fields and
/// every other key lands in the extra-field map forwarded verbatim into the
/// outgoing request body. The follow-up action names are always set after
/// construction, derived from the backend action when not given explicitly.
#[derive(Debug)]
pub struct RequestPayload {
    kind: String,
    action: String,
    error_action: String,
    response_action: String,
    request_payload: Option<Map<String, Value>>,
    response_payload: Option<Map<String, Value>>,
    extra: Map<String, Value>,
    handle: Option<RequestHandle>,
}

impl RequestPayload {
    /// Build a request payload carrying only a discriminant.
    ///
    /// The backend action defaults to the discriminant and the follow-up
    /// action names are derived from it.
    pub fn new(kind: impl Into<String>) -> Result<Self, PayloadError> {
        let mut fields = Map::new();
        fields.insert(KEY_TYPE.into(), Value::String(kind.into()));
        Self::from_fields(fields)
    }

    /// Build a request payload from a raw field map.
    ///
    /// Routing rules:
    /// - `type` is mandatory and must be a non-empty string.
    /// - `action` defaults to `type`.
    /// - `errorAction` / `responseAction` default to the camel-case variant
    ///   of `action` with `"Error"` / `"Response"` appended.
    /// - `requestPayload` / `responsePayload` must be objects when present.
    /// - every remaining key becomes an extra request-body field.
    pub fn from_fields(mut fields: Map<String, Value>) -> Result<Self, PayloadError> {
        let kind = match fields.remove(KEY_TYPE) {
            Some(Value::String(kind)) if !kind.is_empty() => kind,
            _ => return Err(PayloadError::InvalidType),
        };

        let action = match fields.remove(KEY_ACTION) {
            Some(Value::String(action)) => action,
            Some(_) => return Err(PayloadError::InvalidField(KEY_ACTION)),
            None => kind.clone(),
        };

        let error_action = take_action_name(&mut fields, KEY_ERROR_ACTION)?;
        let response_action = take_action_name(&mut fields, KEY_RESPONSE_ACTION)?;
        let request_payload = take_object(&mut fields, KEY_REQUEST_PAYLOAD)?;
        let response_payload = take_object(&mut fields, KEY_RESPONSE_PAYLOAD)?;

        let base = camel_case_base(&action).ok_or(PayloadError::EmptyAction)?;

        Ok(Self {
            kind,
            action,
            error_action: error_action.unwrap_or_else(|| format!("{base}Error")),
            response_action: response_action.unwrap_or_else(|| format!("{base}Response")),
            request_payload,
            response_payload,
            extra: fields,
            handle: None,
        })
    }

    /// Add an extra request-body field after construction.
    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// The dispatch discriminant.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// The backend action to invoke.
    pub fn action(&self) -> &str {
        &self.action
    }

    /// Action dispatched when the backend call fails.
    pub fn error_action(&self) -> &str {
        &self.error_action
    }

    /// Action dispatched when the backend call succeeds.
    pub fn response_action(&self) -> &str {
        &self.response_action
    }

    /// Body fields that win key collisions against extra fields.
    pub fn request_payload(&self) -> Option<&Map<String, Value>> {
        self.request_payload.as_ref()
    }

    /// Base fields of the success follow-up message.
    pub fn response_payload(&self) -> Option<&Map<String, Value>> {
        self.response_payload.as_ref()
    }

    /// Extra fields forwarded verbatim into the request body.
    pub fn extra(&self) -> &Map<String, Value> {
        &self.extra
    }

    /// The in-flight request handle, if this payload has been dispatched.
    pub fn handle(&self) -> Option<&RequestHandle> {
        self.handle.as_ref()
    }

    /// Move the request handle out for awaiting.
    pub fn take_handle(&mut self) -> Option<RequestHandle> {
        self.handle.take()
    }

    /// Store the in-flight request handle. Write-once: a payload triggers at
    /// most one backend call.
    pub fn set_handle(&mut self, handle: RequestHandle) -> Result<(), PayloadError> {
        if self.handle.is_some() {
            return Err(PayloadError::HandleAlreadySet);
        }

        self.handle = Some(handle);
        Ok(())
    }
}

/// A payload accepted by [`Dispatcher::dispatch`](crate::Dispatcher::dispatch).
#[derive(Debug)]
pub enum Payload {
    /// Plain action message: fan-out only.
    Message(Message),
    /// Backend-call request: intercepted before fan-out.
    Request(RequestPayload),
}

impl Payload {
    /// The dispatch discriminant, for either flavor.
    pub fn kind(&self) -> &str {
        match self {
            Payload::Message(message) => message.kind(),
            Payload::Request(request) => request.kind(),
        }
    }

    /// The message variant, if this is one.
    pub fn as_message(&self) -> Option<&Message> {
        match self {
            Payload::Message(message) => Some(message),
            Payload::Request(_) => None,
        }
    }

    /// The request variant, if this is one.
    pub fn as_request(&self) -> Option<&RequestPayload> {
        match self {
            Payload::Request(request) => Some(request),
            Payload::Message(_) => None,
        }
    }

    /// Mutable access to the request variant, e.g. to take its handle.
    pub fn as_request_mut(&mut self) -> Option<&mut RequestPayload> {
        match self {
            Payload::Request(request) => Some(request),
            Payload::Message(_) => None,
        }
    }
}

impl From<Message> for Payload {
    fn from(message: Message) -> Self {
        Payload::Message(message)
    }
}

impl From<RequestPayload> for Payload {
    fn from(request: RequestPayload) -> Self {
        Payload::Request(request)
    }
}

/// Join the action's word fragments camel-case style.
///
/// Fragments are runs of ASCII alphanumerics; anything else separates. The
/// first fragment is kept as-is, each following fragment contributes its
/// first character upper-cased. Returns `None` when no fragment remains.
fn camel_case_base(action: &str) -> Option<String> {
    let mut fragments = action
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|fragment| !fragment.is_empty());

    let mut base = fragments.next()?.to_string();

    for fragment in fragments {
        let mut chars = fragment.chars();
        if let Some(first) = chars.next() {
            base.push(first.to_ascii_uppercase());
            base.push_str(chars.as_str());
        }
    }

    Some(base)
}

fn take_action_name(
    fields: &mut Map<String, Value>,
    key: &'static str,
) -> Result<Option<String>, PayloadError> {
    match fields.remove(key) {
        None => Ok(None),
        Some(Value::String(name)) if !name.is_empty() => Ok(Some(name)),
        Some(_) => Err(PayloadError::InvalidField(key)),
    }
}

fn take_object(
    fields: &mut Map<String, Value>,
    key: &'static str,
) -> Result<Option<Map<String, Value>>, PayloadError> {
    match fields.remove(key) {
        None => Ok(None),
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(_) => Err(PayloadError::InvalidField(key)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {:?}", other),
        }
    }

    #[test]
    fn test_action_defaults_to_type() {
        let payload = RequestPayload::new("refresh").unwrap();

        assert_eq!(payload.kind(), "refresh");
        assert_eq!(payload.action(), "refresh");
        assert_eq!(payload.error_action(), "refreshError");
        assert_eq!(payload.response_action(), "refreshResponse");
    }

    #[test]
    fn test_camel_case_derivation() {
        let payload = RequestPayload::from_fields(fields(json!({
            "type": "load",
            "action": "store.doSomething",
        })))
        .unwrap();

        assert_eq!(payload.error_action(), "storeDoSomethingError");
        assert_eq!(payload.response_action(), "storeDoSomethingResponse");
    }

    #[test]
    fn test_multi_separator_action() {
        let payload = RequestPayload::from_fields(fields(json!({
            "type": "sync",
            "action": "queue::flush-all",
        })))
        .unwrap();

        assert_eq!(payload.error_action(), "queueFlushAllError");
        assert_eq!(payload.response_action(), "queueFlushAllResponse");
    }

    #[test]
    fn test_explicit_actions_not_derived() {
        let payload = RequestPayload::from_fields(fields(json!({
            "type": "load",
            "errorAction": "loadFailed",
            "responseAction": "loadDone",
        })))
        .unwrap();

        assert_eq!(payload.error_action(), "loadFailed");
        assert_eq!(payload.response_action(), "loadDone");
    }

    #[test]
    fn test_non_string_type_rejected() {
        let err = RequestPayload::from_fields(fields(json!({ "type": 42 }))).unwrap_err();
        assert_eq!(err, PayloadError::InvalidType);

        let err = RequestPayload::from_fields(Map::new()).unwrap_err();
        assert_eq!(err, PayloadError::InvalidType);

        let err = RequestPayload::from_fields(fields(json!({ "type": "" }))).unwrap_err();
        assert_eq!(err, PayloadError::InvalidType);
    }

    #[test]
    fn test_separator_only_action_rejected() {
        let err = RequestPayload::from_fields(fields(json!({
            "type": "load",
            "action": "...",
        })))
        .unwrap_err();

        assert_eq!(err, PayloadError::EmptyAction);
    }

    #[test]
    fn test_wrong_shaped_reserved_fields_rejected() {
        let err = RequestPayload::from_fields(fields(json!({
            "type": "load",
            "requestPayload": [1, 2],
        })))
        .unwrap_err();
        assert_eq!(err, PayloadError::InvalidField(KEY_REQUEST_PAYLOAD));

        let err = RequestPayload::from_fields(fields(json!({
            "type": "load",
            "errorAction": 7,
        })))
        .unwrap_err();
        assert_eq!(err, PayloadError::InvalidField(KEY_ERROR_ACTION));

        let err = RequestPayload::from_fields(fields(json!({
            "type": "load",
            "responseAction": "",
        })))
        .unwrap_err();
        assert_eq!(err, PayloadError::InvalidField(KEY_RESPONSE_ACTION));
    }

    #[test]
    fn test_extra_fields_routed() {
        let payload = RequestPayload::from_fields(fields(json!({
            "type": "load",
            "id": 7,
            "name": "first",
            "requestPayload": { "token": "t" },
        })))
        .unwrap();

        assert_eq!(payload.extra().get("id"), Some(&json!(7)));
        assert_eq!(payload.extra().get("name"), Some(&json!("first")));
        assert!(payload.extra().get(KEY_REQUEST_PAYLOAD).is_none());
        assert_eq!(
            payload.request_payload().and_then(|p| p.get("token")),
            Some(&json!("t"))
        );
    }

    #[test]
    fn test_leading_separator_ignored() {
        let payload = RequestPayload::from_fields(fields(json!({
            "type": "load",
            "action": ".store.load",
        })))
        .unwrap();

        assert_eq!(payload.error_action(), "storeLoadError");
    }

    #[test]
    fn test_camel_case_base() {
        assert_eq!(camel_case_base("refresh").as_deref(), Some("refresh"));
        assert_eq!(
            camel_case_base("store.doSomething").as_deref(),
            Some("storeDoSomething")
        );
        assert_eq!(camel_case_base("a_b_c").as_deref(), Some("aBC"));
        assert_eq!(camel_case_base(""), None);
        assert_eq!(camel_case_base("---"), None);
    }

    #[test]
    fn test_payload_kind() {
        let message = Payload::from(Message::new("ping"));
        assert_eq!(message.kind(), "ping");
        assert!(message.as_message().is_some());
        assert!(message.as_request().is_none());

        let request = Payload::from(RequestPayload::new("load").unwrap());
        assert_eq!(request.kind(), "load");
        assert!(request.as_request().is_some());
    }

    #[test]
    fn test_message_fields() {
        let message = Message::new("loadResponse")
            .with_field("id", json!(7))
            .with_fields(fields(json!({ "id": 8, "ok": true })));

        assert_eq!(message.field("id"), Some(&json!(8)));
        assert_eq!(message.field("ok"), Some(&json!(true)));
        assert!(message.field("missing").is_none());
    }
}
