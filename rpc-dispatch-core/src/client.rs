//! HTTP transport used to reach the backend
//!
//! The dispatcher talks to the backend through the [`Transport`] trait so
//! tests can swap in a scripted transport (see
//! [`testing::MockTransport`](crate::testing::MockTransport)). [`HttpClient`]
//! is the production implementation: one POST per backend action, endpoint
//! resolved by joining the action name onto a base URL.

use std::fmt;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;
use url::Url;

/// Transport-level failure: the call never produced a usable response.
#[derive(Debug)]
pub enum TransportError {
    /// Underlying HTTP failure (connect, timeout, non-2xx status, read).
    Http(reqwest::Error),
    /// The action name could not be joined onto the base URL.
    Url(url::ParseError),
    /// Failure outside HTTP, e.g. from a scripted test transport.
    Other(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Http(e) => write!(f, "backend request failed: {}", e),
            TransportError::Url(e) => write!(f, "invalid backend endpoint: {}", e),
            TransportError::Other(reason) => write!(f, "{}", reason),
        }
    }
}

impl std::error::Error for TransportError {}

/// Response body as seen by the success continuation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Body {
    /// Parsed JSON value. Only object values trigger a response dispatch.
    Json(Value),
    /// Non-JSON content, passed through untouched.
    Text(String),
    /// The body itself is an error value, e.g. declared JSON that failed to
    /// parse. Propagated to the handle without a follow-up dispatch.
    Error(String),
}

impl Body {
    /// The body's JSON object fields, if it is a JSON object.
    pub fn as_object(&self) -> Option<&Map<String, Value>> {
        match self {
            Body::Json(Value::Object(map)) => Some(map),
            _ => None,
        }
    }
}

/// A settled backend response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    /// HTTP status code.
    pub status: u16,
    /// Classified response body.
    pub body: Body,
}

impl Response {
    /// A 200 response with a JSON body. Convenience for tests and demos.
    pub fn json(value: Value) -> Self {
        Self {
            status: 200,
            body: Body::Json(value),
        }
    }
}

/// One-shot POST transport consumed by backend requests.
///
/// The endpoint is a call parameter rather than shared client state, so
/// overlapping requests never interfere with each other.
#[async_trait]
pub trait Transport: Send + Sync {
    /// POST `body` to the endpoint designated by `action`.
    async fn post(&self, action: &str, body: &Map<String, Value>)
        -> Result<Response, TransportError>;
}

/// `reqwest`-backed [`Transport`].
///
/// The base URL should end with a trailing slash so action names resolve
/// below it: a base of `https://host/app/` and action `store.doSomething`
/// POST to `https://host/app/store.doSomething`.
pub struct HttpClient {
    base: Url,
    http: reqwest::Client,
}

impl HttpClient {
    /// Create a client with a default `reqwest::Client`.
    pub fn new(base: Url) -> Self {
        Self::with_client(base, reqwest::Client::new())
    }

    /// Create a client reusing an existing `reqwest::Client`, e.g. one with
    /// custom timeouts or headers.
    pub fn with_client(base: Url, http: reqwest::Client) -> Self {
        Self { base, http }
    }

    /// The base URL actions are resolved against.
    pub fn base(&self) -> &Url {
        &self.base
    }
}

#[async_trait]
impl Transport for HttpClient {
    async fn post(
        &self,
        action: &str,
        body: &Map<String, Value>,
    ) -> Result<Response, TransportError> {
        let url = self.base.join(action).map_err(TransportError::Url)?;
        debug!(%url, "posting backend request");

        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(TransportError::Http)?
            .error_for_status()
            .map_err(TransportError::Http)?;

        let status = response.status().as_u16();
        let declared_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.contains("json"));
        let text = response.text().await.map_err(TransportError::Http)?;

        let body = if declared_json {
            match serde_json::from_str(&text) {
                Ok(value) => Body::Json(value),
                Err(e) => Body::Error(e.to_string()),
            }
        } else {
            Body::Text(text)
        };

        Ok(Response { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_body_as_object() {
        assert!(Body::Json(json!({ "a": 1 })).as_object().is_some());
        assert!(Body::Json(json!([1, 2])).as_object().is_none());
        assert!(Body::Json(json!("text")).as_object().is_none());
        assert!(Body::Text("plain".into()).as_object().is_none());
        assert!(Body::Error("broken".into()).as_object().is_none());
    }

    #[test]
    fn test_response_json_helper() {
        let response = Response::json(json!({ "ok": true }));
        assert_eq!(response.status, 200);
        assert_eq!(response.body, Body::Json(json!({ "ok": true })));
    }

    #[test]
    fn test_base_url_join() {
        let client = HttpClient::new(Url::parse("https://host/app/").unwrap());
        let url = client.base().join("store.doSomething").unwrap();
        assert_eq!(url.as_str(), "https://host/app/store.doSomething");
    }
}
