//! Request and response envelopes exchanged with a `Transport`.
//!
//! These are deliberately HTTP-library agnostic so the screen logic can be
//! driven by a scripted transport in tests.

use serde_json::Value;

use crate::endpoint::{Endpoint, Method};

/// A single outgoing API call.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    /// Path relative to the API base URL, starting with `/`.
    pub path: String,
    /// Sent as `Authorization: Bearer <token>` when present.
    pub bearer: Option<String>,
    /// Sent as a JSON body when present.
    pub body: Option<Value>,
}

impl ApiRequest {
    /// An authenticated request against a known endpoint.
    pub fn new(method: Method, endpoint: Endpoint, token: &str) -> Self {
        Self {
            method,
            path: endpoint.path(),
            bearer: Some(token.to_string()),
            body: None,
        }
    }

    /// Attach a JSON body.
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// What came back for an `ApiRequest`.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    /// Parsed JSON body. `None` when the body was empty or not JSON.
    pub body: Option<Value>,
}

impl ApiResponse {
    pub fn new(status: u16, body: Option<Value>) -> Self {
        Self { status, body }
    }

    /// True for any 2xx status.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The server's own explanation of a failure, if it sent one.
    ///
    /// Looks at `message` first, then `detail`.
    pub fn server_message(&self) -> Option<&str> {
        let body = self.body.as_ref()?;
        ["message", "detail"]
            .iter()
            .find_map(|key| body.get(*key).and_then(Value::as_str))
            .filter(|s| !s.is_empty())
    }
}
