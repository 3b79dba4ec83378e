//! # referral-http
//!
//! `HttpTransport`, the `reqwest` implementation of
//! `referral_core::traits::Transport`.
//!
//! The transport only moves bytes. It sets the bearer and JSON headers,
//! sends the body, and hands back whatever status came back along with the
//! body parsed as JSON when possible. Status interpretation lives in
//! `ApiClient`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde_json::Value;
use tracing::{debug, trace};

use referral_contracts::{
    endpoint::Method,
    error::{ReferralError, ReferralResult},
    transport::{ApiRequest, ApiResponse},
};
use referral_core::traits::Transport;

/// Sends `ApiRequest`s to a fixed API base URL.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    /// Build a transport for `base_url` (e.g. `http://127.0.0.1:8000/api`).
    ///
    /// With `timeout` unset, requests wait as long as the server takes.
    pub fn new(base_url: &str, timeout: Option<Duration>) -> ReferralResult<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(|e| ReferralError::Config {
            reason: format!("failed to create HTTP client: {}", e),
        })?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for a request path.
    pub fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

fn http_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
    }
}

/// Parse a response body as JSON; empty or non-JSON bodies become `None`.
fn parse_body(bytes: &[u8]) -> Option<Value> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return None;
    }
    serde_json::from_slice(bytes).ok()
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: ApiRequest) -> ReferralResult<ApiResponse> {
        let url = self.url_for(&request.path);
        debug!(method = %request.method, url = %url, "http request");

        let mut builder = self
            .http
            .request(http_method(request.method), &url)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json");
        if let Some(token) = &request.bearer {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| ReferralError::Network {
            reason: format!("{} {}: {}", request.method, url, e),
        })?;

        let status = response.status().as_u16();
        let bytes = response.bytes().await.map_err(|e| ReferralError::Network {
            reason: format!("failed to read response body from {}: {}", url, e),
        })?;
        trace!(status, len = bytes.len(), "http response");

        Ok(ApiResponse::new(status, parse_body(&bytes)))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
