//! Scripted trait implementations shared by the unit tests in this crate.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use serde_json::Value;

use referral_contracts::{
    endpoint::Method,
    error::{ReferralError, ReferralResult},
    transport::{ApiRequest, ApiResponse},
};

use crate::{
    client::ApiClient,
    session::Session,
    traits::{TokenStore, Transport},
};

/// A transport that answers from a fixed table keyed by "METHOD /path" and
/// records every request it sees.
///
/// Unscripted requests fail with a network error so a missing script entry
/// shows up as a failed lookup rather than a hang.
#[derive(Clone, Default)]
pub(crate) struct ScriptedTransport {
    responses: Arc<Mutex<HashMap<String, ApiResponse>>>,
    pub(crate) calls: Arc<Mutex<Vec<ApiRequest>>>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Script a response for `method path`.
    pub(crate) fn on(self, method: Method, path: &str, status: u16, body: Option<Value>) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert(format!("{} {}", method, path), ApiResponse::new(status, body));
        self
    }

    pub(crate) fn ok(self, method: Method, path: &str, body: Value) -> Self {
        self.on(method, path, 200, Some(body))
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub(crate) fn last_call(&self) -> Option<ApiRequest> {
        self.calls.lock().unwrap().last().cloned()
    }

    pub(crate) fn paths(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|r| format!("{} {}", r.method, r.path))
            .collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: ApiRequest) -> ReferralResult<ApiResponse> {
        let key = format!("{} {}", request.method, request.path);
        self.calls.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .get(&key)
            .cloned()
            .ok_or_else(|| ReferralError::Network {
                reason: format!("no scripted response for {}", key),
            })
    }
}

/// A token store that lives only as long as the test.
#[derive(Default)]
pub(crate) struct MemoryStore {
    pub(crate) token: Mutex<Option<String>>,
}

impl MemoryStore {
    pub(crate) fn with_token(token: &str) -> Self {
        Self {
            token: Mutex::new(Some(token.to_string())),
        }
    }
}

impl TokenStore for MemoryStore {
    fn load(&self) -> ReferralResult<Option<String>> {
        Ok(self.token.lock().unwrap().clone())
    }

    fn save(&self, token: &str) -> ReferralResult<()> {
        *self.token.lock().unwrap() = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> ReferralResult<()> {
        *self.token.lock().unwrap() = None;
        Ok(())
    }
}

/// An authenticated client over `transport`.
pub(crate) fn client(transport: &ScriptedTransport) -> ApiClient {
    let session = Session::restore(Arc::new(MemoryStore::with_token("test-token"))).unwrap();
    ApiClient::new(Arc::new(transport.clone()), session)
}

/// A client whose session holds no token.
pub(crate) fn anonymous_client(transport: &ScriptedTransport) -> ApiClient {
    let session = Session::restore(Arc::new(MemoryStore::default())).unwrap();
    ApiClient::new(Arc::new(transport.clone()), session)
}
