//! The shared API client.
//!
//! Every screen talks to the REST API through one `ApiClient`. The client
//! owns the status-to-error mapping so no screen has to look at status codes:
//!
//! - no token            → `MissingToken`, before anything is sent
//! - 401                 → `AuthenticationFailed`
//! - any other non-2xx   → `Http { status, message }`, where `message` is the
//!                         server's `message`/`detail` or the caller's fallback
//! - no response at all  → whatever the transport returned (`Network`)

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use referral_contracts::{
    endpoint::{Endpoint, Method, Resource},
    entity::EntityId,
    error::{ReferralError, ReferralResult},
    transport::{ApiRequest, ApiResponse},
};

use crate::{session::Session, traits::Transport};

/// Authenticated access to the referral API.
#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    session: Session,
}

impl ApiClient {
    pub fn new(transport: Arc<dyn Transport>, session: Session) -> Self {
        Self { transport, session }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    // ── Reads ────────────────────────────────────────────────────────────────

    /// GET a collection. A body that is not a JSON array is treated as empty.
    pub async fn list<T: DeserializeOwned>(
        &self,
        endpoint: Endpoint,
        failure: &str,
    ) -> ReferralResult<Vec<T>> {
        let response = self.call(Method::Get, endpoint, None, failure).await?;
        match response.body {
            Some(Value::Array(items)) => items
                .into_iter()
                .map(|item| {
                    serde_json::from_value(item).map_err(|e| ReferralError::Decode {
                        reason: e.to_string(),
                    })
                })
                .collect(),
            other => {
                debug!(
                    endpoint = %endpoint,
                    has_body = other.is_some(),
                    "collection response was not an array; using empty list"
                );
                Ok(Vec::new())
            }
        }
    }

    /// GET a single record and decode it.
    pub async fn fetch<T: DeserializeOwned>(
        &self,
        endpoint: Endpoint,
        failure: &str,
    ) -> ReferralResult<T> {
        let value = self.fetch_value(endpoint, failure).await?;
        serde_json::from_value(value).map_err(|e| ReferralError::Decode {
            reason: e.to_string(),
        })
    }

    /// GET a single record as raw JSON.
    pub async fn fetch_value(&self, endpoint: Endpoint, failure: &str) -> ReferralResult<Value> {
        let response = self.call(Method::Get, endpoint, None, failure).await?;
        response.body.ok_or_else(|| ReferralError::Decode {
            reason: format!("empty body from {}", endpoint),
        })
    }

    // ── Writes ───────────────────────────────────────────────────────────────

    /// POST a new record to `resource`'s collection.
    pub async fn create(&self, resource: Resource, body: Value) -> ReferralResult<Option<Value>> {
        let failure = format!("Failed to create {}", resource.singular());
        let response = self
            .call(Method::Post, Endpoint::Collection(resource), Some(body), &failure)
            .await?;
        info!(resource = %resource, "record created");
        Ok(response.body)
    }

    /// PATCH an existing record.
    pub async fn update(
        &self,
        resource: Resource,
        id: EntityId,
        body: Value,
    ) -> ReferralResult<Option<Value>> {
        let failure = format!("Failed to update {}", resource.singular());
        let response = self
            .call(Method::Patch, Endpoint::Item(resource, id), Some(body), &failure)
            .await?;
        info!(resource = %resource, id = %id, "record updated");
        Ok(response.body)
    }

    /// DELETE a record.
    pub async fn delete(&self, resource: Resource, id: EntityId) -> ReferralResult<()> {
        let failure = format!("Failed to delete {}", resource.singular());
        self.call(Method::Delete, Endpoint::Item(resource, id), None, &failure)
            .await?;
        info!(resource = %resource, id = %id, "record deleted");
        Ok(())
    }

    /// POST an arbitrary body to a relationship endpoint
    /// (`add_practitioner`, `send_referral`, ...).
    pub async fn post(
        &self,
        endpoint: Endpoint,
        body: Value,
        failure: &str,
    ) -> ReferralResult<Option<Value>> {
        let response = self.call(Method::Post, endpoint, Some(body), failure).await?;
        Ok(response.body)
    }

    // ── Login ────────────────────────────────────────────────────────────────

    /// Exchange credentials for a token at `token_path` and store it in the
    /// session. The response's `access` field is used, or `token` if absent.
    pub async fn login(&self, token_path: &str, username: &str, password: &str) -> ReferralResult<()> {
        let request = ApiRequest {
            method: Method::Post,
            path: token_path.to_string(),
            bearer: None,
            body: Some(json!({ "username": username, "password": password })),
        };
        let response = self.transport.send(request).await?;
        let response = check(response, token_path, "Login failed")?;

        let token = response
            .body
            .as_ref()
            .and_then(|body| {
                ["access", "token"]
                    .iter()
                    .find_map(|key| body.get(*key).and_then(Value::as_str))
            })
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ReferralError::Decode {
                reason: "token response carried neither `access` nor `token`".to_string(),
            })?;

        self.session.login(token)?;
        info!(username = %username, "logged in");
        Ok(())
    }

    // ── Internals ────────────────────────────────────────────────────────────

    async fn call(
        &self,
        method: Method,
        endpoint: Endpoint,
        body: Option<Value>,
        failure: &str,
    ) -> ReferralResult<ApiResponse> {
        let token = self.session.token()?;
        let mut request = ApiRequest::new(method, endpoint, &token);
        if let Some(body) = body {
            request = request.with_body(body);
        }

        debug!(method = %method, endpoint = %endpoint, "sending request");
        let response = self.transport.send(request).await.map_err(|e| {
            warn!(method = %method, endpoint = %endpoint, error = %e, "request failed");
            e
        })?;
        check(response, &endpoint.path(), failure)
    }
}

/// Map a non-2xx response to the matching error.
fn check(response: ApiResponse, path: &str, failure: &str) -> ReferralResult<ApiResponse> {
    if response.is_success() {
        return Ok(response);
    }
    warn!(path = %path, status = response.status, "non-OK response");
    if response.status == 401 {
        return Err(ReferralError::AuthenticationFailed);
    }
    let message = response.server_message().unwrap_or(failure).to_string();
    Err(ReferralError::Http {
        status: response.status,
        message,
    })
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use serde_json::json;

    use referral_contracts::{
        endpoint::{Endpoint, Method, Resource},
        entity::{EntityId, Provider},
        error::ReferralError,
    };

    use crate::testing::{anonymous_client, client, ScriptedTransport};

    #[tokio::test]
    async fn missing_token_fails_before_sending() {
        let transport = ScriptedTransport::new().ok(Method::Get, "/providers", json!([]));
        let api = anonymous_client(&transport);

        let result = api
            .list::<Provider>(Endpoint::Collection(Resource::Providers), "Failed to fetch providers")
            .await;

        assert_eq!(result, Err(ReferralError::MissingToken));
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn requests_carry_the_bearer_token() {
        let transport = ScriptedTransport::new().ok(Method::Get, "/patients", json!([]));
        let api = client(&transport);

        api.list::<serde_json::Value>(Endpoint::Collection(Resource::Patients), "x")
            .await
            .unwrap();

        let sent = transport.last_call().unwrap();
        assert_eq!(sent.bearer.as_deref(), Some("test-token"));
        assert_eq!(sent.path, "/patients");
    }

    #[tokio::test]
    async fn unauthorized_maps_to_authentication_failed() {
        let transport = ScriptedTransport::new().on(Method::Get, "/providers", 401, None);
        let api = client(&transport);

        let result = api
            .list::<Provider>(Endpoint::Collection(Resource::Providers), "Failed to fetch providers")
            .await;

        assert_eq!(result, Err(ReferralError::AuthenticationFailed));
        // No auto-logout.
        assert!(api.session().is_authenticated());
    }

    #[tokio::test]
    async fn other_failures_prefer_the_server_message() {
        let transport = ScriptedTransport::new()
            .on(Method::Post, "/providers", 400, Some(json!({ "message": "zip is invalid" })))
            .on(Method::Delete, "/patients/3", 500, None);
        let api = client(&transport);

        let created = api.create(Resource::Providers, json!({ "name": "A" })).await;
        let deleted = api.delete(Resource::Patients, EntityId(3)).await;

        assert_eq!(
            created,
            Err(ReferralError::Http {
                status: 400,
                message: "zip is invalid".to_string()
            })
        );
        assert_eq!(
            deleted,
            Err(ReferralError::Http {
                status: 500,
                message: "Failed to delete patient".to_string()
            })
        );
    }

    #[tokio::test]
    async fn non_array_collection_is_empty() {
        let transport =
            ScriptedTransport::new().ok(Method::Get, "/providers", json!({ "results": [] }));
        let api = client(&transport);

        let items = api
            .list::<Provider>(Endpoint::Collection(Resource::Providers), "x")
            .await
            .unwrap();
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn update_patches_the_item_path() {
        let transport = ScriptedTransport::new().ok(
            Method::Patch,
            "/providers/4",
            json!({ "id": 4, "name": "B" }),
        );
        let api = client(&transport);

        api.update(Resource::Providers, EntityId(4), json!({ "name": "B" }))
            .await
            .unwrap();

        let sent = transport.last_call().unwrap();
        assert_eq!(sent.method, Method::Patch);
        assert_eq!(sent.body, Some(json!({ "name": "B" })));
    }

    // ── Login ────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn login_stores_the_access_token() {
        let transport =
            ScriptedTransport::new().ok(Method::Post, "/token/", json!({ "access": "jwt-abc" }));
        let api = anonymous_client(&transport);

        api.login("/token/", "admin", "secret").await.unwrap();

        assert_eq!(api.session().token().unwrap(), "jwt-abc");
        let sent = transport.last_call().unwrap();
        assert_eq!(sent.bearer, None);
        assert_eq!(
            sent.body,
            Some(json!({ "username": "admin", "password": "secret" }))
        );
    }

    #[tokio::test]
    async fn login_accepts_token_field() {
        let transport =
            ScriptedTransport::new().ok(Method::Post, "/token/", json!({ "token": "t-1" }));
        let api = anonymous_client(&transport);

        api.login("/token/", "admin", "secret").await.unwrap();
        assert_eq!(api.session().token().unwrap(), "t-1");
    }

    #[tokio::test]
    async fn rejected_login_leaves_session_unauthenticated() {
        let transport = ScriptedTransport::new().on(Method::Post, "/token/", 401, None);
        let api = anonymous_client(&transport);

        let result = api.login("/token/", "admin", "wrong").await;
        assert_eq!(result, Err(ReferralError::AuthenticationFailed));
        assert!(!api.session().is_authenticated());
    }
}
