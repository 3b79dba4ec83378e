//! Collection screens: providers, practitioners, patients.

use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use referral_contracts::{
    endpoint::{Endpoint, Resource},
    entity::{EntityId, Record},
    error::{ReferralError, ReferralResult},
};

use crate::{
    client::ApiClient,
    screens::{ConfirmAction, Confirmation},
};

/// State of one collection screen.
#[derive(Debug, Clone)]
pub struct ListScreen<T> {
    resource: Resource,
    pub items: Vec<T>,
    pub loading: bool,
    /// Page-level error from the last fetch.
    pub error: Option<String>,
    /// Error from the last delete; shown alongside the list.
    pub delete_error: Option<String>,
}

impl<T> ListScreen<T>
where
    T: DeserializeOwned + Record,
{
    pub fn new(resource: Resource) -> Self {
        Self {
            resource,
            items: Vec::new(),
            loading: false,
            error: None,
            delete_error: None,
        }
    }

    pub fn resource(&self) -> Resource {
        self.resource
    }

    /// GET the collection for `resource`.
    pub async fn fetch(client: &ApiClient, resource: Resource) -> ReferralResult<Vec<T>> {
        let failure = format!("Failed to fetch {}", resource.segment());
        client.list(Endpoint::Collection(resource), &failure).await
    }

    pub fn begin_load(&mut self) {
        self.loading = true;
        self.error = None;
    }

    /// Apply a fetch result. A failure empties the list and sets the banner.
    pub fn finish_load(&mut self, result: ReferralResult<Vec<T>>) {
        self.loading = false;
        match result {
            Ok(items) => {
                debug!(resource = %self.resource, count = items.len(), "collection loaded");
                self.items = items;
                self.error = None;
            }
            Err(e) => {
                warn!(resource = %self.resource, error = %e, "collection fetch failed");
                self.items.clear();
                self.error = Some(e.user_message(&format!(
                    "An error occurred while fetching {}",
                    self.resource.segment()
                )));
            }
        }
    }

    /// Fetch and apply in one step. Also used for Retry.
    pub async fn load(&mut self, client: &ApiClient) {
        self.begin_load();
        let result = Self::fetch(client, self.resource).await;
        self.finish_load(result);
    }

    /// Ask before deleting `id`.
    pub fn request_delete(&self, id: EntityId) -> Confirmation {
        Confirmation::delete(self.resource, id)
    }

    /// Resolve a delete confirmation. On success the row is removed locally
    /// without refetching; declining leaves everything untouched.
    pub async fn confirm_delete(
        &mut self,
        client: &ApiClient,
        confirmation: &Confirmation,
        accepted: bool,
    ) {
        let ConfirmAction::Delete(_, id) = confirmation.action else {
            return;
        };
        if accepted {
            self.delete_error = None;
        }
        match confirmation.resolve(client, accepted).await {
            Ok(false) => {}
            Ok(true) => self.finish_delete(id, Ok(())),
            Err(e) => self.finish_delete(id, Err(e)),
        }
    }

    /// Apply the result of a delete of `id`.
    pub fn finish_delete(&mut self, id: EntityId, result: ReferralResult<()>) {
        match result {
            Ok(()) => {
                self.items.retain(|item| item.id() != Some(id));
                self.delete_error = None;
            }
            Err(e) => {
                warn!(resource = %self.resource, id = %id, error = %e, "delete failed");
                self.delete_error = Some(delete_message(&e, self.resource));
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

fn delete_message(e: &ReferralError, resource: Resource) -> String {
    e.user_message(&format!("Failed to delete {}", resource.singular()))
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use serde_json::json;

    use referral_contracts::{
        endpoint::{Method, Resource},
        entity::{EntityId, Patient, Provider},
    };

    use super::ListScreen;
    use crate::testing::{anonymous_client, client, ScriptedTransport};

    fn patients() -> serde_json::Value {
        json!([
            { "id": 1, "name": "Jane Doe" },
            { "id": 2, "name": "John Roe" }
        ])
    }

    // ── Loading ──────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn load_populates_items() {
        let transport = ScriptedTransport::new().ok(Method::Get, "/patients", patients());
        let api = client(&transport);
        let mut screen = ListScreen::<Patient>::new(Resource::Patients);

        screen.load(&api).await;

        assert_eq!(screen.items.len(), 2);
        assert!(!screen.loading);
        assert_eq!(screen.error, None);
    }

    #[tokio::test]
    async fn non_ok_response_gives_empty_list_and_error() {
        let transport = ScriptedTransport::new().on(Method::Get, "/providers", 500, None);
        let api = client(&transport);
        let mut screen = ListScreen::<Provider>::new(Resource::Providers);

        screen.load(&api).await;

        assert!(screen.is_empty());
        assert_eq!(screen.error.as_deref(), Some("Failed to fetch providers"));
    }

    #[tokio::test]
    async fn unauthorized_shows_login_message() {
        let transport = ScriptedTransport::new().on(Method::Get, "/providers", 401, None);
        let api = client(&transport);
        let mut screen = ListScreen::<Provider>::new(Resource::Providers);

        screen.load(&api).await;

        assert_eq!(
            screen.error.as_deref(),
            Some("Authentication failed. Please login again.")
        );
    }

    #[tokio::test]
    async fn missing_token_is_reported_without_a_request() {
        let transport = ScriptedTransport::new();
        let api = anonymous_client(&transport);
        let mut screen = ListScreen::<Provider>::new(Resource::Providers);

        screen.load(&api).await;

        assert_eq!(screen.error.as_deref(), Some("No authentication token found"));
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn network_failure_uses_generic_message() {
        let transport = ScriptedTransport::new();
        let api = client(&transport);
        let mut screen = ListScreen::<Provider>::new(Resource::Providers);

        screen.load(&api).await;

        assert_eq!(
            screen.error.as_deref(),
            Some("An error occurred while fetching providers")
        );
    }

    #[tokio::test]
    async fn retry_reissues_the_same_fetch() {
        let transport = ScriptedTransport::new().on(Method::Get, "/patients", 503, None);
        let api = client(&transport);
        let mut screen = ListScreen::<Patient>::new(Resource::Patients);
        screen.load(&api).await;
        assert!(screen.error.is_some());

        let transport = transport.ok(Method::Get, "/patients", patients());
        screen.load(&api).await;

        assert_eq!(screen.error, None);
        assert_eq!(screen.items.len(), 2);
        assert_eq!(transport.paths(), vec!["GET /patients", "GET /patients"]);
    }

    // ── Deletion ─────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn declining_delete_sends_nothing_and_keeps_rows() {
        let transport = ScriptedTransport::new()
            .ok(Method::Get, "/patients", patients())
            .on(Method::Delete, "/patients/1", 204, None);
        let api = client(&transport);
        let mut screen = ListScreen::<Patient>::new(Resource::Patients);
        screen.load(&api).await;

        let confirmation = screen.request_delete(EntityId(1));
        screen.confirm_delete(&api, &confirmation, false).await;

        assert_eq!(screen.items.len(), 2);
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn confirmed_delete_removes_row_locally() {
        let transport = ScriptedTransport::new()
            .ok(Method::Get, "/patients", patients())
            .on(Method::Delete, "/patients/1", 204, None);
        let api = client(&transport);
        let mut screen = ListScreen::<Patient>::new(Resource::Patients);
        screen.load(&api).await;

        let confirmation = screen.request_delete(EntityId(1));
        screen.confirm_delete(&api, &confirmation, true).await;

        assert_eq!(screen.items.len(), 1);
        assert_eq!(screen.items[0].id, Some(EntityId(2)));
        // No refetch after delete.
        assert_eq!(transport.paths(), vec!["GET /patients", "DELETE /patients/1"]);
    }

    #[tokio::test]
    async fn failed_delete_keeps_row_and_sets_delete_error() {
        let transport = ScriptedTransport::new()
            .ok(Method::Get, "/patients", patients())
            .on(Method::Delete, "/patients/1", 500, None);
        let api = client(&transport);
        let mut screen = ListScreen::<Patient>::new(Resource::Patients);
        screen.load(&api).await;

        let confirmation = screen.request_delete(EntityId(1));
        screen.confirm_delete(&api, &confirmation, true).await;

        assert_eq!(screen.items.len(), 2);
        assert_eq!(screen.delete_error.as_deref(), Some("Failed to delete patient"));
        assert_eq!(screen.error, None);
    }
}
