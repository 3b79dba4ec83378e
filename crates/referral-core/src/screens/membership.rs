//! Attaching practitioners to a provider.
//!
//! Removal goes through a `Confirmation` (see `Confirmation::remove_practitioner`).

use std::time::Duration;

use serde_json::{json, Value};
use tracing::{info, warn};

use referral_contracts::{
    endpoint::{Endpoint, Resource},
    entity::{EntityId, Practitioner},
    error::{ReferralError, ReferralResult},
};

use crate::{
    client::ApiClient,
    router::Route,
    screens::{form::DEFAULT_REDIRECT_DELAY, SubmitOutcome},
};

/// The "add practitioner to provider" screen.
#[derive(Debug, Clone)]
pub struct AddPractitionerForm {
    pub provider: EntityId,
    pub practitioners: Vec<Practitioner>,
    pub selected: Option<EntityId>,
    pub loading: bool,
    pub submitting: bool,
    pub error: Option<String>,
    pub success: Option<String>,
    redirect_delay: Duration,
}

impl AddPractitionerForm {
    pub fn new(provider: EntityId) -> Self {
        Self {
            provider,
            practitioners: Vec::new(),
            selected: None,
            loading: false,
            submitting: false,
            error: None,
            success: None,
            redirect_delay: DEFAULT_REDIRECT_DELAY,
        }
    }

    pub fn with_redirect_delay(mut self, delay: Duration) -> Self {
        self.redirect_delay = delay;
        self
    }

    /// All practitioners, to pick from.
    pub async fn fetch(client: &ApiClient) -> ReferralResult<Vec<Practitioner>> {
        client
            .list(
                Endpoint::Collection(Resource::Practitioners),
                "Failed to fetch practitioners",
            )
            .await
    }

    pub fn begin_load(&mut self) {
        self.loading = true;
        self.error = None;
    }

    pub fn finish_load(&mut self, result: ReferralResult<Vec<Practitioner>>) {
        self.loading = false;
        match result {
            Ok(items) => self.practitioners = items,
            Err(e) => {
                warn!(provider = %self.provider, error = %e, "practitioner options failed");
                self.error = Some(e.user_message("An error occurred while fetching practitioners"));
            }
        }
    }

    pub async fn load(&mut self, client: &ApiClient) {
        self.begin_load();
        let result = Self::fetch(client).await;
        self.finish_load(result);
    }

    /// Check the selection and build the body.
    pub fn prepare(&mut self) -> ReferralResult<Value> {
        self.error = None;
        self.success = None;
        match self.selected {
            Some(id) => Ok(json!({ "practitioner_id": id })),
            None => Err(ReferralError::Validation {
                field: "practitioner_id".to_string(),
                reason: "Please select a practitioner".to_string(),
            }),
        }
    }

    pub async fn send(client: &ApiClient, provider: EntityId, body: Value) -> ReferralResult<Option<Value>> {
        client
            .post(
                Endpoint::AddPractitioner(provider),
                body,
                "Failed to add practitioner to provider",
            )
            .await
    }

    pub fn finish_submit(&mut self, result: ReferralResult<Option<Value>>) -> Option<SubmitOutcome> {
        self.submitting = false;
        match result {
            Ok(_) => {
                info!(provider = %self.provider, practitioner = ?self.selected, "practitioner added");
                let message = "Practitioner added successfully!".to_string();
                self.success = Some(message.clone());
                Some(SubmitOutcome {
                    message,
                    redirect: Route::ProviderView(self.provider),
                    delay: self.redirect_delay,
                })
            }
            Err(e) => {
                self.error = Some(e.user_message("An error occurred while adding practitioner"));
                None
            }
        }
    }

    pub async fn submit(&mut self, client: &ApiClient) -> Option<SubmitOutcome> {
        let body = match self.prepare() {
            Ok(body) => body,
            Err(e) => return self.finish_submit(Err(e)),
        };
        self.submitting = true;
        let result = Self::send(client, self.provider, body).await;
        self.finish_submit(result)
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
