//! The referral form: send a new referral from a provider, or edit one.
//!
//! Pickers are fed from the patient and provider collections, loaded in
//! parallel. Practitioner pickers follow the selected provider on each side
//! and quietly fall back to empty when their fetch fails.

use std::time::Duration;

use futures::join;
use serde_json::Value;
use tracing::{debug, info, warn};

use referral_contracts::{
    endpoint::{Endpoint, Resource},
    entity::{EntityId, Patient, Practitioner, Provider},
    error::{ReferralError, ReferralResult},
};

use crate::{
    client::ApiClient,
    router::Route,
    screens::{
        form::{FieldKind, FieldSpec, FormMode, FormValues},
        SubmitOutcome,
    },
};

pub const DEFAULT_REFERRAL_REDIRECT_DELAY: Duration = Duration::from_millis(1200);

pub const PATIENT: &str = "patient_id";
pub const SENDING_PROVIDER: &str = "sending_provider_id";
pub const RECEIVING_PROVIDER: &str = "receiving_provider_id";
pub const SENDING_PRACTITIONER: &str = "sending_practitioner_id";
pub const RECEIVING_PRACTITIONER: &str = "receiving_practitioner_id";

const fn id_field(
    key: &'static str,
    aliases: &'static [&'static str],
    label: &'static str,
    required: bool,
) -> FieldSpec {
    FieldSpec {
        key,
        aliases,
        label,
        kind: FieldKind::Integer,
        required,
    }
}

const fn text_field(key: &'static str, label: &'static str) -> FieldSpec {
    FieldSpec {
        key,
        aliases: &[],
        label,
        kind: FieldKind::Text,
        required: false,
    }
}

/// Keys are the submission keys; aliases are the keys of a fetched referral.
pub const REFERRAL_FIELDS: &[FieldSpec] = &[
    id_field(PATIENT, &["patient"], "Patient", true),
    id_field(SENDING_PROVIDER, &["sendingProvider"], "Sending Provider", false),
    id_field(RECEIVING_PROVIDER, &["receivingProvider"], "Receiving Provider", true),
    id_field(
        SENDING_PRACTITIONER,
        &["sendingPractitioner", "sendingPracticioner"],
        "Sending Practitioner",
        false,
    ),
    id_field(
        RECEIVING_PRACTITIONER,
        &["receivingPractitioner", "receivingPracticioner"],
        "Receiving Practitioner",
        false,
    ),
    text_field("reason", "Reason"),
    text_field("notes", "Notes"),
    text_field("priority", "Priority"),
];

/// Which practitioner picker a fetch belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Sending,
    Receiving,
}

#[derive(Debug, Clone)]
pub struct ReferralForm {
    pub mode: FormMode,
    pub values: FormValues,
    pub patients: Vec<Patient>,
    pub providers: Vec<Provider>,
    pub sending_practitioners: Vec<Practitioner>,
    pub receiving_practitioners: Vec<Practitioner>,
    pub loading: bool,
    pub submitting: bool,
    pub error: Option<String>,
    pub success: Option<String>,
    redirect_delay: Duration,
}

impl ReferralForm {
    /// A new referral sent from `provider`.
    pub fn send_from(provider: EntityId) -> Self {
        let mut form = Self::blank(FormMode::New);
        form.values.set(SENDING_PROVIDER, provider.to_string());
        form
    }

    /// Edit an existing referral.
    pub fn edit(id: EntityId) -> Self {
        Self::blank(FormMode::Edit(id))
    }

    fn blank(mode: FormMode) -> Self {
        Self {
            mode,
            values: FormValues::default(),
            patients: Vec::new(),
            providers: Vec::new(),
            sending_practitioners: Vec::new(),
            receiving_practitioners: Vec::new(),
            loading: false,
            submitting: false,
            error: None,
            success: None,
            redirect_delay: DEFAULT_REFERRAL_REDIRECT_DELAY,
        }
    }

    pub fn with_redirect_delay(mut self, delay: Duration) -> Self {
        self.redirect_delay = delay;
        self
    }

    pub fn title(&self) -> &'static str {
        match self.mode {
            FormMode::New => "Create Patient Referral",
            FormMode::Edit(_) => "Update Patient Referral",
        }
    }

    /// The selected ID in an ID field, if it parses.
    pub fn selected(&self, key: &str) -> Option<EntityId> {
        self.values.get(key).parse().ok()
    }

    pub fn select(&mut self, key: &'static str, id: Option<EntityId>) {
        self.values
            .set(key, id.map(|id| id.to_string()).unwrap_or_default());
    }

    /// Providers that may receive the referral: everyone except the sender.
    pub fn receiving_options(&self) -> Vec<&Provider> {
        let sending = self.selected(SENDING_PROVIDER);
        self.providers
            .iter()
            .filter(|p| sending.is_none() || p.id != sending)
            .collect()
    }

    // ── Loading ──────────────────────────────────────────────────────────────

    /// Patients and providers, fetched together.
    pub async fn fetch_options(
        client: &ApiClient,
    ) -> ReferralResult<(Vec<Patient>, Vec<Provider>)> {
        let (patients, providers) = join!(
            client.list::<Patient>(Endpoint::Collection(Resource::Patients), "Failed to load patients"),
            client.list::<Provider>(
                Endpoint::Collection(Resource::Providers),
                "Failed to load providers"
            ),
        );
        Ok((patients?, providers?))
    }

    pub fn finish_options(&mut self, result: ReferralResult<(Vec<Patient>, Vec<Provider>)>) {
        match result {
            Ok((patients, providers)) => {
                debug!(patients = patients.len(), providers = providers.len(), "referral options loaded");
                self.patients = patients;
                self.providers = providers;
            }
            Err(e) => {
                warn!(error = %e, "referral options failed");
                self.error = Some(e.user_message("Failed to load data"));
            }
        }
    }

    pub async fn fetch_referral(client: &ApiClient, id: EntityId) -> ReferralResult<Value> {
        client
            .fetch_value(
                Endpoint::Item(Resource::PatientReferrals, id),
                "Failed to load referral",
            )
            .await
    }

    /// Prefill from a fetched referral.
    pub fn finish_referral(&mut self, result: ReferralResult<Value>) {
        match result {
            Ok(record) => self.values = FormValues::prefill(REFERRAL_FIELDS, &record),
            Err(e) => {
                warn!(error = %e, "referral prefill failed");
                self.error = Some(e.user_message("Failed to load referral"));
            }
        }
    }

    /// Practitioners attached to `provider`; empty when the fetch fails.
    pub async fn practitioners_for(client: &ApiClient, provider: EntityId) -> Vec<Practitioner> {
        match client
            .list(
                Endpoint::ProviderPractitioners(provider),
                "Failed to load practitioners",
            )
            .await
        {
            Ok(items) => items,
            Err(e) => {
                debug!(provider = %provider, error = %e, "practitioner options unavailable");
                Vec::new()
            }
        }
    }

    pub fn set_practitioners(&mut self, side: Side, practitioners: Vec<Practitioner>) {
        match side {
            Side::Sending => self.sending_practitioners = practitioners,
            Side::Receiving => self.receiving_practitioners = practitioners,
        }
    }

    /// Reload one practitioner picker for the provider currently selected
    /// on that side.
    pub async fn refresh_practitioners(&mut self, client: &ApiClient, side: Side) {
        let key = match side {
            Side::Sending => SENDING_PROVIDER,
            Side::Receiving => RECEIVING_PROVIDER,
        };
        let practitioners = match self.selected(key) {
            Some(provider) => Self::practitioners_for(client, provider).await,
            None => Vec::new(),
        };
        self.set_practitioners(side, practitioners);
    }

    /// Everything the form needs before it can be shown.
    pub async fn load(&mut self, client: &ApiClient) {
        self.loading = true;
        self.error = None;

        let options = Self::fetch_options(client);
        match self.mode {
            FormMode::New => self.finish_options(options.await),
            FormMode::Edit(id) => {
                let (options, record) = join!(options, Self::fetch_referral(client, id));
                self.finish_options(options);
                self.finish_referral(record);
            }
        }

        self.refresh_practitioners(client, Side::Sending).await;
        self.refresh_practitioners(client, Side::Receiving).await;
        self.loading = false;
    }

    // ── Submit ───────────────────────────────────────────────────────────────

    /// Validate and build the snake_case `*_id` body.
    pub fn prepare(&mut self) -> ReferralResult<Value> {
        self.error = None;
        self.success = None;
        self.values.validate(REFERRAL_FIELDS)?;

        let sending = self.selected(SENDING_PROVIDER);
        if self.mode == FormMode::New && sending.is_none() {
            return Err(ReferralError::Validation {
                field: SENDING_PROVIDER.to_string(),
                reason: "Sending Provider is required".to_string(),
            });
        }
        if sending.is_some() && sending == self.selected(RECEIVING_PROVIDER) {
            return Err(ReferralError::Validation {
                field: RECEIVING_PROVIDER.to_string(),
                reason: "Receiving Provider must differ from Sending Provider".to_string(),
            });
        }
        self.values.request_body(REFERRAL_FIELDS)
    }

    /// POST to the sender's `send_referral`, or PATCH the referral.
    pub async fn send(
        client: &ApiClient,
        mode: FormMode,
        sending: Option<EntityId>,
        body: Value,
    ) -> ReferralResult<Option<Value>> {
        match (mode, sending) {
            (FormMode::Edit(id), _) => client.update(Resource::PatientReferrals, id, body).await,
            (FormMode::New, Some(provider)) => {
                client
                    .post(Endpoint::SendReferral(provider), body, "Failed to save referral")
                    .await
            }
            (FormMode::New, None) => Err(ReferralError::Validation {
                field: SENDING_PROVIDER.to_string(),
                reason: "Sending Provider is required".to_string(),
            }),
        }
    }

    pub fn finish_submit(&mut self, result: ReferralResult<Option<Value>>) -> Option<SubmitOutcome> {
        self.submitting = false;
        match result {
            Ok(_) => {
                let message = match self.mode {
                    FormMode::New => "Referral created successfully!",
                    FormMode::Edit(_) => "Referral updated successfully!",
                }
                .to_string();
                info!(mode = ?self.mode, "referral saved");
                self.success = Some(message.clone());
                let redirect = self
                    .selected(SENDING_PROVIDER)
                    .map_or(Route::Providers, Route::ProviderView);
                Some(SubmitOutcome {
                    message,
                    redirect,
                    delay: self.redirect_delay,
                })
            }
            Err(e) => {
                self.error = Some(e.user_message("Failed to save referral"));
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
        let result = Self::send(client, self.mode, self.selected(SENDING_PROVIDER), body).await;
        self.finish_submit(result)
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
