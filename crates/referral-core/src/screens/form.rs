//! Create / edit forms for providers, practitioners and patients.
//!
//! A form is `New` (empty, POST on submit) or `Edit(id)` (GET to prefill,
//! PATCH on submit). Field values are held as the strings the user typed;
//! they are converted to wire values only when the body is built.

use std::{collections::HashMap, time::Duration};

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use referral_contracts::{
    endpoint::{Endpoint, Resource},
    entity::EntityId,
    error::{ReferralError, ReferralResult},
};

use crate::{client::ApiClient, router::Route, screens::SubmitOutcome};

pub const DEFAULT_REDIRECT_DELAY: Duration = Duration::from_millis(1500);

/// How a field's text is sent to the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Sent as a JSON string.
    Text,
    /// Parsed and sent as a JSON number.
    Integer,
    /// Parsed and sent as arbitrary JSON.
    Json,
}

/// One input of a form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// Key in the submitted body and in the prefill record.
    pub key: &'static str,
    /// Other keys the prefill record may use for the same value.
    pub aliases: &'static [&'static str],
    pub label: &'static str,
    pub kind: FieldKind,
    pub required: bool,
}

const fn text(key: &'static str, label: &'static str) -> FieldSpec {
    FieldSpec {
        key,
        aliases: &[],
        label,
        kind: FieldKind::Text,
        required: false,
    }
}

const fn name_field() -> FieldSpec {
    FieldSpec {
        required: true,
        ..text("name", "Name")
    }
}

pub const PROVIDER_FIELDS: &[FieldSpec] = &[
    name_field(),
    FieldSpec {
        aliases: &["addressLine1"],
        ..text("address_line1", "Address")
    },
    text("city", "City"),
    text("state", "State"),
    FieldSpec {
        kind: FieldKind::Integer,
        ..text("zip", "ZIP")
    },
    text("email", "Email"),
    text("phone", "Phone"),
];

pub const PRACTITIONER_FIELDS: &[FieldSpec] = &[
    name_field(),
    FieldSpec {
        aliases: &["jobTitle"],
        ..text("job_title", "Job Title")
    },
    FieldSpec {
        aliases: &["licenseNumber"],
        ..text("license_number", "License Number")
    },
    text("specialty", "Specialty"),
    text("email", "Email"),
    text("phone", "Phone"),
];

pub const PATIENT_FIELDS: &[FieldSpec] = &[
    name_field(),
    text("email", "Email"),
    text("phone", "Phone"),
    FieldSpec {
        kind: FieldKind::Json,
        ..text("data", "Data (JSON)")
    },
];

/// Whether the form creates a new record or edits an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormMode {
    New,
    Edit(EntityId),
}

impl FormMode {
    pub fn from_id(id: Option<EntityId>) -> Self {
        id.map_or(FormMode::New, FormMode::Edit)
    }

    /// ("created", "creating") or ("updated", "updating").
    fn verb(self) -> (&'static str, &'static str) {
        match self {
            FormMode::New => ("created", "creating"),
            FormMode::Edit(_) => ("updated", "updating"),
        }
    }
}

/// The text currently typed into each field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormValues {
    values: HashMap<&'static str, String>,
}

impl FormValues {
    pub fn get(&self, key: &str) -> &str {
        self.values.get(key).map(String::as_str).unwrap_or("")
    }

    pub fn set(&mut self, key: &'static str, value: impl Into<String>) {
        self.values.insert(key, value.into());
    }

    /// Values copied from a fetched record. Fields the record lacks are
    /// empty strings.
    pub fn prefill(fields: &[FieldSpec], record: &Value) -> Self {
        let mut values = FormValues::default();
        for spec in fields {
            let raw = std::iter::once(spec.key)
                .chain(spec.aliases.iter().copied())
                .find_map(|key| record.get(key).filter(|v| !v.is_null()));
            values.set(spec.key, raw.map(|v| display_value(v, spec.kind)).unwrap_or_default());
        }
        values
    }

    /// Check required fields. No request is sent when this fails.
    pub fn validate(&self, fields: &[FieldSpec]) -> ReferralResult<()> {
        match fields
            .iter()
            .find(|spec| spec.required && self.get(spec.key).trim().is_empty())
        {
            Some(spec) => Err(ReferralError::Validation {
                field: spec.key.to_string(),
                reason: format!("{} is required", spec.label),
            }),
            None => Ok(()),
        }
    }

    /// The submission body: only fields with a non-empty value, each
    /// converted according to its kind.
    pub fn request_body(&self, fields: &[FieldSpec]) -> ReferralResult<Value> {
        let mut body = Map::new();
        for spec in fields {
            let raw = self.get(spec.key);
            if raw.is_empty() {
                continue;
            }
            body.insert(spec.key.to_string(), wire_value(spec, raw)?);
        }
        Ok(Value::Object(body))
    }
}

fn display_value(value: &Value, kind: FieldKind) -> String {
    match (value, kind) {
        (Value::String(s), _) => s.clone(),
        (other, FieldKind::Json) => {
            serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string())
        }
        (other, _) => other.to_string(),
    }
}

pub(crate) fn wire_value(spec: &FieldSpec, raw: &str) -> ReferralResult<Value> {
    match spec.kind {
        FieldKind::Text => Ok(Value::String(raw.to_string())),
        FieldKind::Integer => raw
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| ReferralError::Validation {
                field: spec.key.to_string(),
                reason: format!("{} must be a whole number", spec.label),
            }),
        FieldKind::Json => serde_json::from_str(raw).map_err(|e| ReferralError::Validation {
            field: spec.key.to_string(),
            reason: format!("{} must be valid JSON: {}", spec.label, e),
        }),
    }
}

/// A create / edit form for one of the directory entities.
#[derive(Debug, Clone)]
pub struct EntityForm {
    resource: Resource,
    pub mode: FormMode,
    pub fields: &'static [FieldSpec],
    pub values: FormValues,
    pub loading: bool,
    pub submitting: bool,
    pub error: Option<String>,
    pub success: Option<String>,
    redirect_delay: Duration,
}

impl EntityForm {
    pub fn new(resource: Resource, mode: FormMode) -> Self {
        let fields = match resource {
            Resource::Providers => PROVIDER_FIELDS,
            Resource::Practitioners => PRACTITIONER_FIELDS,
            // Referrals use `ReferralForm`.
            Resource::Patients | Resource::PatientReferrals => PATIENT_FIELDS,
        };
        Self {
            resource,
            mode,
            fields,
            values: FormValues::default(),
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

    pub fn resource(&self) -> Resource {
        self.resource
    }

    /// Screen heading, e.g. "Edit Provider".
    pub fn title(&self) -> String {
        match self.mode {
            FormMode::New => format!("New {}", self.resource.title()),
            FormMode::Edit(_) => format!("Edit {}", self.resource.title()),
        }
    }

    // ── Prefill ──────────────────────────────────────────────────────────────

    /// GET the record being edited as raw JSON.
    pub async fn fetch(client: &ApiClient, resource: Resource, id: EntityId) -> ReferralResult<Value> {
        let failure = format!("Failed to fetch {}", resource.singular());
        client
            .fetch_value(Endpoint::Item(resource, id), &failure)
            .await
    }

    pub fn begin_load(&mut self) {
        self.loading = true;
        self.error = None;
    }

    pub fn finish_load(&mut self, result: ReferralResult<Value>) {
        self.loading = false;
        match result {
            Ok(record) => {
                self.values = FormValues::prefill(self.fields, &record);
                debug!(resource = %self.resource, "form prefilled");
            }
            Err(e) => {
                warn!(resource = %self.resource, error = %e, "prefill failed");
                self.error = Some(e.user_message(&format!(
                    "An error occurred while fetching {}",
                    self.resource.singular()
                )));
            }
        }
    }

    /// Prefill in edit mode; a new form stays empty and sends nothing.
    pub async fn load(&mut self, client: &ApiClient) {
        if let FormMode::Edit(id) = self.mode {
            self.begin_load();
            let result = Self::fetch(client, self.resource, id).await;
            self.finish_load(result);
        }
    }

    // ── Submit ───────────────────────────────────────────────────────────────

    /// Validate and build the request body. Clears the banners.
    pub fn prepare(&mut self) -> ReferralResult<Value> {
        self.error = None;
        self.success = None;
        self.values.validate(self.fields)?;
        self.values.request_body(self.fields)
    }

    /// POST or PATCH `body` according to `mode`.
    pub async fn send(
        client: &ApiClient,
        resource: Resource,
        mode: FormMode,
        body: Value,
    ) -> ReferralResult<Option<Value>> {
        match mode {
            FormMode::New => client.create(resource, body).await,
            FormMode::Edit(id) => client.update(resource, id, body).await,
        }
    }

    /// Apply the result of `prepare` + `send`.
    pub fn finish_submit(&mut self, result: ReferralResult<Option<Value>>) -> Option<SubmitOutcome> {
        self.submitting = false;
        let (done, doing) = self.mode.verb();
        match result {
            Ok(_) => {
                let message = format!("{} {} successfully!", self.resource.title(), done);
                info!(resource = %self.resource, mode = ?self.mode, "form submitted");
                self.success = Some(message.clone());
                Some(SubmitOutcome {
                    message,
                    redirect: Route::list(self.resource),
                    delay: self.redirect_delay,
                })
            }
            Err(e) => {
                let fallback = format!(
                    "An error occurred while {} {}",
                    doing,
                    self.resource.singular()
                );
                self.error = Some(e.user_message(&fallback));
                None
            }
        }
    }

    /// Validate, send, and apply in one step.
    pub async fn submit(&mut self, client: &ApiClient) -> Option<SubmitOutcome> {
        let body = match self.prepare() {
            Ok(body) => body,
            Err(e) => return self.finish_submit(Err(e)),
        };
        self.submitting = true;
        let result = Self::send(client, self.resource, self.mode, body).await;
        self.finish_submit(result)
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
