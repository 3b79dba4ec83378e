//! Screen state shared by the terminal UI and the CLI.
//!
//! Each screen is a plain struct holding what the user sees (records,
//! loading flag, error banner) plus async operations that drive it through
//! the `ApiClient`. Rendering is left to the front-ends.
//!
//! Fetches are split into an associated `fetch` that only talks to the API
//! and a `finish_*` that applies the result. A front-end that runs fetches
//! on background tasks can hold on to the screen while the request is in
//! flight and apply the result when it arrives.

pub mod detail;
pub mod form;
pub mod list;
pub mod membership;
pub mod referral_form;

use std::time::Duration;

use tracing::{debug, info};

use referral_contracts::{
    endpoint::{Endpoint, Resource},
    entity::EntityId,
    error::ReferralResult,
};
use serde_json::json;

use crate::{client::ApiClient, router::Route};

/// A destructive action waiting for the user's yes / no.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmAction {
    Delete(Resource, EntityId),
    RemovePractitioner {
        provider: EntityId,
        practitioner: EntityId,
    },
}

/// The prompt shown before a destructive action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    pub action: ConfirmAction,
    pub prompt: String,
}

impl Confirmation {
    pub fn delete(resource: Resource, id: EntityId) -> Self {
        Self {
            action: ConfirmAction::Delete(resource, id),
            prompt: format!(
                "Are you sure you want to delete this {}? This action cannot be undone.",
                resource.singular()
            ),
        }
    }

    pub fn remove_practitioner(provider: EntityId, practitioner: EntityId) -> Self {
        Self {
            action: ConfirmAction::RemovePractitioner {
                provider,
                practitioner,
            },
            prompt: "Are you sure you want to remove this practitioner from the provider?"
                .to_string(),
        }
    }

    /// Run the action if the user accepted. Declining sends nothing and
    /// returns `Ok(false)`.
    pub async fn resolve(&self, client: &ApiClient, accepted: bool) -> ReferralResult<bool> {
        if !accepted {
            debug!(action = ?self.action, "confirmation declined");
            return Ok(false);
        }
        perform(client, self.action).await?;
        Ok(true)
    }
}

/// Execute a confirmed action against the API.
pub async fn perform(client: &ApiClient, action: ConfirmAction) -> ReferralResult<()> {
    match action {
        ConfirmAction::Delete(resource, id) => client.delete(resource, id).await,
        ConfirmAction::RemovePractitioner {
            provider,
            practitioner,
        } => {
            client
                .post(
                    Endpoint::RemovePractitioner(provider),
                    json!({ "practitioner_id": practitioner }),
                    "Failed to remove practitioner from provider",
                )
                .await?;
            info!(provider = %provider, practitioner = %practitioner, "practitioner removed");
            Ok(())
        }
    }
}

/// What a successful form submission tells the front-end to do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitOutcome {
    /// Transient confirmation, e.g. "Provider created successfully!".
    pub message: String,
    /// Where to go once `delay` has passed.
    pub redirect: Route,
    pub delay: Duration,
}
