//! Single-record screens.
//!
//! The primary record is page-fatal: if it cannot be fetched the screen
//! shows an error and a Retry. Related collections are best effort: a
//! failed related fetch is logged and shows as an empty section.

use futures::join;
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use referral_contracts::{
    endpoint::{Direction, Endpoint, Resource},
    entity::{EntityId, Patient, Practitioner, Provider},
    error::ReferralResult,
    referral::{EnrichedReferral, PatientReferral},
};

use crate::{client::ApiClient, enrich::enrich_referrals};

/// Loading / error / data state of a view screen.
#[derive(Debug, Clone)]
pub struct DetailScreen<T> {
    resource: Resource,
    pub id: EntityId,
    pub data: Option<T>,
    pub loading: bool,
    pub error: Option<String>,
}

impl<T> DetailScreen<T> {
    pub fn new(resource: Resource, id: EntityId) -> Self {
        Self {
            resource,
            id,
            data: None,
            loading: false,
            error: None,
        }
    }

    pub fn begin(&mut self) {
        self.loading = true;
        self.error = None;
    }

    pub fn finish(&mut self, result: ReferralResult<T>) {
        self.loading = false;
        match result {
            Ok(data) => {
                self.data = Some(data);
                self.error = None;
            }
            Err(e) => {
                warn!(resource = %self.resource, id = %self.id, error = %e, "record fetch failed");
                self.data = None;
                self.error = Some(e.user_message(&format!(
                    "An error occurred while fetching {}",
                    self.resource.singular()
                )));
            }
        }
    }
}

/// A provider with its practitioners and both referral directions.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProviderDetail {
    pub provider: Provider,
    pub practitioners: Vec<Practitioner>,
    pub referrals_sent: Vec<EnrichedReferral>,
    pub referrals_received: Vec<EnrichedReferral>,
}

/// A practitioner with both referral directions.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PractitionerDetail {
    pub practitioner: Practitioner,
    pub referrals_sent: Vec<EnrichedReferral>,
    pub referrals_received: Vec<EnrichedReferral>,
}

/// GET one record of `resource`.
pub async fn fetch_record<T: DeserializeOwned>(
    client: &ApiClient,
    resource: Resource,
    id: EntityId,
) -> ReferralResult<T> {
    let failure = format!("Failed to fetch {}", resource.singular());
    client.fetch(Endpoint::Item(resource, id), &failure).await
}

pub async fn fetch_provider_detail(client: &ApiClient, id: EntityId) -> ReferralResult<ProviderDetail> {
    let provider = fetch_record::<Provider>(client, Resource::Providers, id).await?;

    let (practitioners, sent, received) = join!(
        related::<Practitioner>(client, Endpoint::ProviderPractitioners(id)),
        related_referrals(client, Resource::Providers, id, Direction::Sent),
        related_referrals(client, Resource::Providers, id, Direction::Received),
    );

    Ok(ProviderDetail {
        provider,
        practitioners,
        referrals_sent: sent,
        referrals_received: received,
    })
}

pub async fn fetch_practitioner_detail(
    client: &ApiClient,
    id: EntityId,
) -> ReferralResult<PractitionerDetail> {
    let practitioner = fetch_record::<Practitioner>(client, Resource::Practitioners, id).await?;

    let (sent, received) = join!(
        related_referrals(client, Resource::Practitioners, id, Direction::Sent),
        related_referrals(client, Resource::Practitioners, id, Direction::Received),
    );

    Ok(PractitionerDetail {
        practitioner,
        referrals_sent: sent,
        referrals_received: received,
    })
}

pub async fn fetch_patient(client: &ApiClient, id: EntityId) -> ReferralResult<Patient> {
    fetch_record(client, Resource::Patients, id).await
}

pub async fn fetch_referral(client: &ApiClient, id: EntityId) -> ReferralResult<PatientReferral> {
    fetch_record(client, Resource::PatientReferrals, id).await
}

async fn related<T: DeserializeOwned>(client: &ApiClient, endpoint: Endpoint) -> Vec<T> {
    match client.list(endpoint, "Failed to fetch related records").await {
        Ok(items) => items,
        Err(e) => {
            warn!(endpoint = %endpoint, error = %e, "related collection failed; showing empty");
            Vec::new()
        }
    }
}

async fn related_referrals(
    client: &ApiClient,
    owner: Resource,
    id: EntityId,
    direction: Direction,
) -> Vec<EnrichedReferral> {
    let raw = related::<PatientReferral>(
        client,
        Endpoint::Referrals {
            owner,
            id,
            direction,
        },
    )
    .await;
    debug!(owner = %owner, id = %id, ?direction, count = raw.len(), "enriching referral rows");
    enrich_referrals(client, raw).await
}

/// The referral view: raw record first, then names once enrichment settles.
///
/// While `names_loading` is set, parties show their raw ID marked as
/// loading.
#[derive(Debug, Clone)]
pub struct ReferralView {
    pub screen: DetailScreen<EnrichedReferral>,
    pub names_loading: bool,
}

impl ReferralView {
    pub fn new(id: EntityId) -> Self {
        Self {
            screen: DetailScreen::new(Resource::PatientReferrals, id),
            names_loading: false,
        }
    }

    pub fn begin(&mut self) {
        self.screen.begin();
        self.names_loading = false;
    }

    /// Apply the raw referral. Returns the record to enrich, if any.
    pub fn finish_record(&mut self, result: ReferralResult<PatientReferral>) -> Option<PatientReferral> {
        let raw = result.as_ref().ok().cloned();
        self.screen.finish(result.map(EnrichedReferral::unresolved));
        self.names_loading = raw.is_some();
        raw
    }

    /// Apply the enriched referral.
    pub fn finish_names(&mut self, enriched: EnrichedReferral) {
        self.names_loading = false;
        self.screen.data = Some(enriched);
    }

    /// Fetch, then enrich, in one step. Also used for Retry.
    pub async fn load(&mut self, client: &ApiClient) {
        self.begin();
        let result = fetch_referral(client, self.screen.id).await;
        if let Some(raw) = self.finish_record(result) {
            let enriched = crate::enrich::enrich_referral(client, raw).await;
            self.finish_names(enriched);
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use serde_json::json;

    use referral_contracts::{
        endpoint::{Method, Resource},
        entity::{EntityId, Patient},
        referral::ReferralParty,
    };

    use super::*;
    use crate::{
        display::party_display,
        testing::{client, ScriptedTransport},
    };

    fn provider_script() -> ScriptedTransport {
        ScriptedTransport::new()
            .ok(Method::Get, "/providers/1", json!({ "id": 1, "name": "Acme Clinic" }))
            .ok(
                Method::Get,
                "/providers/1/practitioners",
                json!([{ "id": 10, "name": "Dr. Lee" }]),
            )
            .ok(
                Method::Get,
                "/providers/1/referrals_sent",
                json!([{ "id": 5, "patient": 4, "sendingProvider": 1, "receivingProvider": 2 }]),
            )
            .ok(Method::Get, "/patients/4", json!({ "name": "Jane Doe" }))
            .ok(Method::Get, "/providers/2", json!({ "name": "Mercy General" }))
    }

    // ── Provider view ────────────────────────────────────────────────────────

    #[tokio::test]
    async fn provider_detail_loads_related_and_swallows_failures() {
        // referrals_received is unscripted and fails.
        let transport = provider_script();
        let api = client(&transport);

        let detail = fetch_provider_detail(&api, EntityId(1)).await.unwrap();

        assert_eq!(detail.provider.name.as_deref(), Some("Acme Clinic"));
        assert_eq!(detail.practitioners.len(), 1);
        assert_eq!(detail.referrals_sent.len(), 1);
        assert_eq!(detail.referrals_sent[0].patient_name.as_deref(), Some("Jane Doe"));
        assert_eq!(
            detail.referrals_sent[0].sending_provider_name.as_deref(),
            Some("Acme Clinic")
        );
        assert!(detail.referrals_received.is_empty());
    }

    #[tokio::test]
    async fn primary_failure_is_page_fatal_and_skips_related() {
        let transport = ScriptedTransport::new().on(Method::Get, "/providers/1", 404, None);
        let api = client(&transport);
        let mut screen = DetailScreen::new(Resource::Providers, EntityId(1));

        screen.begin();
        let result = fetch_provider_detail(&api, EntityId(1)).await;
        screen.finish(result);

        assert_eq!(screen.error.as_deref(), Some("Failed to fetch provider"));
        assert!(screen.data.is_none());
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn retry_after_primary_failure_recovers() {
        let transport = ScriptedTransport::new().on(Method::Get, "/patients/3", 500, None);
        let api = client(&transport);
        let mut screen = DetailScreen::<Patient>::new(Resource::Patients, EntityId(3));

        screen.begin();
        screen.finish(fetch_patient(&api, EntityId(3)).await);
        assert!(screen.error.is_some());

        let _ = transport.ok(Method::Get, "/patients/3", json!({ "id": 3, "name": "Jane Doe" }));
        screen.begin();
        screen.finish(fetch_patient(&api, EntityId(3)).await);

        assert_eq!(screen.error, None);
        assert_eq!(
            screen.data.as_ref().and_then(|p| p.name.as_deref()),
            Some("Jane Doe")
        );
    }

    // ── Practitioner view ────────────────────────────────────────────────────

    #[tokio::test]
    async fn practitioner_detail_fetches_both_directions() {
        let transport = ScriptedTransport::new()
            .ok(Method::Get, "/practitioners/10", json!({ "id": 10, "name": "Dr. Lee" }))
            .ok(Method::Get, "/practitioners/10/referrals_sent", json!([]))
            .ok(
                Method::Get,
                "/practitioners/10/referrals_received",
                json!([{ "id": 6, "sendingPracticioner": 10 }]),
            );
        let api = client(&transport);

        let detail = fetch_practitioner_detail(&api, EntityId(10)).await.unwrap();

        assert!(detail.referrals_sent.is_empty());
        assert_eq!(detail.referrals_received.len(), 1);
        assert_eq!(
            detail.referrals_received[0].sending_practitioner_name.as_deref(),
            Some("Dr. Lee")
        );
    }

    // ── Referral view ────────────────────────────────────────────────────────

    #[tokio::test]
    async fn referral_view_shows_ids_until_names_arrive() {
        let transport = ScriptedTransport::new()
            .ok(Method::Get, "/patientreferrals/5", json!({ "id": 5, "patient": 4 }))
            .ok(Method::Get, "/patients/4", json!({ "name": "Jane Doe" }));
        let api = client(&transport);
        let mut view = ReferralView::new(EntityId(5));

        view.begin();
        let raw = view
            .finish_record(fetch_referral(&api, EntityId(5)).await)
            .unwrap();
        let shown = view.screen.data.as_ref().unwrap();
        assert_eq!(
            party_display(shown, ReferralParty::Patient, view.names_loading),
            "ID: 4 (loading...)"
        );

        view.finish_names(crate::enrich::enrich_referral(&api, raw).await);
        let shown = view.screen.data.as_ref().unwrap();
        assert_eq!(
            party_display(shown, ReferralParty::Patient, view.names_loading),
            "Jane Doe"
        );
    }

    #[tokio::test]
    async fn referral_view_failure_offers_retry() {
        let transport = ScriptedTransport::new().on(Method::Get, "/patientreferrals/5", 401, None);
        let api = client(&transport);
        let mut view = ReferralView::new(EntityId(5));

        view.load(&api).await;

        assert!(!view.names_loading);
        assert_eq!(
            view.screen.error.as_deref(),
            Some("Authentication failed. Please login again.")
        );
    }
}
