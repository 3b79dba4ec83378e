//! Referral enrichment.
//!
//! A referral carries up to five foreign keys. `resolve_labels` looks all of
//! them up concurrently and waits for every lookup to settle; a failed
//! lookup resolves to `None` instead of failing the batch. Every screen that
//! shows referral parties goes through `enrich_referral`.

use std::{fmt::Display, future::Future};

use futures::future::join_all;
use serde_json::Value;
use tracing::{debug, warn};

use referral_contracts::{
    endpoint::{Endpoint, Resource},
    entity::EntityId,
    error::ReferralResult,
    referral::{EnrichedReferral, PatientReferral, ReferralParty},
};

use crate::client::ApiClient;

/// Resolve a label for each key, concurrently.
///
/// Absent keys resolve to `None` without calling `lookup`. Errors from
/// `lookup` are logged and resolve to `None`. The output has one entry per
/// input key, in input order.
pub async fn resolve_labels<K, F, Fut>(keys: Vec<Option<K>>, lookup: F) -> Vec<Option<String>>
where
    K: Display,
    F: Fn(K) -> Fut,
    Fut: Future<Output = ReferralResult<Option<String>>>,
{
    let pending = keys.into_iter().map(|key| {
        let call = key.map(|k| {
            let shown = k.to_string();
            (shown, lookup(k))
        });
        async move {
            let (shown, fut) = call?;
            match fut.await {
                Ok(label) => label,
                Err(e) => {
                    warn!(key = %shown, error = %e, "label lookup failed");
                    None
                }
            }
        }
    });
    join_all(pending).await
}

/// GET `/{resource}/{id}` and return its non-empty `name`.
pub async fn lookup_name(
    client: &ApiClient,
    resource: Resource,
    id: EntityId,
) -> ReferralResult<Option<String>> {
    let failure = format!("Failed to fetch {}", resource.singular());
    let value = client
        .fetch_value(Endpoint::Item(resource, id), &failure)
        .await?;
    Ok(value
        .get("name")
        .and_then(Value::as_str)
        .filter(|name| !name.is_empty())
        .map(str::to_string))
}

/// Overlay the five party names onto a copy of `referral`.
pub async fn enrich_referral(client: &ApiClient, referral: PatientReferral) -> EnrichedReferral {
    let keys: Vec<Option<PartyKey>> = ReferralParty::ALL
        .iter()
        .map(|party| referral.party_id(*party).map(|id| (party.resource(), id)))
        .map(|key| key.map(|(resource, id)| PartyKey { resource, id }))
        .collect();

    let names = resolve_labels(keys, |key: PartyKey| lookup_name(client, key.resource, key.id)).await;

    let mut enriched = EnrichedReferral::unresolved(referral);
    for (party, name) in ReferralParty::ALL.iter().zip(names) {
        enriched.set_name(*party, name);
    }
    debug!(
        referral = ?enriched.referral.id,
        resolved = ReferralParty::ALL.iter().filter(|p| enriched.name(**p).is_some()).count(),
        "referral enriched"
    );
    enriched
}

/// Enrich a batch of referrals. Each referral's lookups run concurrently,
/// and so do the referrals themselves.
pub async fn enrich_referrals(
    client: &ApiClient,
    referrals: Vec<PatientReferral>,
) -> Vec<EnrichedReferral> {
    join_all(referrals.into_iter().map(|r| enrich_referral(client, r))).await
}

#[derive(Clone, Copy)]
struct PartyKey {
    resource: Resource,
    id: EntityId,
}

impl Display for PartyKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "/{}/{}", self.resource.segment(), self.id)
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
