//! Patient referral records and their enriched form.
//!
//! A raw `PatientReferral` carries only numeric foreign keys. An
//! `EnrichedReferral` overlays the display names resolved for those keys.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{endpoint::Resource, entity::EntityId};

/// A referral of one patient from a sending provider to a receiving provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PatientReferral {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<EntityId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient: Option<EntityId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sending_provider: Option<EntityId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receiving_provider: Option<EntityId>,
    #[serde(alias = "sendingPracticioner", skip_serializing_if = "Option::is_none")]
    pub sending_practitioner: Option<EntityId>,
    #[serde(alias = "receivingPracticioner", skip_serializing_if = "Option::is_none")]
    pub receiving_practitioner: Option<EntityId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_sent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_received: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One of the five foreign keys a referral carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferralParty {
    Patient,
    SendingProvider,
    ReceivingProvider,
    SendingPractitioner,
    ReceivingPractitioner,
}

impl ReferralParty {
    /// All parties, in display order.
    pub const ALL: [ReferralParty; 5] = [
        ReferralParty::Patient,
        ReferralParty::SendingProvider,
        ReferralParty::ReceivingProvider,
        ReferralParty::SendingPractitioner,
        ReferralParty::ReceivingPractitioner,
    ];

    /// The resource a party's ID points into.
    pub fn resource(self) -> Resource {
        match self {
            ReferralParty::Patient => Resource::Patients,
            ReferralParty::SendingProvider | ReferralParty::ReceivingProvider => {
                Resource::Providers
            }
            ReferralParty::SendingPractitioner | ReferralParty::ReceivingPractitioner => {
                Resource::Practitioners
            }
        }
    }

    /// Field label, e.g. "Sending Provider".
    pub fn label(self) -> &'static str {
        match self {
            ReferralParty::Patient => "Patient",
            ReferralParty::SendingProvider => "Sending Provider",
            ReferralParty::ReceivingProvider => "Receiving Provider",
            ReferralParty::SendingPractitioner => "Sending Practitioner",
            ReferralParty::ReceivingPractitioner => "Receiving Practitioner",
        }
    }
}

impl PatientReferral {
    /// The foreign key stored for `party`, if any.
    pub fn party_id(&self, party: ReferralParty) -> Option<EntityId> {
        match party {
            ReferralParty::Patient => self.patient,
            ReferralParty::SendingProvider => self.sending_provider,
            ReferralParty::ReceivingProvider => self.receiving_provider,
            ReferralParty::SendingPractitioner => self.sending_practitioner,
            ReferralParty::ReceivingPractitioner => self.receiving_practitioner,
        }
    }

    /// Whether any field the front-ends know how to display is set.
    pub fn has_known_fields(&self) -> bool {
        ReferralParty::ALL.iter().any(|p| self.party_id(*p).is_some())
            || self.id.is_some()
            || [
                &self.reason,
                &self.notes,
                &self.priority,
                &self.status,
                &self.date_sent,
                &self.date_received,
            ]
            .iter()
            .any(|v| v.is_some())
    }
}

/// A referral with display names overlaid on its foreign keys.
///
/// Serializes as the original record plus `patientName`,
/// `sendingProviderName`, ... for every name that resolved.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedReferral {
    #[serde(flatten)]
    pub referral: PatientReferral,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sending_provider_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receiving_provider_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sending_practitioner_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receiving_practitioner_name: Option<String>,
}

impl EnrichedReferral {
    /// Wrap a raw referral with no names resolved yet.
    pub fn unresolved(referral: PatientReferral) -> Self {
        Self {
            referral,
            ..Self::default()
        }
    }

    /// The resolved name for `party`, if any.
    pub fn name(&self, party: ReferralParty) -> Option<&str> {
        match party {
            ReferralParty::Patient => self.patient_name.as_deref(),
            ReferralParty::SendingProvider => self.sending_provider_name.as_deref(),
            ReferralParty::ReceivingProvider => self.receiving_provider_name.as_deref(),
            ReferralParty::SendingPractitioner => self.sending_practitioner_name.as_deref(),
            ReferralParty::ReceivingPractitioner => self.receiving_practitioner_name.as_deref(),
        }
    }

    /// Overlay a resolved name for `party`.
    pub fn set_name(&mut self, party: ReferralParty, name: Option<String>) {
        let slot = match party {
            ReferralParty::Patient => &mut self.patient_name,
            ReferralParty::SendingProvider => &mut self.sending_provider_name,
            ReferralParty::ReceivingProvider => &mut self.receiving_provider_name,
            ReferralParty::SendingPractitioner => &mut self.sending_practitioner_name,
            ReferralParty::ReceivingPractitioner => &mut self.receiving_practitioner_name,
        };
        *slot = name;
    }
}
