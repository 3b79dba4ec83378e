//! # referral-contracts
//!
//! Shared types for the referral desk client.
//!
//! All crates in the workspace import from here. No business logic lives in
//! this crate, only record definitions, the endpoint table, and error types.

pub mod endpoint;
pub mod entity;
pub mod error;
pub mod referral;
pub mod transport;

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use endpoint::{Direction, Endpoint, Resource};
    use entity::{EntityId, Patient, Practitioner, Provider};
    use error::ReferralError;
    use referral::{EnrichedReferral, PatientReferral, ReferralParty};
    use transport::ApiResponse;

    // ── Endpoint paths ───────────────────────────────────────────────────────

    #[test]
    fn collection_and_item_paths() {
        assert_eq!(Endpoint::Collection(Resource::Providers).path(), "/providers");
        assert_eq!(
            Endpoint::Item(Resource::Practitioners, EntityId(7)).path(),
            "/practitioners/7"
        );
        assert_eq!(
            Endpoint::Item(Resource::PatientReferrals, EntityId(3)).path(),
            "/patientreferrals/3"
        );
    }

    #[test]
    fn provider_sub_resource_paths() {
        let id = EntityId(12);
        assert_eq!(
            Endpoint::ProviderPractitioners(id).path(),
            "/providers/12/practitioners"
        );
        assert_eq!(
            Endpoint::AddPractitioner(id).path(),
            "/providers/12/add_practitioner"
        );
        assert_eq!(
            Endpoint::RemovePractitioner(id).path(),
            "/providers/12/remove_practitioner"
        );
        assert_eq!(Endpoint::SendReferral(id).path(), "/providers/12/send_referral");
    }

    #[test]
    fn referral_listing_paths() {
        let sent = Endpoint::Referrals {
            owner: Resource::Providers,
            id: EntityId(1),
            direction: Direction::Sent,
        };
        let received = Endpoint::Referrals {
            owner: Resource::Practitioners,
            id: EntityId(2),
            direction: Direction::Received,
        };
        assert_eq!(sent.path(), "/providers/1/referrals_sent");
        assert_eq!(received.path(), "/practitioners/2/referrals_received");
    }

    // ── Record decoding ──────────────────────────────────────────────────────

    #[test]
    fn entity_id_accepts_number_or_numeric_string() {
        let a: EntityId = serde_json::from_value(json!(5)).unwrap();
        let b: EntityId = serde_json::from_value(json!("5")).unwrap();
        assert_eq!(a, b);
        assert!(serde_json::from_value::<EntityId>(json!("five")).is_err());
    }

    #[test]
    fn provider_accepts_both_address_spellings_and_numeric_zip() {
        let snake: Provider = serde_json::from_value(json!({
            "id": 1,
            "name": "Acme Clinic",
            "address_line1": "1 Main St",
            "zip": 80202
        }))
        .unwrap();
        let camel: Provider = serde_json::from_value(json!({
            "addressLine1": "1 Main St",
            "zip": "80202"
        }))
        .unwrap();

        assert_eq!(snake.address_line1.as_deref(), Some("1 Main St"));
        assert_eq!(camel.address_line1.as_deref(), Some("1 Main St"));
        assert_eq!(snake.zip.as_deref(), Some("80202"));
        assert_eq!(camel.zip.as_deref(), Some("80202"));
    }

    #[test]
    fn unknown_fields_are_kept() {
        let p: Practitioner = serde_json::from_value(json!({
            "name": "Dr. Lee",
            "npi": "1234567890"
        }))
        .unwrap();
        assert_eq!(p.extra.get("npi"), Some(&json!("1234567890")));
    }

    #[test]
    fn patient_data_blob_is_opaque() {
        let p: Patient = serde_json::from_value(json!({
            "name": "Jane Doe",
            "data": { "allergies": ["penicillin"] }
        }))
        .unwrap();
        assert_eq!(p.data, Some(json!({ "allergies": ["penicillin"] })));
    }

    #[test]
    fn referral_accepts_legacy_practitioner_spelling() {
        let r: PatientReferral = serde_json::from_value(json!({
            "id": 9,
            "patient": 4,
            "sendingProvider": 1,
            "receivingProvider": 2,
            "sendingPracticioner": 10,
            "receivingPractitioner": 11,
            "dateSent": "2026-03-05"
        }))
        .unwrap();

        assert_eq!(r.party_id(ReferralParty::SendingPractitioner), Some(EntityId(10)));
        assert_eq!(r.party_id(ReferralParty::ReceivingPractitioner), Some(EntityId(11)));
        assert_eq!(r.date_sent.as_deref(), Some("2026-03-05"));
    }

    #[test]
    fn referral_with_only_unknown_keys_has_no_known_fields() {
        let unknown: PatientReferral =
            serde_json::from_value(json!({ "ref_code": "X-17", "urgent": true })).unwrap();
        assert!(!unknown.has_known_fields());
        assert_eq!(unknown.extra.len(), 2);

        let known: PatientReferral =
            serde_json::from_value(json!({ "status": "pending", "ref_code": "X-17" })).unwrap();
        assert!(known.has_known_fields());
    }

    // ── EnrichedReferral ─────────────────────────────────────────────────────

    #[test]
    fn enriched_referral_serializes_as_overlay() {
        let referral = PatientReferral {
            id: Some(EntityId(9)),
            patient: Some(EntityId(4)),
            ..PatientReferral::default()
        };
        let mut enriched = EnrichedReferral::unresolved(referral);
        enriched.set_name(ReferralParty::Patient, Some("Jane Doe".to_string()));

        let value = serde_json::to_value(&enriched).unwrap();
        assert_eq!(value["id"], json!(9));
        assert_eq!(value["patient"], json!(4));
        assert_eq!(value["patientName"], json!("Jane Doe"));
        assert!(value.get("sendingProviderName").is_none());
    }

    // ── ApiResponse ──────────────────────────────────────────────────────────

    #[test]
    fn server_message_prefers_message_then_detail() {
        let with_message = ApiResponse::new(400, Some(json!({ "message": "bad zip" })));
        let with_detail = ApiResponse::new(403, Some(json!({ "detail": "forbidden" })));
        let empty = ApiResponse::new(500, None);

        assert_eq!(with_message.server_message(), Some("bad zip"));
        assert_eq!(with_detail.server_message(), Some("forbidden"));
        assert_eq!(empty.server_message(), None);
        assert!(!empty.is_success());
        assert!(ApiResponse::new(204, None).is_success());
    }

    // ── ReferralError display messages ───────────────────────────────────────

    #[test]
    fn error_authentication_failed_display() {
        assert_eq!(
            ReferralError::AuthenticationFailed.to_string(),
            "Authentication failed. Please login again."
        );
    }

    #[test]
    fn error_http_displays_server_message() {
        let err = ReferralError::Http {
            status: 400,
            message: "zip must be numeric".to_string(),
        };
        assert_eq!(err.to_string(), "zip must be numeric");
    }

    #[test]
    fn user_message_reduces_transport_failures_to_fallback() {
        let network = ReferralError::Network {
            reason: "connection refused".to_string(),
        };
        let decode = ReferralError::Decode {
            reason: "expected value".to_string(),
        };
        let fallback = "An error occurred while fetching providers";

        assert_eq!(network.user_message(fallback), fallback);
        assert_eq!(decode.user_message(fallback), fallback);
        assert_eq!(
            ReferralError::MissingToken.user_message(fallback),
            "No authentication token found"
        );
    }
}
