//! Small formatting helpers shared by both front-ends.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use referral_contracts::referral::{EnrichedReferral, PatientReferral, ReferralParty};
use serde_json::{Map, Value};

pub const NOT_AVAILABLE: &str = "N/A";

/// Render an API date as e.g. `Mar 5, 2026`.
///
/// Accepts RFC 3339 timestamps, bare dates, and naive date-times. Anything
/// else is shown as it arrived. Absent or empty dates render as `N/A`.
pub fn format_date(raw: Option<&str>) -> String {
    let raw = match raw.map(str::trim) {
        Some(s) if !s.is_empty() => s,
        _ => return NOT_AVAILABLE.to_string(),
    };

    let date = DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.date_naive())
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y-%m-%d"))
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").map(|dt| dt.date()))
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f").map(|dt| dt.date()));

    match date {
        Ok(d) => d.format("%b %-d, %Y").to_string(),
        Err(_) => raw.to_string(),
    }
}

/// The value, or `N/A` when absent or empty.
pub fn or_na(value: Option<&str>) -> &str {
    value.filter(|v| !v.is_empty()).unwrap_or(NOT_AVAILABLE)
}

/// How a referral party is shown: its resolved name, else its raw ID
/// (marked while enrichment is still running), else `N/A`.
pub fn party_display(referral: &EnrichedReferral, party: ReferralParty, loading: bool) -> String {
    if let Some(name) = referral.name(party) {
        return name.to_string();
    }
    match referral.referral.party_id(party) {
        Some(id) if loading => format!("ID: {} (loading...)", id),
        Some(id) => format!("ID: {}", id),
        None => NOT_AVAILABLE.to_string(),
    }
}

/// A referral carrying none of the known fields, as its raw JSON.
pub fn raw_referral(referral: &PatientReferral) -> Option<String> {
    if referral.has_known_fields() {
        return None;
    }
    Some(Value::Object(referral.extra.clone()).to_string())
}

/// Fields the API sent that no record type declares, strings unquoted.
pub fn extra_pairs(extra: &Map<String, Value>) -> Vec<(String, String)> {
    extra
        .iter()
        .map(|(key, value)| {
            let shown = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (key.clone(), shown)
        })
        .collect()
}
