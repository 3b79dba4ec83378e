//! Plain-text rendering for terminal output.

use referral_contracts::{
    entity::{Patient, Practitioner, Provider},
    referral::{EnrichedReferral, ReferralParty},
};
use referral_core::display::{extra_pairs, format_date, or_na, party_display, raw_referral};
use serde_json::{Map, Value};

/// Print rows under a header, each column padded to its widest cell.
///
/// A row with a single cell spans the table and does not affect widths.
pub fn print_table(headers: &[&str], rows: &[Vec<String>]) {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows.iter().filter(|r| r.len() > 1) {
        for (i, cell) in row.iter().enumerate() {
            if let Some(w) = widths.get_mut(i) {
                *w = (*w).max(cell.chars().count());
            }
        }
    }

    let line = |cells: Vec<String>| {
        cells
            .iter()
            .zip(&widths)
            .map(|(c, w)| format!("{:<width$}", c, width = *w))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    println!("{}", line(headers.iter().map(|h| h.to_string()).collect()));
    println!(
        "{}",
        widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>().join("  ")
    );
    for row in rows {
        match row.as_slice() {
            [spanning] => println!("{}", spanning),
            _ => println!("{}", line(row.clone())),
        }
    }
}

/// Print `label: value` pairs aligned on the colon.
pub fn print_fields(fields: &[(&str, String)]) {
    let width = fields.iter().map(|(l, _)| l.len()).max().unwrap_or(0);
    for (label, value) in fields {
        println!("{:>width$}: {}", label, value, width = width);
    }
}

pub fn section(title: &str) {
    println!();
    println!("{}", title);
    println!("{}", "=".repeat(title.chars().count()));
}

fn id_cell<T: std::fmt::Display>(id: Option<T>) -> String {
    id.map(|id| id.to_string()).unwrap_or_else(|| "-".to_string())
}

fn cell(value: &Option<String>) -> String {
    or_na(value.as_deref()).to_string()
}

// ── Collections ──────────────────────────────────────────────────────────────

pub fn providers_table(items: &[Provider]) {
    let rows: Vec<Vec<String>> = items
        .iter()
        .map(|p| {
            vec![
                id_cell(p.id),
                cell(&p.name),
                cell(&p.city),
                cell(&p.state),
                cell(&p.phone),
                cell(&p.email),
            ]
        })
        .collect();
    print_table(&["ID", "Name", "City", "State", "Phone", "Email"], &rows);
}

pub fn practitioners_table(items: &[Practitioner]) {
    let rows: Vec<Vec<String>> = items
        .iter()
        .map(|p| {
            vec![
                id_cell(p.id),
                cell(&p.name),
                cell(&p.job_title),
                cell(&p.specialty),
                cell(&p.email),
                cell(&p.phone),
            ]
        })
        .collect();
    print_table(&["ID", "Name", "Job Title", "Specialty", "Email", "Phone"], &rows);
}

pub fn patients_table(items: &[Patient]) {
    let rows: Vec<Vec<String>> = items
        .iter()
        .map(|p| vec![id_cell(p.id), cell(&p.name), cell(&p.email), cell(&p.phone)])
        .collect();
    print_table(&["ID", "Name", "Email", "Phone"], &rows);
}

/// Referral rows as seen from one side: `counterpart` is the column that
/// names the other provider.
pub fn referrals_table(items: &[EnrichedReferral], counterpart: ReferralParty) {
    if items.is_empty() {
        println!("No patient referrals found.");
        return;
    }
    let rows: Vec<Vec<String>> = items.iter().map(|r| referral_row(r, counterpart)).collect();
    print_table(
        &["ID", "Patient", counterpart.label(), "Date Sent", "Status"],
        &rows,
    );
}

/// One referral row, or the raw record when it has nothing to tabulate.
fn referral_row(r: &EnrichedReferral, counterpart: ReferralParty) -> Vec<String> {
    if let Some(raw) = raw_referral(&r.referral) {
        return vec![raw];
    }
    vec![
        id_cell(r.referral.id),
        party_display(r, ReferralParty::Patient, false),
        party_display(r, counterpart, false),
        format_date(r.referral.date_sent.as_deref()),
        cell(&r.referral.status),
    ]
}

// ── Single records ───────────────────────────────────────────────────────────

pub fn provider_fields(p: &Provider) {
    print_fields(&[
        ("ID", id_cell(p.id)),
        ("Name", cell(&p.name)),
        ("Address", cell(&p.address_line1)),
        ("Address 2", cell(&p.address_line2)),
        ("City", cell(&p.city)),
        ("State", cell(&p.state)),
        ("ZIP", cell(&p.zip)),
        ("Email", cell(&p.email)),
        ("Phone", cell(&p.phone)),
        ("Created", format_date(p.created_at.as_deref())),
    ]);
    extra_fields(&p.extra);
}

pub fn practitioner_fields(p: &Practitioner) {
    print_fields(&[
        ("ID", id_cell(p.id)),
        ("Name", cell(&p.name)),
        ("Job Title", cell(&p.job_title)),
        ("License Number", cell(&p.license_number)),
        ("Specialty", cell(&p.specialty)),
        ("Email", cell(&p.email)),
        ("Phone", cell(&p.phone)),
    ]);
    extra_fields(&p.extra);
}

pub fn patient_fields(p: &Patient) {
    let data = p
        .data
        .as_ref()
        .map(|d| serde_json::to_string_pretty(d).unwrap_or_else(|_| d.to_string()))
        .unwrap_or_else(|| "N/A".to_string());
    print_fields(&[
        ("ID", id_cell(p.id)),
        ("Name", cell(&p.name)),
        ("Email", cell(&p.email)),
        ("Phone", cell(&p.phone)),
        ("Data", data),
    ]);
    extra_fields(&p.extra);
}

pub fn referral_fields(r: &EnrichedReferral, names_loading: bool) {
    if let Some(raw) = raw_referral(&r.referral) {
        print_fields(&[("Record", raw)]);
        return;
    }
    let mut fields: Vec<(&str, String)> = vec![("ID", id_cell(r.referral.id))];
    for party in ReferralParty::ALL {
        fields.push((party.label(), party_display(r, party, names_loading)));
    }
    fields.extend([
        ("Reason", cell(&r.referral.reason)),
        ("Notes", cell(&r.referral.notes)),
        ("Priority", cell(&r.referral.priority)),
        ("Status", cell(&r.referral.status)),
        ("Date Sent", format_date(r.referral.date_sent.as_deref())),
        ("Date Received", format_date(r.referral.date_received.as_deref())),
    ]);
    print_fields(&fields);
    extra_fields(&r.referral.extra);
}

/// Unknown fields the API sent, shown raw.
fn extra_fields(extra: &Map<String, Value>) {
    if extra.is_empty() {
        return;
    }
    let pairs = extra_pairs(extra);
    let rows: Vec<(&str, String)> = pairs.iter().map(|(k, v)| (k.as_str(), v.clone())).collect();
    print_fields(&rows);
}

#[cfg(test)]
mod tests {
    use referral_contracts::{
        entity::EntityId,
        referral::{EnrichedReferral, PatientReferral, ReferralParty},
    };
    use serde_json::json;

    use super::referral_row;

    // ── Referral rows ────────────────────────────────────────────────────────

    #[test]
    fn referral_with_only_unknown_keys_is_shown_raw() {
        let raw: PatientReferral =
            serde_json::from_value(json!({ "ref_code": "X-17", "urgent": true })).unwrap();
        let row = referral_row(&EnrichedReferral::unresolved(raw), ReferralParty::ReceivingProvider);

        assert_eq!(row.len(), 1);
        let shown: serde_json::Value = serde_json::from_str(&row[0]).unwrap();
        assert_eq!(shown, json!({ "ref_code": "X-17", "urgent": true }));
    }

    #[test]
    fn known_referral_fills_every_column() {
        let referral = PatientReferral {
            id: Some(EntityId(3)),
            patient: Some(EntityId(4)),
            status: Some("pending".to_string()),
            ..PatientReferral::default()
        };
        let row = referral_row(
            &EnrichedReferral::unresolved(referral),
            ReferralParty::ReceivingProvider,
        );
        assert_eq!(row, vec!["3", "ID: 4", "N/A", "N/A", "pending"]);
    }
}
