//! Rendering.
//!
//! Layout:
//!   ┌─── navigation ──────────────────────────────────────────────────────┐
//!   │  Referral Desk   [1] Providers  [2] Practitioners  [3] Patients  [L] │
//!   ├─── screen ──────────────────────────────────────────────────────────┤
//!   │  list / record / form for the current route                         │
//!   ├─────────────────────────────────────────────────────────────────────┤
//!   │  footer (key bindings)                                              │
//!   └─────────────────────────────────────────────────────────────────────┘

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, TableState, Wrap},
    Frame,
};

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use referral_contracts::{
    entity::{EntityId, Patient, Practitioner, Provider, Record},
    referral::{EnrichedReferral, ReferralParty},
};
use referral_core::{
    display::{extra_pairs, format_date, or_na, party_display, raw_referral},
    screens::detail::{PractitionerDetail, ProviderDetail},
    NavSection, SessionState,
};

use crate::app::{
    App, DetailView, FormView, ListView, LoginView, PickerView, ReferralField, ReferralFormView,
    Screen, LOGIN_FIELDS,
};

const ACCENT: Color = Color::Cyan;
const MUTED: Color = Color::DarkGray;

pub fn draw(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // navigation
            Constraint::Min(8),    // screen
            Constraint::Length(3), // footer
        ])
        .split(f.area());

    render_nav(f, chunks[0], app);
    render_screen(f, chunks[1], app);
    render_footer(f, chunks[2], app);

    if let Some(confirmation) = &app.confirm {
        render_confirm(f, &confirmation.prompt);
    }
}

// ── Navigation bar ────────────────────────────────────────────────────────────

fn render_nav(f: &mut Frame, area: Rect, app: &App) {
    let title = Style::default().fg(ACCENT).add_modifier(Modifier::BOLD);
    let mut spans = vec![Span::styled("Referral Desk    ", title)];

    if app.session_state() == SessionState::Authenticated {
        let active = app.route.section();
        for (i, section) in NavSection::ALL.iter().enumerate() {
            let style = if active == Some(*section) {
                Style::default()
                    .fg(Color::Black)
                    .bg(ACCENT)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::White)
            };
            spans.push(Span::styled(format!("[{}] {}", i + 1, section.label()), style));
            spans.push(Span::raw("  "));
        }
        spans.push(Span::styled("[L] Logout", Style::default().fg(Color::White)));
    }

    let nav = Paragraph::new(Line::from(spans)).block(bordered());
    f.render_widget(nav, area);
}

// ── Screens ───────────────────────────────────────────────────────────────────

fn render_screen(f: &mut Frame, area: Rect, app: &App) {
    let area = match &app.banner {
        Some(message) => {
            let parts = split_top(area, 1);
            f.render_widget(error_line(message), parts[0]);
            parts[1]
        }
        None => area,
    };

    match &app.screen {
        Screen::Login(view) => render_login(f, area, view),
        Screen::Providers(list) => render_list(
            f,
            area,
            list,
            &["ID", "Name", "City", "State", "Phone"],
            |p: &Provider| {
                vec![id_text(p.id), text(&p.name), text(&p.city), text(&p.state), text(&p.phone)]
            },
        ),
        Screen::Practitioners(list) => render_list(
            f,
            area,
            list,
            &["ID", "Name", "Job Title", "Specialty", "Email"],
            |p: &Practitioner| {
                vec![
                    id_text(p.id),
                    text(&p.name),
                    text(&p.job_title),
                    text(&p.specialty),
                    text(&p.email),
                ]
            },
        ),
        Screen::Patients(list) => render_list(
            f,
            area,
            list,
            &["ID", "Name", "Email", "Phone"],
            |p: &Patient| vec![id_text(p.id), text(&p.name), text(&p.email), text(&p.phone)],
        ),
        Screen::Provider(view) => render_provider(f, area, view),
        Screen::Practitioner(view) => render_practitioner(f, area, view),
        Screen::Patient(view) => render_patient(f, area, view),
        Screen::Referral(view) => {
            let screen = &view.screen;
            let title = format!(" Patient Referral #{} ", screen.id);
            if let Some(body) = status_body(screen.loading, screen.error.as_deref(), "referral") {
                f.render_widget(body.block(titled(&title)), area);
                return;
            }
            if let Some(referral) = &screen.data {
                let lines = referral_lines(referral, view.names_loading);
                f.render_widget(
                    Paragraph::new(lines).wrap(Wrap { trim: false }).block(titled(&title)),
                    area,
                );
            }
        }
        Screen::Form(view) => render_form(f, area, view),
        Screen::ReferralForm(view) => render_referral_form(f, area, view),
        Screen::AddPractitioner(view) => render_picker(f, area, view),
    }
}

fn render_login(f: &mut Frame, area: Rect, view: &LoginView) {
    let mut lines = vec![
        Line::from("Sign in with a username and password, or paste a bearer token."),
        Line::from(""),
    ];
    for (i, label) in LOGIN_FIELDS.iter().enumerate() {
        let raw = view.value(i);
        let shown = if i == 1 {
            "*".repeat(raw.chars().count())
        } else {
            raw.to_string()
        };
        lines.push(input_line(label, &shown, view.focus == i));
    }
    lines.push(Line::from(""));
    if view.submitting {
        lines.push(muted_line("Signing in..."));
    }
    if let Some(error) = &view.error {
        lines.push(error_line_text(error));
    }
    f.render_widget(Paragraph::new(lines).block(titled(" Login ")), area);
}

fn render_list<T, F>(f: &mut Frame, area: Rect, list: &ListView<T>, headers: &[&str], row: F)
where
    T: DeserializeOwned + Record,
    F: Fn(&T) -> Vec<String>,
{
    let resource = list.screen.resource();
    let title = format!(" {} ", capitalize(resource.segment()));

    let status = status_body(
        list.screen.loading,
        list.screen.error.as_deref(),
        resource.segment(),
    );
    if let Some(body) = status {
        f.render_widget(body.block(titled(&title)), area);
        return;
    }

    let area = match &list.screen.delete_error {
        Some(message) => {
            let parts = split_top(area, 1);
            f.render_widget(error_line(message), parts[0]);
            parts[1]
        }
        None => area,
    };

    if list.screen.items.is_empty() {
        let empty = Paragraph::new(format!("No {} found.", resource.segment()));
        f.render_widget(empty.block(titled(&title)), area);
        return;
    }

    let rows: Vec<Vec<String>> = list.screen.items.iter().map(row).collect();
    render_table(f, area, &title, headers, rows, Some(list.cursor));
}

fn render_provider(f: &mut Frame, area: Rect, view: &DetailView<ProviderDetail>) {
    let screen = &view.screen;
    let title = format!(" Provider #{} ", screen.id);
    if let Some(body) = status_body(screen.loading, screen.error.as_deref(), "provider") {
        f.render_widget(body.block(titled(&title)), area);
        return;
    }
    let Some(detail) = &screen.data else {
        return;
    };

    let fields = provider_fields(&detail.provider);
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(fields.len() as u16 + 2),
            Constraint::Percentage(34),
            Constraint::Percentage(33),
            Constraint::Percentage(33),
        ])
        .split(area);

    f.render_widget(Paragraph::new(field_lines(&fields)).block(titled(&title)), chunks[0]);

    let practitioners: Vec<Vec<String>> = detail
        .practitioners
        .iter()
        .map(|p| vec![id_text(p.id), text(&p.name), text(&p.job_title), text(&p.specialty)])
        .collect();
    if practitioners.is_empty() {
        let empty = Paragraph::new("No practitioners associated with this provider.");
        f.render_widget(empty.block(pane_block(" Practitioners ", view.pane == 0)), chunks[1]);
    } else {
        render_pane(
            f,
            chunks[1],
            " Practitioners ",
            &["ID", "Name", "Job Title", "Specialty"],
            practitioners,
            view,
            0,
        );
    }
    render_referral_pane(
        f,
        chunks[2],
        " Referrals Sent ",
        &detail.referrals_sent,
        ReferralParty::ReceivingProvider,
        view,
        1,
    );
    render_referral_pane(
        f,
        chunks[3],
        " Referrals Received ",
        &detail.referrals_received,
        ReferralParty::SendingProvider,
        view,
        2,
    );
}

fn provider_fields(p: &Provider) -> Vec<(String, String)> {
    with_extra(
        vec![
            ("Name", text(&p.name)),
            ("Address", text(&p.address_line1)),
            ("Address 2", text(&p.address_line2)),
            ("City", text(&p.city)),
            ("State", text(&p.state)),
            ("ZIP", text(&p.zip)),
            ("Email", text(&p.email)),
            ("Phone", text(&p.phone)),
            ("Created", format_date(p.created_at.as_deref())),
        ],
        &p.extra,
    )
}

fn render_practitioner(f: &mut Frame, area: Rect, view: &DetailView<PractitionerDetail>) {
    let screen = &view.screen;
    let title = format!(" Practitioner #{} ", screen.id);
    if let Some(body) = status_body(screen.loading, screen.error.as_deref(), "practitioner") {
        f.render_widget(body.block(titled(&title)), area);
        return;
    }
    let Some(detail) = &screen.data else {
        return;
    };

    let p = &detail.practitioner;
    let fields = with_extra(
        vec![
            ("Name", text(&p.name)),
            ("Job Title", text(&p.job_title)),
            ("License Number", text(&p.license_number)),
            ("Specialty", text(&p.specialty)),
            ("Email", text(&p.email)),
            ("Phone", text(&p.phone)),
        ],
        &p.extra,
    );
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(fields.len() as u16 + 2),
            Constraint::Percentage(50),
            Constraint::Percentage(50),
        ])
        .split(area);

    f.render_widget(Paragraph::new(field_lines(&fields)).block(titled(&title)), chunks[0]);
    render_referral_pane(
        f,
        chunks[1],
        " Referrals Sent ",
        &detail.referrals_sent,
        ReferralParty::ReceivingProvider,
        view,
        0,
    );
    render_referral_pane(
        f,
        chunks[2],
        " Referrals Received ",
        &detail.referrals_received,
        ReferralParty::SendingProvider,
        view,
        1,
    );
}

fn render_patient(f: &mut Frame, area: Rect, view: &DetailView<Patient>) {
    let screen = &view.screen;
    let title = format!(" Patient #{} ", screen.id);
    if let Some(body) = status_body(screen.loading, screen.error.as_deref(), "patient") {
        f.render_widget(body.block(titled(&title)), area);
        return;
    }
    let Some(p) = &screen.data else {
        return;
    };

    let mut lines = field_lines(&with_extra(
        vec![
            ("Name", text(&p.name)),
            ("Email", text(&p.email)),
            ("Phone", text(&p.phone)),
        ],
        &p.extra,
    ));
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled("Data", Style::default().fg(ACCENT))));
    match &p.data {
        Some(data) => {
            let pretty = serde_json::to_string_pretty(data).unwrap_or_else(|_| data.to_string());
            lines.extend(pretty.lines().map(|l| Line::from(l.to_string())));
        }
        None => lines.push(Line::from(or_na(None).to_string())),
    }
    f.render_widget(
        Paragraph::new(lines).wrap(Wrap { trim: false }).block(titled(&title)),
        area,
    );
}

fn render_form(f: &mut Frame, area: Rect, view: &FormView) {
    let form = &view.form;
    let title = format!(" {} ", form.title());
    if form.loading {
        f.render_widget(Paragraph::new("Loading...").block(titled(&title)), area);
        return;
    }

    let mut lines: Vec<Line> = form
        .fields
        .iter()
        .enumerate()
        .map(|(i, spec)| {
            let label = if spec.required {
                format!("{} *", spec.label)
            } else {
                spec.label.to_string()
            };
            input_line(&label, form.values.get(spec.key), view.focus == i)
        })
        .collect();
    lines.push(Line::from(""));
    lines.extend(form_status(form.submitting, form.error.as_deref(), form.success.as_deref()));

    f.render_widget(Paragraph::new(lines).block(titled(&title)), area);
}

fn render_referral_form(f: &mut Frame, area: Rect, view: &ReferralFormView) {
    let form = &view.form;
    let title = format!(" {} ", form.title());
    if form.loading {
        f.render_widget(Paragraph::new("Loading...").block(titled(&title)), area);
        return;
    }

    let mut lines: Vec<Line> = Vec::new();
    for (i, field) in ReferralField::ALL.iter().enumerate() {
        let focused = view.focus == i;
        if !field.is_picker() {
            lines.push(input_line(field.label(), form.values.get(field.key()), focused));
            continue;
        }
        let selected = form.selected(field.key());
        let name = match field {
            ReferralField::Patient => name_in(&form.patients, selected),
            ReferralField::SendingProvider | ReferralField::ReceivingProvider => {
                name_in(&form.providers, selected)
            }
            ReferralField::SendingPractitioner => name_in(&form.sending_practitioners, selected),
            _ => name_in(&form.receiving_practitioners, selected),
        };
        let shown = if *field == ReferralField::SendingProvider && view.sender_locked() {
            name
        } else {
            format!("< {} >", name)
        };
        lines.push(input_line(field.label(), &shown, focused));
    }
    lines.push(Line::from(""));
    lines.extend(form_status(form.submitting, form.error.as_deref(), form.success.as_deref()));

    f.render_widget(Paragraph::new(lines).block(titled(&title)), area);
}

fn render_picker(f: &mut Frame, area: Rect, view: &PickerView) {
    let form = &view.form;
    let title = format!(" Add Practitioner to Provider #{} ", form.provider);
    if form.loading {
        f.render_widget(Paragraph::new("Loading practitioners...").block(titled(&title)), area);
        return;
    }

    let status = form_status(form.submitting, form.error.as_deref(), form.success.as_deref());
    let parts = split_top(area, status.len() as u16);
    f.render_widget(Paragraph::new(status), parts[0]);

    let rows: Vec<Vec<String>> = form
        .practitioners
        .iter()
        .map(|p| vec![id_text(p.id), text(&p.name), text(&p.specialty)])
        .collect();
    render_table(f, parts[1], &title, &["ID", "Name", "Specialty"], rows, Some(view.cursor));
}

// ── Footer and dialog ─────────────────────────────────────────────────────────

fn render_footer(f: &mut Frame, area: Rect, app: &App) {
    let keys: &[(&str, &str)] = match &app.screen {
        Screen::Login(_) => &[("Tab", "Next field"), ("Enter", "Sign in"), ("Ctrl-C", "Quit")],
        Screen::Providers(_) | Screen::Practitioners(_) | Screen::Patients(_) => &[
            ("↑↓", "Select"),
            ("Enter", "View"),
            ("n", "New"),
            ("e", "Edit"),
            ("d", "Delete"),
            ("r", "Retry"),
            ("q", "Quit"),
        ],
        Screen::Provider(_) => &[
            ("Tab", "Pane"),
            ("Enter", "Open"),
            ("e", "Edit"),
            ("a", "Add practitioner"),
            ("x", "Remove practitioner"),
            ("s", "Send referral"),
            ("Esc", "Back"),
        ],
        Screen::Practitioner(_) => &[("Tab", "Pane"), ("Enter", "Open"), ("e", "Edit"), ("Esc", "Back")],
        Screen::Patient(_) => &[("e", "Edit"), ("r", "Retry"), ("Esc", "Back")],
        Screen::Referral(_) => &[("e", "Edit"), ("d", "Delete"), ("r", "Retry"), ("Esc", "Back")],
        Screen::Form(_) => &[("Tab", "Next field"), ("Ctrl-S", "Save"), ("Esc", "Cancel")],
        Screen::ReferralForm(_) => &[
            ("Tab", "Next field"),
            ("←→", "Choose"),
            ("Ctrl-S", "Save"),
            ("Esc", "Cancel"),
        ],
        Screen::AddPractitioner(_) => &[("↑↓", "Select"), ("Enter", "Add"), ("Esc", "Cancel")],
    };

    let mut spans: Vec<Span> = Vec::new();
    for (key, label) in keys {
        spans.push(Span::styled(format!(" [{}] ", key), Style::default().fg(ACCENT)));
        spans.push(Span::raw(*label));
    }
    if app.redirect_pending() {
        spans.push(Span::styled("   redirecting...", Style::default().fg(MUTED)));
    }

    let footer = Paragraph::new(Line::from(spans)).block(bordered());
    f.render_widget(footer, area);
}

fn render_confirm(f: &mut Frame, prompt: &str) {
    let area = centered(f.area(), 60, 7);
    let lines = vec![
        Line::from(prompt.to_string()),
        Line::from(""),
        Line::from(vec![
            Span::styled("[y] ", Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)),
            Span::raw("Yes   "),
            Span::styled("[n] ", Style::default().fg(ACCENT)),
            Span::raw("No"),
        ]),
    ];
    let dialog = Paragraph::new(lines)
        .wrap(Wrap { trim: true })
        .block(
            Block::default()
                .title(" Confirm ")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Red)),
        );
    f.render_widget(Clear, area);
    f.render_widget(dialog, area);
}

// ── Widgets ───────────────────────────────────────────────────────────────────

fn render_table(
    f: &mut Frame,
    area: Rect,
    title: &str,
    headers: &[&str],
    rows: Vec<Vec<String>>,
    selected: Option<usize>,
) {
    let widths: Vec<Constraint> = headers
        .iter()
        .enumerate()
        .map(|(i, _)| if i == 0 { Constraint::Length(6) } else { Constraint::Fill(1) })
        .collect();
    let header = Row::new(headers.iter().map(|h| Cell::from(*h)))
        .style(Style::default().fg(ACCENT).add_modifier(Modifier::BOLD));
    let rows = rows.into_iter().map(|cells| Row::new(cells.into_iter().map(Cell::from)));

    let table = Table::new(rows, widths)
        .header(header)
        .block(titled(title))
        .row_highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD));
    let mut state = TableState::default().with_selected(selected);
    f.render_stateful_widget(table, area, &mut state);
}

fn render_pane<T>(
    f: &mut Frame,
    area: Rect,
    title: &str,
    headers: &[&str],
    rows: Vec<Vec<String>>,
    view: &DetailView<T>,
    pane: usize,
) {
    let active = view.pane == pane;
    let widths: Vec<Constraint> = headers
        .iter()
        .enumerate()
        .map(|(i, _)| if i == 0 { Constraint::Length(6) } else { Constraint::Fill(1) })
        .collect();
    let header = Row::new(headers.iter().map(|h| Cell::from(*h)))
        .style(Style::default().fg(ACCENT).add_modifier(Modifier::BOLD));
    let rows = rows.into_iter().map(|cells| Row::new(cells.into_iter().map(Cell::from)));

    let table = Table::new(rows, widths)
        .header(header)
        .block(pane_block(title, active))
        .row_highlight_style(Style::default().bg(Color::DarkGray));
    let mut state = TableState::default().with_selected(active.then_some(view.cursor));
    f.render_stateful_widget(table, area, &mut state);
}

fn render_referral_pane<T>(
    f: &mut Frame,
    area: Rect,
    title: &str,
    referrals: &[EnrichedReferral],
    counterpart: ReferralParty,
    view: &DetailView<T>,
    pane: usize,
) {
    if referrals.is_empty() {
        let empty = Paragraph::new("No patient referrals found.");
        f.render_widget(empty.block(pane_block(title, view.pane == pane)), area);
        return;
    }
    let rows = referrals
        .iter()
        .map(|r| match raw_referral(&r.referral) {
            Some(raw) => vec![String::new(), raw],
            None => vec![
                id_text(r.referral.id),
                party_display(r, ReferralParty::Patient, false),
                party_display(r, counterpart, false),
                format_date(r.referral.date_sent.as_deref()),
                text(&r.referral.status),
            ],
        })
        .collect();
    render_pane(
        f,
        area,
        title,
        &["ID", "Patient", counterpart.label(), "Date Sent", "Status"],
        rows,
        view,
        pane,
    );
}

/// Loading or error body shared by every fetched screen. `None` once data
/// is in.
fn status_body(loading: bool, error: Option<&str>, what: &str) -> Option<Paragraph<'static>> {
    if loading {
        return Some(Paragraph::new(format!("Loading {}...", what)));
    }
    error.map(|message| {
        Paragraph::new(vec![
            error_line_text(message),
            Line::from(""),
            muted_line("Press r to retry."),
        ])
        .wrap(Wrap { trim: true })
    })
}

fn form_status<'a>(submitting: bool, error: Option<&'a str>, success: Option<&'a str>) -> Vec<Line<'a>> {
    let mut lines = Vec::new();
    if submitting {
        lines.push(muted_line("Saving..."));
    }
    if let Some(error) = error {
        lines.push(error_line_text(error));
    }
    if let Some(success) = success {
        lines.push(Line::from(Span::styled(
            success,
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
        )));
    }
    lines
}

/// The referral view body: labelled fields, or the raw record when it
/// carries none of them.
fn referral_lines(referral: &EnrichedReferral, names_loading: bool) -> Vec<Line<'static>> {
    match raw_referral(&referral.referral) {
        Some(raw) => vec![Line::from(raw)],
        None => field_lines(&with_extra(
            referral_fields(referral, names_loading),
            &referral.referral.extra,
        )),
    }
}

fn referral_fields(referral: &EnrichedReferral, names_loading: bool) -> Vec<(&'static str, String)> {
    let mut fields: Vec<(&'static str, String)> = ReferralParty::ALL
        .iter()
        .map(|party| (party.label(), party_display(referral, *party, names_loading)))
        .collect();
    let r = &referral.referral;
    fields.extend([
        ("Reason", text(&r.reason)),
        ("Notes", text(&r.notes)),
        ("Priority", text(&r.priority)),
        ("Status", text(&r.status)),
        ("Date Sent", format_date(r.date_sent.as_deref())),
        ("Date Received", format_date(r.date_received.as_deref())),
    ]);
    fields
}

/// Append the record's unknown fields after the known ones.
fn with_extra(fields: Vec<(&str, String)>, extra: &Map<String, Value>) -> Vec<(String, String)> {
    fields
        .into_iter()
        .map(|(label, value)| (label.to_string(), value))
        .chain(extra_pairs(extra))
        .collect()
}

fn field_lines<L: AsRef<str>>(fields: &[(L, String)]) -> Vec<Line<'static>> {
    let width = fields.iter().map(|(l, _)| l.as_ref().len()).max().unwrap_or(0);
    fields
        .iter()
        .map(|(label, value)| {
            Line::from(vec![
                Span::styled(
                    format!("{:>width$}: ", label.as_ref(), width = width),
                    Style::default().fg(MUTED),
                ),
                Span::raw(value.clone()),
            ])
        })
        .collect()
}

fn input_line(label: &str, value: &str, focused: bool) -> Line<'static> {
    let (marker, style) = if focused {
        ("▸ ", Style::default().fg(ACCENT).add_modifier(Modifier::BOLD))
    } else {
        ("  ", Style::default().fg(Color::White))
    };
    let cursor = if focused { "_" } else { "" };
    Line::from(vec![
        Span::styled(format!("{}{:<24}", marker, label), style),
        Span::raw(format!("{}{}", value, cursor)),
    ])
}

fn error_line(message: &str) -> Paragraph<'static> {
    Paragraph::new(error_line_text(message))
}

fn error_line_text(message: &str) -> Line<'static> {
    Line::from(Span::styled(
        message.to_string(),
        Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
    ))
}

fn muted_line(message: &str) -> Line<'static> {
    Line::from(Span::styled(message.to_string(), Style::default().fg(MUTED)))
}

fn bordered() -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(MUTED))
}

fn titled(title: &str) -> Block<'static> {
    bordered().title(title.to_string())
}

fn pane_block(title: &str, active: bool) -> Block<'static> {
    let color = if active { ACCENT } else { MUTED };
    Block::default()
        .title(title.to_string())
        .borders(Borders::ALL)
        .border_style(Style::default().fg(color))
}

// ── Utility helpers ───────────────────────────────────────────────────────────

fn text(value: &Option<String>) -> String {
    or_na(value.as_deref()).to_string()
}

fn id_text(id: Option<EntityId>) -> String {
    id.map(|id| id.to_string()).unwrap_or_default()
}

/// Display name of the selected record, "Select..." when nothing is.
fn name_in<T: Record>(items: &[T], selected: Option<EntityId>) -> String {
    match selected {
        None => "Select...".to_string(),
        Some(id) => items
            .iter()
            .find(|item| item.id() == Some(id))
            .and_then(|item| item.name())
            .map(str::to_string)
            .unwrap_or_else(|| format!("ID: {}", id)),
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn split_top(area: Rect, height: u16) -> std::rc::Rc<[Rect]> {
    Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(height), Constraint::Min(0)])
        .split(area)
}

/// A `width` x `height` rectangle centred in `area`, clipped to it.
fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use ratatui::{backend::TestBackend, layout::Rect, text::Line, Terminal};
    use serde_json::json;

    use referral_contracts::{
        entity::{EntityId, Provider},
        referral::{EnrichedReferral, PatientReferral},
    };

    use super::{capitalize, centered, name_in, provider_fields, referral_lines};

    fn plain(lines: &[Line]) -> Vec<String> {
        lines
            .iter()
            .map(|line| line.spans.iter().map(|s| s.content.as_ref()).collect())
            .collect()
    }

    fn screen_text(terminal: &Terminal<TestBackend>) -> String {
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    #[test]
    fn names_fall_back_to_the_id() {
        let providers = vec![Provider {
            id: Some(EntityId(2)),
            name: Some("Acme Clinic".to_string()),
            ..Provider::default()
        }];
        assert_eq!(name_in(&providers, Some(EntityId(2))), "Acme Clinic");
        assert_eq!(name_in(&providers, Some(EntityId(9))), "ID: 9");
        assert_eq!(name_in(&providers, None), "Select...");
    }

    #[test]
    fn referral_without_known_fields_shows_the_raw_record() {
        let raw: PatientReferral = serde_json::from_value(json!({ "ref_code": "X-17" })).unwrap();
        let lines = plain(&referral_lines(&EnrichedReferral::unresolved(raw), false));
        assert_eq!(lines, vec![r#"{"ref_code":"X-17"}"#.to_string()]);
    }

    #[test]
    fn referral_view_lists_unknown_fields_after_known_ones() {
        let referral: PatientReferral =
            serde_json::from_value(json!({ "status": "pending", "ref_code": "X-17" })).unwrap();
        let lines = plain(&referral_lines(&EnrichedReferral::unresolved(referral), false));

        assert!(lines.iter().any(|l| l.ends_with("Status: pending")));
        assert!(lines.last().is_some_and(|l| l.ends_with("ref_code: X-17")));
    }

    #[test]
    fn provider_view_shows_every_address_line_and_the_creation_date() {
        let provider: Provider = serde_json::from_value(json!({
            "name": "Acme Clinic",
            "address_line2": "Suite 200",
            "created_at": "2026-03-05T14:22:00Z",
            "npi": "123"
        }))
        .unwrap();
        let fields = provider_fields(&provider);
        let value = |label: &str| {
            fields
                .iter()
                .find(|(l, _)| l == label)
                .map(|(_, v)| v.clone())
        };

        assert_eq!(value("Address 2").as_deref(), Some("Suite 200"));
        assert_eq!(value("Created").as_deref(), Some("Mar 5, 2026"));
        assert_eq!(value("npi").as_deref(), Some("123"));
    }

    #[test]
    fn dialog_is_centred_and_clipped() {
        let area = Rect::new(0, 0, 100, 40);
        assert_eq!(centered(area, 60, 7), Rect::new(20, 16, 60, 7));
        assert_eq!(centered(Rect::new(0, 0, 30, 5), 60, 7), Rect::new(0, 0, 30, 5));
    }

    #[test]
    fn section_titles_are_capitalized() {
        assert_eq!(capitalize("practitioners"), "Practitioners");
        assert_eq!(capitalize(""), "");
    }

    #[test]
    fn confirm_dialog_shows_the_prompt() {
        let mut terminal = Terminal::new(TestBackend::new(80, 20)).unwrap();
        terminal
            .draw(|f| super::render_confirm(f, "Are you sure?"))
            .unwrap();

        let text = screen_text(&terminal);
        assert!(text.contains("Are you sure?"));
        assert!(text.contains("Confirm"));
    }
}
