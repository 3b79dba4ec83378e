//! Application state, background fetches, and key handling.
//!
//! Every network call runs as a task on the tokio runtime and reports back
//! over a channel. Each result is tagged with the navigation generation it
//! was started under; results from a screen the user has already left are
//! dropped in `drain`.

use std::{
    future::Future,
    time::{Duration, Instant},
};

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::{
    runtime::Handle,
    sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender},
};
use tracing::{debug, info, warn};

use referral_config::ClientConfig;
use referral_contracts::{
    endpoint::Resource,
    entity::{EntityId, Patient, Practitioner, Provider, Record},
    error::ReferralResult,
    referral::{EnrichedReferral, PatientReferral},
};
use referral_core::{
    enrich::enrich_referral,
    resolve,
    screens::{
        detail::{
            fetch_patient, fetch_practitioner_detail, fetch_provider_detail, fetch_referral,
            DetailScreen, PractitionerDetail, ProviderDetail, ReferralView,
        },
        form::{EntityForm, FormMode, FormValues},
        list::ListScreen,
        membership::AddPractitionerForm,
        referral_form::{
            ReferralForm, Side, PATIENT, RECEIVING_PRACTITIONER, RECEIVING_PROVIDER,
            SENDING_PRACTITIONER, SENDING_PROVIDER,
        },
        ConfirmAction, Confirmation, SubmitOutcome,
    },
    ApiClient, NavSection, Route, SessionState,
};

/// How often the loop wakes up to pick up task results and timers.
pub const TICK: Duration = Duration::from_millis(100);

// ── Settings ──────────────────────────────────────────────────────────────────

/// The parts of `ClientConfig` the UI needs at runtime.
#[derive(Debug, Clone)]
pub struct Settings {
    pub token_path: String,
    pub redirect_delay: Duration,
    pub referral_redirect_delay: Duration,
}

impl Settings {
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            token_path: config.api.token_path.clone(),
            redirect_delay: config.redirect_delay(),
            referral_redirect_delay: config.referral_redirect_delay(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::from_config(&ClientConfig::default())
    }
}

// ── Task results ──────────────────────────────────────────────────────────────

pub enum Message {
    Providers(ReferralResult<Vec<Provider>>),
    Practitioners(ReferralResult<Vec<Practitioner>>),
    Patients(ReferralResult<Vec<Patient>>),
    ProviderDetail(ReferralResult<ProviderDetail>),
    PractitionerDetail(ReferralResult<PractitionerDetail>),
    Patient(ReferralResult<Patient>),
    Referral(ReferralResult<PatientReferral>),
    ReferralNames(EnrichedReferral),
    Prefill(ReferralResult<Value>),
    ReferralOptions(ReferralResult<(Vec<Patient>, Vec<Provider>)>),
    ReferralPrefill(ReferralResult<Value>),
    ReferralPractitioners(Side, EntityId, Vec<Practitioner>),
    PractitionerOptions(ReferralResult<Vec<Practitioner>>),
    Saved(ReferralResult<Option<Value>>),
    Confirmed(ConfirmAction, ReferralResult<bool>),
    LoggedIn(ReferralResult<()>),
}

pub struct Envelope {
    generation: u64,
    message: Message,
}

/// Starts tasks for one navigation generation.
#[derive(Clone)]
struct Spawner {
    runtime: Handle,
    tx: UnboundedSender<Envelope>,
    generation: u64,
    client: ApiClient,
}

impl Spawner {
    fn spawn<F, Fut>(&self, task: F)
    where
        F: FnOnce(ApiClient) -> Fut,
        Fut: Future<Output = Message> + Send + 'static,
    {
        let fut = task(self.client.clone());
        let tx = self.tx.clone();
        let generation = self.generation;
        self.runtime.spawn(async move {
            let message = fut.await;
            // The receiver only goes away on shutdown.
            let _ = tx.send(Envelope {
                generation,
                message,
            });
        });
    }
}

// ── Screens ───────────────────────────────────────────────────────────────────

pub struct ListView<T> {
    pub screen: ListScreen<T>,
    pub cursor: usize,
    wrap: fn(ReferralResult<Vec<T>>) -> Message,
}

impl<T> ListView<T>
where
    T: DeserializeOwned + Record + Send + 'static,
{
    fn new(resource: Resource, wrap: fn(ReferralResult<Vec<T>>) -> Message) -> Self {
        Self {
            screen: ListScreen::new(resource),
            cursor: 0,
            wrap,
        }
    }

    fn load(&mut self, spawner: &Spawner) {
        self.screen.begin_load();
        let resource = self.screen.resource();
        let wrap = self.wrap;
        spawner.spawn(move |client| async move {
            wrap(ListScreen::<T>::fetch(&client, resource).await)
        });
    }

    fn finish(&mut self, result: ReferralResult<Vec<T>>) {
        self.screen.finish_load(result);
        self.clamp();
    }

    fn clamp(&mut self) {
        self.cursor = self.cursor.min(self.screen.items.len().saturating_sub(1));
    }

    pub fn selected_id(&self) -> Option<EntityId> {
        self.screen.items.get(self.cursor).and_then(|item| item.id())
    }

    fn key(&mut self, code: KeyCode) -> Option<Action> {
        let resource = self.screen.resource();
        match code {
            KeyCode::Up | KeyCode::Char('k') => self.cursor = self.cursor.saturating_sub(1),
            KeyCode::Down | KeyCode::Char('j') => {
                self.cursor += 1;
                self.clamp();
            }
            KeyCode::Char('n') => return Some(Action::Navigate(new_route(resource))),
            KeyCode::Enter => {
                return self
                    .selected_id()
                    .map(|id| Action::Navigate(Route::view(resource, id)))
            }
            KeyCode::Char('e') => {
                return self
                    .selected_id()
                    .map(|id| Action::Navigate(edit_route(resource, id)))
            }
            KeyCode::Char('d') => {
                return self
                    .selected_id()
                    .map(|id| Action::Confirm(self.screen.request_delete(id)))
            }
            _ => {}
        }
        None
    }
}

/// A view screen with selectable related-record panes.
pub struct DetailView<T> {
    pub screen: DetailScreen<T>,
    pub pane: usize,
    pub cursor: usize,
}

impl<T> DetailView<T> {
    fn new(resource: Resource, id: EntityId) -> Self {
        Self {
            screen: DetailScreen::new(resource, id),
            pane: 0,
            cursor: 0,
        }
    }

    /// Move within `rows` rows spread over `panes.len()` panes.
    fn navigate_panes(&mut self, code: KeyCode, panes: &[usize]) {
        match code {
            KeyCode::Tab if !panes.is_empty() => {
                self.pane = (self.pane + 1) % panes.len();
                self.cursor = 0;
            }
            KeyCode::Up | KeyCode::Char('k') => self.cursor = self.cursor.saturating_sub(1),
            KeyCode::Down | KeyCode::Char('j') => {
                let rows = panes.get(self.pane).copied().unwrap_or(0);
                self.cursor = (self.cursor + 1).min(rows.saturating_sub(1));
            }
            _ => {}
        }
    }
}

pub struct FormView {
    pub form: EntityForm,
    pub focus: usize,
}

impl FormView {
    fn key(&mut self, code: KeyCode) -> Option<Action> {
        if self.form.loading || self.form.submitting {
            return None;
        }
        let count = self.form.fields.len();
        match code {
            KeyCode::Up | KeyCode::BackTab => self.focus = (self.focus + count - 1) % count,
            KeyCode::Down | KeyCode::Tab => self.focus = (self.focus + 1) % count,
            KeyCode::Enter if self.focus + 1 == count => return Some(Action::Submit),
            KeyCode::Enter => self.focus += 1,
            KeyCode::Backspace => edit_value(&mut self.form.values, self.form.fields[self.focus].key, None),
            KeyCode::Char(c) => edit_value(&mut self.form.values, self.form.fields[self.focus].key, Some(c)),
            _ => {}
        }
        None
    }
}

/// The rows of the referral form, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferralField {
    Patient,
    SendingProvider,
    ReceivingProvider,
    SendingPractitioner,
    ReceivingPractitioner,
    Reason,
    Notes,
    Priority,
}

impl ReferralField {
    pub const ALL: [ReferralField; 8] = [
        ReferralField::Patient,
        ReferralField::SendingProvider,
        ReferralField::ReceivingProvider,
        ReferralField::SendingPractitioner,
        ReferralField::ReceivingPractitioner,
        ReferralField::Reason,
        ReferralField::Notes,
        ReferralField::Priority,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ReferralField::Patient => "Patient",
            ReferralField::SendingProvider => "Sending Provider",
            ReferralField::ReceivingProvider => "Receiving Provider",
            ReferralField::SendingPractitioner => "Sending Practitioner",
            ReferralField::ReceivingPractitioner => "Receiving Practitioner",
            ReferralField::Reason => "Reason",
            ReferralField::Notes => "Notes",
            ReferralField::Priority => "Priority",
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            ReferralField::Patient => PATIENT,
            ReferralField::SendingProvider => SENDING_PROVIDER,
            ReferralField::ReceivingProvider => RECEIVING_PROVIDER,
            ReferralField::SendingPractitioner => SENDING_PRACTITIONER,
            ReferralField::ReceivingPractitioner => RECEIVING_PRACTITIONER,
            ReferralField::Reason => "reason",
            ReferralField::Notes => "notes",
            ReferralField::Priority => "priority",
        }
    }

    pub fn is_picker(self) -> bool {
        !matches!(
            self,
            ReferralField::Reason | ReferralField::Notes | ReferralField::Priority
        )
    }
}

pub struct ReferralFormView {
    pub form: ReferralForm,
    pub focus: usize,
    /// Initial fetches still outstanding.
    pending: usize,
}

impl ReferralFormView {
    pub fn field(&self) -> ReferralField {
        ReferralField::ALL[self.focus]
    }

    /// Whether the sending provider can be changed. A new referral is
    /// always sent from the provider it was opened on.
    pub fn sender_locked(&self) -> bool {
        self.form.mode == FormMode::New
    }

    fn settle(&mut self) {
        self.pending = self.pending.saturating_sub(1);
        if self.pending == 0 {
            self.form.loading = false;
        }
    }

    /// Step a picker through its options. Returns the side whose provider
    /// changed, so its practitioners can be refetched.
    fn cycle(&mut self, field: ReferralField, forward: bool) -> Option<Side> {
        let options: Vec<EntityId> = match field {
            ReferralField::Patient => ids(&self.form.patients),
            ReferralField::SendingProvider if self.sender_locked() => return None,
            ReferralField::SendingProvider => ids(&self.form.providers),
            ReferralField::ReceivingProvider => self
                .form
                .receiving_options()
                .into_iter()
                .filter_map(|p| p.id)
                .collect(),
            ReferralField::SendingPractitioner => ids(&self.form.sending_practitioners),
            ReferralField::ReceivingPractitioner => ids(&self.form.receiving_practitioners),
            _ => return None,
        };
        let next = cycle(&options, self.form.selected(field.key()), forward);
        self.form.select(field.key(), next);

        let (side, practitioner) = match field {
            ReferralField::SendingProvider => (Side::Sending, SENDING_PRACTITIONER),
            ReferralField::ReceivingProvider => (Side::Receiving, RECEIVING_PRACTITIONER),
            _ => return None,
        };
        self.form.select(practitioner, None);
        self.form.set_practitioners(side, Vec::new());
        Some(side)
    }

    fn key(&mut self, code: KeyCode) -> Option<Action> {
        if self.form.loading || self.form.submitting {
            return None;
        }
        let count = ReferralField::ALL.len();
        let field = self.field();
        match code {
            KeyCode::Up | KeyCode::BackTab => self.focus = (self.focus + count - 1) % count,
            KeyCode::Down | KeyCode::Tab => self.focus = (self.focus + 1) % count,
            KeyCode::Enter if self.focus + 1 == count => return Some(Action::Submit),
            KeyCode::Enter => self.focus += 1,
            KeyCode::Left | KeyCode::Right if field.is_picker() => {
                if let Some(side) = self.cycle(field, code == KeyCode::Right) {
                    return Some(Action::RefreshPractitioners(side));
                }
            }
            KeyCode::Backspace if !field.is_picker() => {
                edit_value(&mut self.form.values, field.key(), None)
            }
            KeyCode::Char(c) if !field.is_picker() => {
                edit_value(&mut self.form.values, field.key(), Some(c))
            }
            _ => {}
        }
        None
    }
}

/// The add-practitioner picker.
pub struct PickerView {
    pub form: AddPractitionerForm,
    pub cursor: usize,
}

impl PickerView {
    fn key(&mut self, code: KeyCode) -> Option<Action> {
        match code {
            KeyCode::Up | KeyCode::Char('k') => self.cursor = self.cursor.saturating_sub(1),
            KeyCode::Down | KeyCode::Char('j') => {
                self.cursor = (self.cursor + 1).min(self.form.practitioners.len().saturating_sub(1))
            }
            KeyCode::Enter if !self.form.submitting => {
                self.form.selected = self.form.practitioners.get(self.cursor).and_then(|p| p.id);
                return Some(Action::Submit);
            }
            _ => {}
        }
        None
    }
}

pub const LOGIN_FIELDS: [&str; 3] = ["Username", "Password", "Token"];

#[derive(Debug, Default)]
pub struct LoginView {
    pub username: String,
    pub password: String,
    /// A bearer token pasted in directly; takes precedence when set.
    pub token: String,
    pub focus: usize,
    pub submitting: bool,
    pub error: Option<String>,
}

impl LoginView {
    pub fn value(&self, index: usize) -> &str {
        match index {
            0 => &self.username,
            1 => &self.password,
            _ => &self.token,
        }
    }

    fn value_mut(&mut self) -> &mut String {
        match self.focus {
            0 => &mut self.username,
            1 => &mut self.password,
            _ => &mut self.token,
        }
    }

    fn key(&mut self, code: KeyCode) -> Option<Action> {
        if self.submitting {
            return None;
        }
        let count = LOGIN_FIELDS.len();
        match code {
            KeyCode::Up | KeyCode::BackTab => self.focus = (self.focus + count - 1) % count,
            KeyCode::Down | KeyCode::Tab => self.focus = (self.focus + 1) % count,
            KeyCode::Enter => return Some(Action::Submit),
            KeyCode::Backspace => {
                self.value_mut().pop();
            }
            KeyCode::Char(c) => self.value_mut().push(c),
            _ => {}
        }
        None
    }
}

pub enum Screen {
    Login(LoginView),
    Providers(ListView<Provider>),
    Practitioners(ListView<Practitioner>),
    Patients(ListView<Patient>),
    Provider(DetailView<ProviderDetail>),
    Practitioner(DetailView<PractitionerDetail>),
    Patient(DetailView<Patient>),
    Referral(ReferralView),
    Form(FormView),
    ReferralForm(ReferralFormView),
    AddPractitioner(PickerView),
}

impl Screen {
    /// Screens where printable keys are typed into a field.
    fn takes_text(&self) -> bool {
        matches!(
            self,
            Screen::Login(_) | Screen::Form(_) | Screen::ReferralForm(_)
        )
    }
}

enum Action {
    Navigate(Route),
    Back,
    Confirm(Confirmation),
    Retry,
    Submit,
    RefreshPractitioners(Side),
    Logout,
    Quit,
}

// ── App ───────────────────────────────────────────────────────────────────────

pub struct App {
    client: ApiClient,
    settings: Settings,
    runtime: Handle,
    tx: UnboundedSender<Envelope>,
    rx: UnboundedReceiver<Envelope>,
    generation: u64,
    redirect: Option<(Instant, Route)>,

    pub route: Route,
    pub screen: Screen,
    /// Pending yes / no question, drawn over the screen.
    pub confirm: Option<Confirmation>,
    /// One-line error for actions that are not part of a screen's own state.
    pub banner: Option<String>,
    pub should_quit: bool,
}

impl App {
    /// Build the app and open the providers list (or Login without a token).
    pub fn new(client: ApiClient, settings: Settings, runtime: Handle) -> Self {
        let (tx, rx) = unbounded_channel();
        let mut app = Self {
            client,
            settings,
            runtime,
            tx,
            rx,
            generation: 0,
            redirect: None,
            route: Route::Login,
            screen: Screen::Login(LoginView::default()),
            confirm: None,
            banner: None,
            should_quit: false,
        };
        app.navigate(Route::Providers);
        app
    }

    pub fn session_state(&self) -> SessionState {
        self.client.session().state()
    }

    pub fn redirect_pending(&self) -> bool {
        self.redirect.is_some()
    }

    fn spawner(&self) -> Spawner {
        Spawner {
            runtime: self.runtime.clone(),
            tx: self.tx.clone(),
            generation: self.generation,
            client: self.client.clone(),
        }
    }

    // ── Navigation ────────────────────────────────────────────────────────────

    /// Show `requested`, or Login if the session gate says so. Everything
    /// belonging to the previous screen is discarded.
    pub fn navigate(&mut self, requested: Route) {
        let route = resolve(requested, self.session_state());
        if route != requested {
            debug!(requested = %requested, shown = %route, "route gated");
        }

        self.generation += 1;
        self.route = route;
        self.confirm = None;
        self.redirect = None;
        self.banner = None;
        self.screen = self.open(route);
        info!(route = %route, "navigated");
    }

    fn open(&self, route: Route) -> Screen {
        let mut screen = match route {
            Route::Login => Screen::Login(LoginView::default()),
            Route::Providers => Screen::Providers(ListView::new(Resource::Providers, Message::Providers)),
            Route::Practitioners => {
                Screen::Practitioners(ListView::new(Resource::Practitioners, Message::Practitioners))
            }
            Route::Patients => Screen::Patients(ListView::new(Resource::Patients, Message::Patients)),
            Route::ProviderView(id) => Screen::Provider(DetailView::new(Resource::Providers, id)),
            Route::PractitionerView(id) => {
                Screen::Practitioner(DetailView::new(Resource::Practitioners, id))
            }
            Route::PatientView(id) => Screen::Patient(DetailView::new(Resource::Patients, id)),
            Route::ReferralView(id) => Screen::Referral(ReferralView::new(id)),
            Route::ProviderNew => self.entity_form(Resource::Providers, FormMode::New),
            Route::ProviderEdit(id) => self.entity_form(Resource::Providers, FormMode::Edit(id)),
            Route::PractitionerNew => self.entity_form(Resource::Practitioners, FormMode::New),
            Route::PractitionerEdit(id) => {
                self.entity_form(Resource::Practitioners, FormMode::Edit(id))
            }
            Route::PatientNew => self.entity_form(Resource::Patients, FormMode::New),
            Route::PatientEdit(id) => self.entity_form(Resource::Patients, FormMode::Edit(id)),
            Route::SendReferral(provider) => self.referral_form(ReferralForm::send_from(provider)),
            Route::ReferralEdit(id) => self.referral_form(ReferralForm::edit(id)),
            Route::AddPractitioner(provider) => Screen::AddPractitioner(PickerView {
                form: AddPractitionerForm::new(provider)
                    .with_redirect_delay(self.settings.redirect_delay),
                cursor: 0,
            }),
        };
        load(&mut screen, &self.spawner());
        screen
    }

    fn entity_form(&self, resource: Resource, mode: FormMode) -> Screen {
        Screen::Form(FormView {
            form: EntityForm::new(resource, mode).with_redirect_delay(self.settings.redirect_delay),
            focus: 0,
        })
    }

    fn referral_form(&self, form: ReferralForm) -> Screen {
        Screen::ReferralForm(ReferralFormView {
            form: form.with_redirect_delay(self.settings.referral_redirect_delay),
            focus: 0,
            pending: 0,
        })
    }

    fn logout(&mut self) {
        match self.client.session().logout() {
            Ok(()) => self.navigate(Route::Login),
            Err(e) => {
                warn!(error = %e, "logout failed");
                self.banner = Some(e.to_string());
            }
        }
    }

    // ── Timers and task results ───────────────────────────────────────────────

    /// How long the event loop may block waiting for input.
    pub fn poll_timeout(&self) -> Duration {
        match self.redirect {
            Some((at, _)) => at.saturating_duration_since(Instant::now()).min(TICK),
            None => TICK,
        }
    }

    /// Fire a due post-submit redirect.
    pub fn tick(&mut self) {
        if let Some((at, route)) = self.redirect {
            if Instant::now() >= at {
                self.navigate(route);
            }
        }
    }

    /// Apply every task result that has arrived.
    pub fn drain(&mut self) {
        while let Ok(envelope) = self.rx.try_recv() {
            if envelope.generation != self.generation {
                debug!(generation = envelope.generation, "stale result dropped");
                continue;
            }
            self.apply(envelope.message);
        }
    }

    fn schedule(&mut self, outcome: Option<SubmitOutcome>) {
        if let Some(outcome) = outcome {
            debug!(redirect = %outcome.redirect, delay_ms = outcome.delay.as_millis() as u64, "redirect scheduled");
            self.redirect = Some((Instant::now() + outcome.delay, outcome.redirect));
        }
    }

    fn apply(&mut self, message: Message) {
        let spawner = self.spawner();
        let mut next: Option<Route> = None;
        let mut outcome: Option<SubmitOutcome> = None;

        match (message, &mut self.screen) {
            (Message::Providers(result), Screen::Providers(list)) => list.finish(result),
            (Message::Practitioners(result), Screen::Practitioners(list)) => list.finish(result),
            (Message::Patients(result), Screen::Patients(list)) => list.finish(result),

            (Message::ProviderDetail(result), Screen::Provider(view)) => view.screen.finish(result),
            (Message::PractitionerDetail(result), Screen::Practitioner(view)) => {
                view.screen.finish(result)
            }
            (Message::Patient(result), Screen::Patient(view)) => view.screen.finish(result),

            (Message::Referral(result), Screen::Referral(view)) => {
                if let Some(raw) = view.finish_record(result) {
                    spawner.spawn(move |client| async move {
                        Message::ReferralNames(enrich_referral(&client, raw).await)
                    });
                }
            }
            (Message::ReferralNames(enriched), Screen::Referral(view)) => view.finish_names(enriched),

            (Message::Prefill(result), Screen::Form(view)) => view.form.finish_load(result),
            (Message::Saved(result), Screen::Form(view)) => outcome = view.form.finish_submit(result),

            (Message::ReferralOptions(result), Screen::ReferralForm(view)) => {
                view.form.finish_options(result);
                view.settle();
            }
            (Message::ReferralPrefill(result), Screen::ReferralForm(view)) => {
                view.form.finish_referral(result);
                view.settle();
                for side in [Side::Sending, Side::Receiving] {
                    spawn_practitioners(&spawner, &view.form, side);
                }
            }
            (Message::ReferralPractitioners(side, provider, items), Screen::ReferralForm(view)) => {
                // Only if that provider is still the one selected.
                if view.form.selected(provider_field(side)) == Some(provider) {
                    view.form.set_practitioners(side, items);
                }
            }
            (Message::Saved(result), Screen::ReferralForm(view)) => {
                outcome = view.form.finish_submit(result)
            }

            (Message::PractitionerOptions(result), Screen::AddPractitioner(view)) => {
                view.form.finish_load(result)
            }
            (Message::Saved(result), Screen::AddPractitioner(view)) => {
                outcome = view.form.finish_submit(result)
            }

            (Message::Confirmed(action, result), screen) => {
                match (action, screen, result) {
                    (_, _, Ok(false)) => {}
                    (ConfirmAction::Delete(_, id), Screen::Providers(list), result) => {
                        list.screen.finish_delete(id, result.map(|_| ()));
                        list.clamp();
                    }
                    (ConfirmAction::Delete(_, id), Screen::Practitioners(list), result) => {
                        list.screen.finish_delete(id, result.map(|_| ()));
                        list.clamp();
                    }
                    (ConfirmAction::Delete(_, id), Screen::Patients(list), result) => {
                        list.screen.finish_delete(id, result.map(|_| ()));
                        list.clamp();
                    }
                    (ConfirmAction::Delete(..), Screen::Referral(_), Ok(true)) => {
                        next = Some(Route::Providers)
                    }
                    (ConfirmAction::Delete(..), Screen::Referral(_), Err(e)) => {
                        self.banner = Some(e.user_message("Failed to delete referral"))
                    }
                    (ConfirmAction::RemovePractitioner { .. }, Screen::Provider(view), Ok(true)) => {
                        load_provider(view, &spawner)
                    }
                    (ConfirmAction::RemovePractitioner { .. }, Screen::Provider(_), Err(e)) => {
                        self.banner = Some(e.user_message("Failed to remove practitioner"))
                    }
                    _ => debug!("confirmation result for another screen"),
                }
            }

            (Message::LoggedIn(result), Screen::Login(view)) => {
                view.submitting = false;
                match result {
                    Ok(()) => next = Some(Route::Providers),
                    Err(e) => view.error = Some(e.user_message("Login failed")),
                }
            }

            _ => debug!(route = %self.route, "result does not belong to the current screen"),
        }

        self.schedule(outcome);
        if let Some(route) = next {
            self.navigate(route);
        }
    }

    // ── Keys ──────────────────────────────────────────────────────────────────

    pub fn handle_key(&mut self, key: KeyEvent) {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.should_quit = true;
            return;
        }

        if let Some(confirmation) = self.confirm.take() {
            match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                    let action = confirmation.action;
                    self.spawner().spawn(move |client| async move {
                        let result = confirmation.resolve(&client, true).await;
                        Message::Confirmed(action, result)
                    });
                }
                KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                    debug!("confirmation declined")
                }
                _ => self.confirm = Some(confirmation),
            }
            return;
        }

        let action = if self.screen.takes_text() {
            self.text_key(key)
        } else {
            self.browse_key(key.code)
        };
        if let Some(action) = action {
            self.perform(action);
        }
    }

    fn text_key(&mut self, key: KeyEvent) -> Option<Action> {
        if key.code == KeyCode::Esc {
            return Some(Action::Back);
        }
        if key.code == KeyCode::Char('s') && key.modifiers.contains(KeyModifiers::CONTROL) {
            return Some(Action::Submit);
        }
        match &mut self.screen {
            Screen::Login(view) => view.key(key.code),
            Screen::Form(view) => view.key(key.code),
            Screen::ReferralForm(view) => view.key(key.code),
            _ => None,
        }
    }

    fn browse_key(&mut self, code: KeyCode) -> Option<Action> {
        match code {
            KeyCode::Char('q') => return Some(Action::Quit),
            KeyCode::Char('L') => return Some(Action::Logout),
            KeyCode::Char('r') => return Some(Action::Retry),
            KeyCode::Esc | KeyCode::Backspace => return Some(Action::Back),
            KeyCode::Char(c @ '1'..='3') => {
                let index = c as usize - '1' as usize;
                return Some(Action::Navigate(NavSection::ALL[index].route()));
            }
            _ => {}
        }

        match &mut self.screen {
            Screen::Providers(list) => list.key(code),
            Screen::Practitioners(list) => list.key(code),
            Screen::Patients(list) => list.key(code),
            Screen::Provider(view) => provider_key(view, code),
            Screen::Practitioner(view) => practitioner_key(view, code),
            Screen::Patient(view) => match code {
                KeyCode::Char('e') => Some(Action::Navigate(Route::PatientEdit(view.screen.id))),
                _ => None,
            },
            Screen::Referral(view) => match code {
                KeyCode::Char('e') => Some(Action::Navigate(Route::ReferralEdit(view.screen.id))),
                KeyCode::Char('d') => Some(Action::Confirm(Confirmation::delete(
                    Resource::PatientReferrals,
                    view.screen.id,
                ))),
                _ => None,
            },
            Screen::AddPractitioner(view) => view.key(code),
            Screen::Login(_) | Screen::Form(_) | Screen::ReferralForm(_) => None,
        }
    }

    fn perform(&mut self, action: Action) {
        match action {
            Action::Navigate(route) => self.navigate(route),
            Action::Back => {
                let parent = parent(self.route);
                if parent != self.route {
                    self.navigate(parent);
                }
            }
            Action::Confirm(confirmation) => self.confirm = Some(confirmation),
            Action::Retry => {
                let spawner = self.spawner();
                self.banner = None;
                load(&mut self.screen, &spawner);
            }
            Action::Submit => self.submit(),
            Action::RefreshPractitioners(side) => {
                if let Screen::ReferralForm(view) = &self.screen {
                    spawn_practitioners(&self.spawner(), &view.form, side);
                }
            }
            Action::Logout => self.logout(),
            Action::Quit => self.should_quit = true,
        }
    }

    /// Whether the current screen has a request in flight.
    fn submitting(&self) -> bool {
        match &self.screen {
            Screen::Login(view) => view.submitting,
            Screen::Form(view) => view.form.submitting,
            Screen::ReferralForm(view) => view.form.submitting,
            Screen::AddPractitioner(view) => view.form.submitting,
            _ => false,
        }
    }

    fn submit(&mut self) {
        if self.redirect.is_some() || self.submitting() {
            debug!(route = %self.route, "submit ignored; already saved or saving");
            return;
        }
        let spawner = self.spawner();
        let mut next: Option<Route> = None;

        match &mut self.screen {
            Screen::Login(view) => {
                view.error = None;
                let token = view.token.trim();
                if !token.is_empty() {
                    match self.client.session().login(token) {
                        Ok(()) => next = Some(Route::Providers),
                        Err(e) => view.error = Some(e.user_message("Login failed")),
                    }
                } else if view.username.trim().is_empty() || view.password.is_empty() {
                    view.error = Some("Username and password are required".to_string());
                } else {
                    view.submitting = true;
                    let username = view.username.trim().to_string();
                    let password = view.password.clone();
                    let token_path = self.settings.token_path.clone();
                    spawner.spawn(move |client| async move {
                        Message::LoggedIn(client.login(&token_path, &username, &password).await)
                    });
                }
            }
            Screen::Form(view) => match view.form.prepare() {
                Ok(body) => {
                    view.form.submitting = true;
                    let (resource, mode) = (view.form.resource(), view.form.mode);
                    spawner.spawn(move |client| async move {
                        Message::Saved(EntityForm::send(&client, resource, mode, body).await)
                    });
                }
                Err(e) => {
                    view.form.finish_submit(Err(e));
                }
            },
            Screen::ReferralForm(view) => match view.form.prepare() {
                Ok(body) => {
                    view.form.submitting = true;
                    let mode = view.form.mode;
                    let sending = view.form.selected(SENDING_PROVIDER);
                    spawner.spawn(move |client| async move {
                        Message::Saved(ReferralForm::send(&client, mode, sending, body).await)
                    });
                }
                Err(e) => {
                    view.form.finish_submit(Err(e));
                }
            },
            Screen::AddPractitioner(view) => match view.form.prepare() {
                Ok(body) => {
                    view.form.submitting = true;
                    let provider = view.form.provider;
                    spawner.spawn(move |client| async move {
                        Message::Saved(AddPractitionerForm::send(&client, provider, body).await)
                    });
                }
                Err(e) => {
                    view.form.finish_submit(Err(e));
                }
            },
            _ => {}
        }

        if let Some(route) = next {
            info!("logged in with a pasted token");
            self.navigate(route);
        }
    }
}

// ── Loading ───────────────────────────────────────────────────────────────────

/// Start the fetches a screen needs. Also used for Retry.
fn load(screen: &mut Screen, spawner: &Spawner) {
    match screen {
        Screen::Login(_) => {}
        Screen::Providers(list) => list.load(spawner),
        Screen::Practitioners(list) => list.load(spawner),
        Screen::Patients(list) => list.load(spawner),
        Screen::Provider(view) => load_provider(view, spawner),
        Screen::Practitioner(view) => {
            view.screen.begin();
            let id = view.screen.id;
            spawner.spawn(move |client| async move {
                Message::PractitionerDetail(fetch_practitioner_detail(&client, id).await)
            });
        }
        Screen::Patient(view) => {
            view.screen.begin();
            let id = view.screen.id;
            spawner.spawn(move |client| async move {
                Message::Patient(fetch_patient(&client, id).await)
            });
        }
        Screen::Referral(view) => {
            view.begin();
            let id = view.screen.id;
            spawner.spawn(move |client| async move {
                Message::Referral(fetch_referral(&client, id).await)
            });
        }
        Screen::Form(view) => {
            if let FormMode::Edit(id) = view.form.mode {
                view.form.begin_load();
                let resource = view.form.resource();
                spawner.spawn(move |client| async move {
                    Message::Prefill(EntityForm::fetch(&client, resource, id).await)
                });
            }
        }
        Screen::ReferralForm(view) => {
            view.form.loading = true;
            view.form.error = None;
            view.pending = 1;
            spawner.spawn(|client| async move {
                Message::ReferralOptions(ReferralForm::fetch_options(&client).await)
            });
            match view.form.mode {
                FormMode::Edit(id) => {
                    view.pending += 1;
                    spawner.spawn(move |client| async move {
                        Message::ReferralPrefill(ReferralForm::fetch_referral(&client, id).await)
                    });
                }
                FormMode::New => spawn_practitioners(spawner, &view.form, Side::Sending),
            }
        }
        Screen::AddPractitioner(view) => {
            view.form.begin_load();
            spawner.spawn(|client| async move {
                Message::PractitionerOptions(AddPractitionerForm::fetch(&client).await)
            });
        }
    }
}

fn load_provider(view: &mut DetailView<ProviderDetail>, spawner: &Spawner) {
    view.screen.begin();
    let id = view.screen.id;
    spawner.spawn(move |client| async move {
        Message::ProviderDetail(fetch_provider_detail(&client, id).await)
    });
}

fn provider_field(side: Side) -> &'static str {
    match side {
        Side::Sending => SENDING_PROVIDER,
        Side::Receiving => RECEIVING_PROVIDER,
    }
}

/// Fetch the practitioners of the provider selected on `side`, if any.
fn spawn_practitioners(spawner: &Spawner, form: &ReferralForm, side: Side) {
    let Some(provider) = form.selected(provider_field(side)) else {
        return;
    };
    spawner.spawn(move |client| async move {
        let items = ReferralForm::practitioners_for(&client, provider).await;
        Message::ReferralPractitioners(side, provider, items)
    });
}

// ── Detail keys ───────────────────────────────────────────────────────────────

/// Panes: practitioners, referrals sent, referrals received.
fn provider_key(view: &mut DetailView<ProviderDetail>, code: KeyCode) -> Option<Action> {
    let id = view.screen.id;
    let panes = match &view.screen.data {
        Some(d) => vec![
            d.practitioners.len(),
            d.referrals_sent.len(),
            d.referrals_received.len(),
        ],
        None => Vec::new(),
    };
    view.navigate_panes(code, &panes);

    let data = view.screen.data.as_ref();
    let practitioner = data
        .filter(|_| view.pane == 0)
        .and_then(|d| d.practitioners.get(view.cursor))
        .and_then(|p| p.id);
    let referral = data
        .and_then(|d| match view.pane {
            1 => d.referrals_sent.get(view.cursor),
            2 => d.referrals_received.get(view.cursor),
            _ => None,
        })
        .and_then(|r| r.referral.id);

    match code {
        KeyCode::Char('e') => Some(Action::Navigate(Route::ProviderEdit(id))),
        KeyCode::Char('a') => Some(Action::Navigate(Route::AddPractitioner(id))),
        KeyCode::Char('s') => Some(Action::Navigate(Route::SendReferral(id))),
        KeyCode::Char('x') => practitioner
            .map(|p| Action::Confirm(Confirmation::remove_practitioner(id, p))),
        KeyCode::Enter => practitioner
            .map(Route::PractitionerView)
            .or_else(|| referral.map(Route::ReferralView))
            .map(Action::Navigate),
        _ => None,
    }
}

/// Panes: referrals sent, referrals received.
fn practitioner_key(view: &mut DetailView<PractitionerDetail>, code: KeyCode) -> Option<Action> {
    let panes = match &view.screen.data {
        Some(d) => vec![d.referrals_sent.len(), d.referrals_received.len()],
        None => Vec::new(),
    };
    view.navigate_panes(code, &panes);

    match code {
        KeyCode::Char('e') => Some(Action::Navigate(Route::PractitionerEdit(view.screen.id))),
        KeyCode::Enter => view
            .screen
            .data
            .as_ref()
            .and_then(|d| match view.pane {
                0 => d.referrals_sent.get(view.cursor),
                _ => d.referrals_received.get(view.cursor),
            })
            .and_then(|r| r.referral.id)
            .map(|id| Action::Navigate(Route::ReferralView(id))),
        _ => None,
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Where Esc leads from `route`.
pub fn parent(route: Route) -> Route {
    match route {
        Route::Login | Route::Providers | Route::Practitioners | Route::Patients => route,
        Route::ProviderNew | Route::ProviderView(_) | Route::ReferralView(_) => Route::Providers,
        Route::ProviderEdit(id) | Route::AddPractitioner(id) | Route::SendReferral(id) => {
            Route::ProviderView(id)
        }
        Route::PractitionerNew | Route::PractitionerView(_) => Route::Practitioners,
        Route::PractitionerEdit(id) => Route::PractitionerView(id),
        Route::PatientNew | Route::PatientView(_) => Route::Patients,
        Route::PatientEdit(id) => Route::PatientView(id),
        Route::ReferralEdit(id) => Route::ReferralView(id),
    }
}

fn new_route(resource: Resource) -> Route {
    match resource {
        Resource::Practitioners => Route::PractitionerNew,
        Resource::Patients => Route::PatientNew,
        Resource::Providers | Resource::PatientReferrals => Route::ProviderNew,
    }
}

fn edit_route(resource: Resource, id: EntityId) -> Route {
    match resource {
        Resource::Providers => Route::ProviderEdit(id),
        Resource::Practitioners => Route::PractitionerEdit(id),
        Resource::Patients => Route::PatientEdit(id),
        Resource::PatientReferrals => Route::ReferralEdit(id),
    }
}

fn ids<T: Record>(items: &[T]) -> Vec<EntityId> {
    items.iter().filter_map(|item| item.id()).collect()
}

/// The option after (or before) `current`, with "none selected" as the
/// first position.
pub fn cycle(options: &[EntityId], current: Option<EntityId>, forward: bool) -> Option<EntityId> {
    let slots = options.len() + 1;
    let position = current
        .and_then(|id| options.iter().position(|o| *o == id))
        .map_or(0, |i| i + 1);
    let next = if forward {
        (position + 1) % slots
    } else {
        (position + slots - 1) % slots
    };
    next.checked_sub(1).map(|i| options[i])
}

/// Append `input` to a field, or delete its last character.
fn edit_value(values: &mut FormValues, key: &'static str, input: Option<char>) {
    let mut value = values.get(key).to_string();
    match input {
        Some(c) => value.push(c),
        None => {
            value.pop();
        }
    }
    values.set(key, value);
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use async_trait::async_trait;
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

    use referral_contracts::{
        entity::{EntityId, Patient, Provider},
        error::ReferralResult,
        transport::{ApiRequest, ApiResponse},
    };
    use referral_core::{
        screens::form::FormValues, traits::Transport, ApiClient, Route, Session,
    };
    use referral_session::InMemoryTokenStore;

    use super::{cycle, edit_value, parent, App, Envelope, Message, Screen, Settings};

    // ── Helpers ───────────────────────────────────────────────────────────────

    /// A server that never answers, so only injected results reach the app.
    struct Silent;

    #[async_trait]
    impl Transport for Silent {
        async fn send(&self, _request: ApiRequest) -> ReferralResult<ApiResponse> {
            std::future::pending().await
        }
    }

    /// Counts requests, then never answers.
    struct Counting(Arc<AtomicUsize>);

    #[async_trait]
    impl Transport for Counting {
        async fn send(&self, _request: ApiRequest) -> ReferralResult<ApiResponse> {
            self.0.fetch_add(1, Ordering::SeqCst);
            std::future::pending().await
        }
    }

    fn app_over(transport: Arc<dyn Transport>, token: Option<&str>) -> App {
        let store = match token {
            Some(t) => InMemoryTokenStore::with_token(t),
            None => InMemoryTokenStore::new(),
        };
        let session = Session::restore(Arc::new(store)).unwrap();
        let client = ApiClient::new(transport, session);
        App::new(client, Settings::default(), tokio::runtime::Handle::current())
    }

    fn app(token: Option<&str>) -> App {
        app_over(Arc::new(Silent), token)
    }

    fn save(app: &mut App) {
        app.handle_key(KeyEvent::new(KeyCode::Char('s'), KeyModifiers::CONTROL));
    }

    /// Let spawned tasks run up to their first await on the transport.
    async fn settle() {
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
    }

    fn press(app: &mut App, code: KeyCode) {
        app.handle_key(KeyEvent::new(code, KeyModifiers::NONE));
    }

    fn provider(id: u64, name: &str) -> Provider {
        Provider {
            id: Some(EntityId(id)),
            name: Some(name.to_string()),
            ..Provider::default()
        }
    }

    // ── Session gate ──────────────────────────────────────────────────────────

    #[tokio::test]
    async fn starts_on_login_without_a_token() {
        let app = app(None);
        assert_eq!(app.route, Route::Login);
        assert!(matches!(app.screen, Screen::Login(_)));
    }

    #[tokio::test]
    async fn starts_on_providers_with_a_token() {
        let app = app(Some("t"));
        assert_eq!(app.route, Route::Providers);
        match &app.screen {
            Screen::Providers(list) => assert!(list.screen.loading),
            _ => panic!("expected the providers list"),
        }
    }

    #[tokio::test]
    async fn pasted_token_logs_in_and_logout_returns_to_login() {
        let mut app = app(None);
        for _ in 0..2 {
            press(&mut app, KeyCode::Tab);
        }
        for c in "abc".chars() {
            press(&mut app, KeyCode::Char(c));
        }
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.route, Route::Providers);

        press(&mut app, KeyCode::Char('L'));
        assert_eq!(app.route, Route::Login);
        app.navigate(Route::Patients);
        assert_eq!(app.route, Route::Login);
    }

    #[tokio::test]
    async fn login_needs_credentials_or_a_token() {
        let mut app = app(None);
        press(&mut app, KeyCode::Enter);
        match &app.screen {
            Screen::Login(view) => assert_eq!(
                view.error.as_deref(),
                Some("Username and password are required")
            ),
            _ => panic!("expected login"),
        }
    }

    // ── Task results ──────────────────────────────────────────────────────────

    #[tokio::test]
    async fn results_for_a_screen_already_left_are_dropped() {
        let mut app = app(Some("t"));
        let stale = app.generation;
        press(&mut app, KeyCode::Char('3'));
        assert_eq!(app.route, Route::Patients);

        app.tx
            .send(Envelope {
                generation: stale,
                message: Message::Patients(Ok(vec![Patient::default()])),
            })
            .unwrap();
        app.drain();

        match &app.screen {
            Screen::Patients(list) => {
                assert!(list.screen.items.is_empty());
                assert!(list.screen.loading);
            }
            _ => panic!("expected the patients list"),
        }
    }

    #[tokio::test]
    async fn current_results_fill_the_list_and_delete_asks_first() {
        let mut app = app(Some("t"));
        app.tx
            .send(Envelope {
                generation: app.generation,
                message: Message::Providers(Ok(vec![provider(1, "Acme"), provider(2, "Birch")])),
            })
            .unwrap();
        app.drain();

        press(&mut app, KeyCode::Down);
        press(&mut app, KeyCode::Char('d'));
        let confirmation = app.confirm.clone().expect("delete asks for confirmation");
        assert!(confirmation.prompt.contains("delete this provider"));

        // Declining closes the dialog and keeps the rows.
        press(&mut app, KeyCode::Char('n'));
        assert!(app.confirm.is_none());
        match &app.screen {
            Screen::Providers(list) => assert_eq!(list.screen.items.len(), 2),
            _ => panic!("expected the providers list"),
        }
    }

    #[tokio::test]
    async fn enter_opens_the_selected_record() {
        let mut app = app(Some("t"));
        app.tx
            .send(Envelope {
                generation: app.generation,
                message: Message::Providers(Ok(vec![provider(7, "Acme")])),
            })
            .unwrap();
        app.drain();

        press(&mut app, KeyCode::Enter);
        assert_eq!(app.route, Route::ProviderView(EntityId(7)));

        press(&mut app, KeyCode::Esc);
        assert_eq!(app.route, Route::Providers);
    }

    #[tokio::test]
    async fn saved_form_redirects_after_the_delay() {
        let mut app = app(Some("t"));
        app.navigate(Route::ProviderNew);
        for c in "Acme".chars() {
            press(&mut app, KeyCode::Char(c));
        }
        app.handle_key(KeyEvent::new(KeyCode::Char('s'), KeyModifiers::CONTROL));
        match &app.screen {
            Screen::Form(view) => assert!(view.form.submitting),
            _ => panic!("expected the provider form"),
        }

        app.tx
            .send(Envelope {
                generation: app.generation,
                message: Message::Saved(Ok(None)),
            })
            .unwrap();
        app.drain();

        assert!(app.redirect_pending());
        match &app.screen {
            Screen::Form(view) => {
                assert_eq!(view.form.success.as_deref(), Some("Provider created successfully!"))
            }
            _ => panic!("expected the provider form"),
        }
        app.redirect = Some((std::time::Instant::now(), Route::Providers));
        app.tick();
        assert_eq!(app.route, Route::Providers);
    }

    #[tokio::test]
    async fn form_sends_once_while_saving() {
        let sent = Arc::new(AtomicUsize::new(0));
        let mut app = app_over(Arc::new(Counting(sent.clone())), Some("t"));
        app.navigate(Route::ProviderNew);
        settle().await;
        let before = sent.load(Ordering::SeqCst);

        press(&mut app, KeyCode::Char('A'));
        save(&mut app);
        save(&mut app);
        press(&mut app, KeyCode::Enter);
        settle().await;

        assert_eq!(sent.load(Ordering::SeqCst), before + 1);
    }

    #[tokio::test]
    async fn saved_form_ignores_submit_until_redirect() {
        let mut app = app(Some("t"));
        app.navigate(Route::ProviderNew);
        press(&mut app, KeyCode::Char('A'));
        save(&mut app);
        app.tx
            .send(Envelope {
                generation: app.generation,
                message: Message::Saved(Ok(None)),
            })
            .unwrap();
        app.drain();

        save(&mut app);
        match &app.screen {
            Screen::Form(view) => {
                assert!(!view.form.submitting);
                assert!(view.form.success.is_some());
            }
            _ => panic!("expected the provider form"),
        }
    }

    // ── Helpers ───────────────────────────────────────────────────────────────

    #[test]
    fn cycle_wraps_through_none() {
        let options = [EntityId(4), EntityId(9)];
        assert_eq!(cycle(&options, None, true), Some(EntityId(4)));
        assert_eq!(cycle(&options, Some(EntityId(4)), true), Some(EntityId(9)));
        assert_eq!(cycle(&options, Some(EntityId(9)), true), None);
        assert_eq!(cycle(&options, None, false), Some(EntityId(9)));
        assert_eq!(cycle(&[], None, true), None);
    }

    #[test]
    fn esc_walks_up_one_level() {
        assert_eq!(parent(Route::ProviderEdit(EntityId(3))), Route::ProviderView(EntityId(3)));
        assert_eq!(parent(Route::SendReferral(EntityId(3))), Route::ProviderView(EntityId(3)));
        assert_eq!(parent(Route::ReferralEdit(EntityId(5))), Route::ReferralView(EntityId(5)));
        assert_eq!(parent(Route::PatientView(EntityId(1))), Route::Patients);
        assert_eq!(parent(Route::Practitioners), Route::Practitioners);
    }

    #[test]
    fn typing_edits_the_focused_value() {
        let mut values = FormValues::default();
        edit_value(&mut values, "name", Some('A'));
        edit_value(&mut values, "name", Some('b'));
        edit_value(&mut values, "name", None);
        assert_eq!(values.get("name"), "A");
    }
}
