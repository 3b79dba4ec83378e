//! Subcommand handlers.
//!
//! Each handler drives the same screen state the TUI uses, so messages,
//! validation, and fallbacks match between the two front-ends. Every
//! command names the route it stands for and is gated through
//! `referral_core::resolve` before anything is sent.

use std::{
    io::{self, BufRead, Write},
    path::Path,
    sync::Arc,
};

use anyhow::{bail, Context as _};
use serde::Serialize;
use tracing::{debug, info, warn};

use referral_config::ClientConfig;
use referral_contracts::{
    endpoint::Resource,
    entity::{EntityId, Patient, Practitioner, Provider, Record},
    referral::ReferralParty,
};
use referral_core::{
    resolve,
    screens::{
        detail::{
            fetch_patient, fetch_practitioner_detail, fetch_provider_detail, DetailScreen,
            ReferralView,
        },
        form::{EntityForm, FieldSpec, FormMode, FormValues},
        list::ListScreen,
        membership::AddPractitionerForm,
        referral_form::{
            ReferralForm, PATIENT, RECEIVING_PRACTITIONER, RECEIVING_PROVIDER, REFERRAL_FIELDS,
            SENDING_PRACTITIONER,
        },
        Confirmation, SubmitOutcome,
    },
    traits::TokenStore,
    ApiClient, Route, Session,
};
use referral_http::HttpTransport;
use referral_session::FileTokenStore;

use crate::{
    output, Cli, Command, EntityAction, LoginArgs, ProviderCommand, ReferralCommand,
    SendReferralArgs,
};

/// Everything a handler needs: resolved config and a client over the
/// stored session.
pub struct Context {
    config: ClientConfig,
    client: ApiClient,
    json: bool,
}

impl Context {
    /// With `replaces_token` set, an unreadable token file starts the
    /// session signed out instead of failing; the command is about to
    /// overwrite or clear it.
    pub fn build(
        config_path: Option<&Path>,
        json: bool,
        replaces_token: bool,
    ) -> anyhow::Result<Self> {
        let config = ClientConfig::load(config_path)?;
        let store: Arc<dyn TokenStore> = Arc::new(FileTokenStore::new(
            config.token_file()?,
            config.session.token_key.clone(),
        ));
        let session = match Session::restore(store.clone()) {
            Ok(session) => session,
            Err(e) if replaces_token => {
                warn!(error = %e, "ignoring unreadable token file");
                Session::signed_out(store)
            }
            Err(e) => return Err(e.into()),
        };
        let transport = HttpTransport::new(&config.api.base_url, config.timeout())?;
        debug!(base_url = %config.api.base_url, state = ?session.state(), "cli context ready");

        Ok(Self {
            client: ApiClient::new(Arc::new(transport), session),
            config,
            json,
        })
    }

    /// Refuse to run a protected command without a token.
    fn enter(&self, route: Route) -> anyhow::Result<()> {
        let shown = resolve(route, self.client.session().state());
        if shown != route {
            bail!("Not logged in. Run `referrals login` first.");
        }
        debug!(route = %route, "entering");
        Ok(())
    }

    fn emit<T: Serialize>(&self, value: &T, render: impl FnOnce(&T)) -> anyhow::Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            render(value);
        }
        Ok(())
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let replaces_token = matches!(cli.command, Command::Login(_) | Command::Logout);
    let ctx = Context::build(cli.config.as_deref(), cli.json, replaces_token)?;

    match cli.command {
        Command::Login(args) => login(&ctx, args).await,
        Command::Logout => logout(&ctx),
        Command::Status => status(&ctx),
        Command::Providers { action } => match action {
            ProviderCommand::Entity(action) => entity(&ctx, Resource::Providers, action).await,
            ProviderCommand::AddPractitioner {
                provider,
                practitioner,
            } => add_practitioner(&ctx, provider, practitioner).await,
            ProviderCommand::RemovePractitioner {
                provider,
                practitioner,
                yes,
            } => {
                ctx.enter(Route::ProviderView(provider))?;
                let confirmation = Confirmation::remove_practitioner(provider, practitioner);
                confirm_and_apply(&ctx, &confirmation, yes, "Practitioner removed.").await
            }
            ProviderCommand::SendReferral(args) => send_referral(&ctx, args).await,
        },
        Command::Practitioners { action } => entity(&ctx, Resource::Practitioners, action).await,
        Command::Patients { action } => entity(&ctx, Resource::Patients, action).await,
        Command::Referrals { action } => referral(&ctx, action).await,
    }
}

// ── Session ───────────────────────────────────────────────────────────────────

async fn login(ctx: &Context, args: LoginArgs) -> anyhow::Result<()> {
    let session = ctx.client.session();
    match (args.token, args.username) {
        (Some(token), _) => session.login(&token)?,
        (None, Some(username)) => {
            let password = match args.password {
                Some(p) => p,
                None => prompt("Password: ")?,
            };
            ctx.client
                .login(&ctx.config.api.token_path, &username, &password)
                .await
                .map_err(|e| anyhow::anyhow!(e.user_message("Login failed")))?;
        }
        (None, None) => bail!("pass --token, or --username with --password"),
    }
    info!("logged in");
    println!("Logged in.");
    Ok(())
}

fn logout(ctx: &Context) -> anyhow::Result<()> {
    ctx.client.session().logout()?;
    println!("Logged out.");
    Ok(())
}

fn status(ctx: &Context) -> anyhow::Result<()> {
    let state = ctx.client.session().state();
    output::print_fields(&[
        ("API", ctx.config.api.base_url.clone()),
        ("Token file", ctx.config.token_file()?.display().to_string()),
        ("Session", format!("{:?}", state)),
    ]);
    Ok(())
}

// ── Directory entities ────────────────────────────────────────────────────────

async fn entity(ctx: &Context, resource: Resource, action: EntityAction) -> anyhow::Result<()> {
    match action {
        EntityAction::List => match resource {
            Resource::Providers => list::<Provider>(ctx, resource, output::providers_table).await,
            Resource::Practitioners => {
                list::<Practitioner>(ctx, resource, output::practitioners_table).await
            }
            _ => list::<Patient>(ctx, resource, output::patients_table).await,
        },
        EntityAction::Show { id } => show(ctx, resource, id).await,
        EntityAction::Create { set } => save(ctx, resource, FormMode::New, set).await,
        EntityAction::Update { id, set } => save(ctx, resource, FormMode::Edit(id), set).await,
        EntityAction::Delete { id, yes } => {
            ctx.enter(Route::list(resource))?;
            let message = format!("{} deleted.", resource.title());
            confirm_and_apply(ctx, &Confirmation::delete(resource, id), yes, &message).await
        }
    }
}

async fn list<T>(ctx: &Context, resource: Resource, render: fn(&[T])) -> anyhow::Result<()>
where
    T: serde::de::DeserializeOwned + Record + Serialize,
{
    ctx.enter(Route::list(resource))?;
    let mut screen = ListScreen::<T>::new(resource);
    screen.load(&ctx.client).await;
    if let Some(error) = screen.error {
        bail!(error);
    }
    if screen.items.is_empty() && !ctx.json {
        println!("No {} found.", resource.segment());
        return Ok(());
    }
    ctx.emit(&screen.items, |items| render(items))
}

async fn show(ctx: &Context, resource: Resource, id: EntityId) -> anyhow::Result<()> {
    ctx.enter(Route::view(resource, id))?;
    match resource {
        Resource::Providers => {
            let mut screen = DetailScreen::new(resource, id);
            screen.begin();
            screen.finish(fetch_provider_detail(&ctx.client, id).await);
            let detail = loaded(screen)?;
            ctx.emit(&detail, |d| {
                output::provider_fields(&d.provider);
                output::section("Practitioners");
                if d.practitioners.is_empty() {
                    println!("No practitioners associated with this provider.");
                } else {
                    output::practitioners_table(&d.practitioners);
                }
                output::section("Referrals Sent");
                output::referrals_table(&d.referrals_sent, ReferralParty::ReceivingProvider);
                output::section("Referrals Received");
                output::referrals_table(&d.referrals_received, ReferralParty::SendingProvider);
            })
        }
        Resource::Practitioners => {
            let mut screen = DetailScreen::new(resource, id);
            screen.begin();
            screen.finish(fetch_practitioner_detail(&ctx.client, id).await);
            let detail = loaded(screen)?;
            ctx.emit(&detail, |d| {
                output::practitioner_fields(&d.practitioner);
                output::section("Referrals Sent");
                output::referrals_table(&d.referrals_sent, ReferralParty::ReceivingProvider);
                output::section("Referrals Received");
                output::referrals_table(&d.referrals_received, ReferralParty::SendingProvider);
            })
        }
        _ => {
            let mut screen = DetailScreen::new(resource, id);
            screen.begin();
            screen.finish(fetch_patient(&ctx.client, id).await);
            let patient = loaded(screen)?;
            ctx.emit(&patient, output::patient_fields)
        }
    }
}

/// The screen's data, or its error as a failure.
fn loaded<T>(screen: DetailScreen<T>) -> anyhow::Result<T> {
    match (screen.data, screen.error) {
        (Some(data), _) => Ok(data),
        (None, Some(error)) => bail!(error),
        (None, None) => bail!("Not found"),
    }
}

async fn save(
    ctx: &Context,
    resource: Resource,
    mode: FormMode,
    set: Vec<(String, String)>,
) -> anyhow::Result<()> {
    let route = match mode {
        FormMode::New => Route::parse(&format!("/{}/new", resource.segment())),
        FormMode::Edit(id) => Route::parse(&format!("/{}/{}/edit", resource.segment(), id)),
    }
    .context("no form route for this resource")?;
    ctx.enter(route)?;

    let mut form = EntityForm::new(resource, mode).with_redirect_delay(ctx.config.redirect_delay());
    form.load(&ctx.client).await;
    if let Some(error) = form.error.take() {
        bail!(error);
    }
    apply_assignments(&mut form.values, form.fields, &set)?;

    let outcome = form.submit(&ctx.client).await;
    finish(outcome, form.error)
}

// ── Provider extras ───────────────────────────────────────────────────────────

async fn add_practitioner(
    ctx: &Context,
    provider: EntityId,
    practitioner: EntityId,
) -> anyhow::Result<()> {
    ctx.enter(Route::AddPractitioner(provider))?;
    let mut form = AddPractitionerForm::new(provider).with_redirect_delay(ctx.config.redirect_delay());
    form.selected = Some(practitioner);
    let outcome = form.submit(&ctx.client).await;
    finish(outcome, form.error)
}

async fn send_referral(ctx: &Context, args: SendReferralArgs) -> anyhow::Result<()> {
    ctx.enter(Route::SendReferral(args.provider))?;
    let mut form = ReferralForm::send_from(args.provider)
        .with_redirect_delay(ctx.config.referral_redirect_delay());
    form.select(PATIENT, Some(args.patient));
    form.select(RECEIVING_PROVIDER, Some(args.receiving_provider));
    form.select(SENDING_PRACTITIONER, args.sending_practitioner);
    form.select(RECEIVING_PRACTITIONER, args.receiving_practitioner);
    for (key, value) in [
        ("reason", args.reason),
        ("notes", args.notes),
        ("priority", args.priority),
    ] {
        if let Some(value) = value {
            form.values.set(key, value);
        }
    }

    let outcome = form.submit(&ctx.client).await;
    finish(outcome, form.error)
}

// ── Referrals ─────────────────────────────────────────────────────────────────

async fn referral(ctx: &Context, action: ReferralCommand) -> anyhow::Result<()> {
    match action {
        ReferralCommand::Show { id } => {
            ctx.enter(Route::ReferralView(id))?;
            let mut view = ReferralView::new(id);
            view.load(&ctx.client).await;
            let names_loading = view.names_loading;
            let referral = loaded(view.screen)?;
            ctx.emit(&referral, |r| output::referral_fields(r, names_loading))
        }
        ReferralCommand::Update { id, set } => {
            ctx.enter(Route::ReferralEdit(id))?;
            let mut form =
                ReferralForm::edit(id).with_redirect_delay(ctx.config.referral_redirect_delay());
            form.load(&ctx.client).await;
            if let Some(error) = form.error.take() {
                bail!(error);
            }
            apply_assignments(&mut form.values, REFERRAL_FIELDS, &set)?;
            let outcome = form.submit(&ctx.client).await;
            finish(outcome, form.error)
        }
        ReferralCommand::Delete { id, yes } => {
            ctx.enter(Route::ReferralView(id))?;
            let confirmation = Confirmation::delete(Resource::PatientReferrals, id);
            confirm_and_apply(ctx, &confirmation, yes, "Referral deleted.").await
        }
    }
}

// ── Shared helpers ────────────────────────────────────────────────────────────

/// clap value parser for `--set key=value`.
pub fn parse_assignment(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", raw))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing key in '{}'", raw));
    }
    Ok((key.to_string(), value.to_string()))
}

/// Write `--set` pairs into form values. Keys may use any spelling the
/// field accepts.
fn apply_assignments(
    values: &mut FormValues,
    fields: &'static [FieldSpec],
    set: &[(String, String)],
) -> anyhow::Result<()> {
    for (key, value) in set {
        let Some(spec) = fields
            .iter()
            .find(|f| f.key == key.as_str() || f.aliases.contains(&key.as_str()))
        else {
            let known: Vec<&str> = fields.iter().map(|f| f.key).collect();
            bail!("unknown field '{}' (expected one of: {})", key, known.join(", "));
        };
        values.set(spec.key, value.clone());
    }
    Ok(())
}

fn finish(outcome: Option<SubmitOutcome>, error: Option<String>) -> anyhow::Result<()> {
    match outcome {
        Some(outcome) => {
            println!("{}", outcome.message);
            println!("Next: {}", outcome.redirect);
            Ok(())
        }
        None => bail!(error.unwrap_or_else(|| "Request failed".to_string())),
    }
}

async fn confirm_and_apply(
    ctx: &Context,
    confirmation: &Confirmation,
    yes: bool,
    done: &str,
) -> anyhow::Result<()> {
    let accepted = yes || ask(&confirmation.prompt)?;
    let applied = confirmation
        .resolve(&ctx.client, accepted)
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message("Request failed")))?;
    if applied {
        println!("{}", done);
    } else {
        println!("Cancelled.");
    }
    Ok(())
}

/// y/N question on stdin; anything but "y" or "yes" declines.
fn ask(question: &str) -> anyhow::Result<bool> {
    let answer = prompt(&format!("{} [y/N] ", question))?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

fn prompt(label: &str) -> anyhow::Result<String> {
    let mut stdout = io::stdout();
    write!(stdout, "{}", label)?;
    stdout.flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use clap::{CommandFactory, Parser};

    use referral_contracts::entity::EntityId;
    use referral_core::screens::form::{FormValues, PRACTITIONER_FIELDS, PROVIDER_FIELDS};

    use super::{apply_assignments, parse_assignment, Context};
    use crate::{Cli, Command, EntityAction, ProviderCommand};

    // ── Helpers ───────────────────────────────────────────────────────────────

    /// A config file whose token file holds `token_contents`.
    fn config_with_token_file(dir: &tempfile::TempDir, token_contents: &str) -> std::path::PathBuf {
        let token_file = dir.path().join("storage.json");
        std::fs::write(&token_file, token_contents).unwrap();
        let config = dir.path().join("referrals.toml");
        std::fs::write(
            &config,
            format!("[session]\ntoken_file = {:?}\n", token_file.display().to_string()),
        )
        .unwrap();
        config
    }

    // ── Context ───────────────────────────────────────────────────────────────

    #[test]
    fn corrupt_token_file_only_blocks_commands_that_read_it() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_with_token_file(&dir, "not json");

        assert!(Context::build(Some(&config), false, false).is_err());

        let ctx = Context::build(Some(&config), false, true).unwrap();
        assert!(!ctx.client.session().is_authenticated());
        ctx.client.session().login("fresh").unwrap();
        ctx.client.session().logout().unwrap();
    }

    #[test]
    fn stored_token_is_restored() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_with_token_file(&dir, r#"{ "jwt_token": "abc" }"#);

        let ctx = Context::build(Some(&config), false, false).unwrap();
        assert!(ctx.client.session().is_authenticated());
    }

    // ── Argument parsing ──────────────────────────────────────────────────────

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn assignments_split_on_the_first_equals() {
        assert_eq!(
            parse_assignment("notes=a=b").unwrap(),
            ("notes".to_string(), "a=b".to_string())
        );
        assert_eq!(parse_assignment("name=").unwrap(), ("name".to_string(), String::new()));
        assert!(parse_assignment("name").is_err());
        assert!(parse_assignment("=x").is_err());
    }

    #[test]
    fn provider_subcommands_flatten_entity_actions() {
        let cli = Cli::try_parse_from(["referrals", "providers", "delete", "4", "--yes"]).unwrap();
        match cli.command {
            Command::Providers {
                action: ProviderCommand::Entity(EntityAction::Delete { id, yes }),
            } => {
                assert_eq!(id, EntityId(4));
                assert!(yes);
            }
            _ => panic!("parsed to the wrong command"),
        }
    }

    #[test]
    fn send_referral_requires_patient_and_receiver() {
        assert!(Cli::try_parse_from(["referrals", "providers", "send-referral", "3"]).is_err());
        let cli = Cli::try_parse_from([
            "referrals",
            "providers",
            "send-referral",
            "3",
            "--patient",
            "12",
            "--to",
            "4",
        ]);
        assert!(cli.is_ok());
    }

    #[test]
    fn token_and_username_login_are_exclusive() {
        let both = Cli::try_parse_from(["referrals", "login", "--token", "t", "--username", "u"]);
        assert!(both.is_err());
    }

    // ── Field assignment ──────────────────────────────────────────────────────

    #[test]
    fn assignments_accept_field_aliases() {
        let mut values = FormValues::default();
        let set = vec![
            ("name".to_string(), "Dr. Adams".to_string()),
            ("jobTitle".to_string(), "Surgeon".to_string()),
        ];

        apply_assignments(&mut values, PRACTITIONER_FIELDS, &set).unwrap();

        assert_eq!(values.get("name"), "Dr. Adams");
        assert_eq!(values.get("job_title"), "Surgeon");
    }

    #[test]
    fn unknown_fields_are_rejected_with_the_valid_keys() {
        let mut values = FormValues::default();
        let set = vec![("colour".to_string(), "blue".to_string())];

        let err = apply_assignments(&mut values, PROVIDER_FIELDS, &set).unwrap_err();

        let message = err.to_string();
        assert!(message.contains("unknown field 'colour'"), "{}", message);
        assert!(message.contains("address_line1"), "{}", message);
    }
}
