//! Referral desk command-line client.
//!
//! Every screen of the desk is reachable as a subcommand. The login token is
//! stored in the same file the TUI uses, so both front-ends share a session.
//!
//! Usage:
//!   referrals login --username admin --password secret
//!   referrals providers list
//!   referrals providers show 3
//!   referrals providers create --set name="Acme Clinic" --set city=Denver
//!   referrals providers send-referral 3 --patient 12 --to 4 --reason "Cardiology consult"
//!   referrals referrals show 9
//!   referrals --json patients list

mod commands;
mod output;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use referral_contracts::entity::EntityId;

// ── CLI definition ────────────────────────────────────────────────────────────

/// Referral desk: manage providers, practitioners, patients, and referrals.
#[derive(Parser)]
#[command(
    name = "referrals",
    version,
    about = "Command-line client for the patient referral API",
    long_about = "Lists, views, creates, edits, and deletes providers, practitioners,\n\
                  and patients, and sends patient referrals between providers."
)]
pub struct Cli {
    /// Config file (defaults to $REFERRALS_CONFIG, then built-in defaults).
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Print records as JSON instead of tables.
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Store a bearer token, or obtain one with a username and password.
    Login(LoginArgs),
    /// Forget the stored token.
    Logout,
    /// Show the API URL, token file, and whether a token is held.
    Status,
    /// Healthcare providers, their practitioners, and outgoing referrals.
    Providers {
        #[command(subcommand)]
        action: ProviderCommand,
    },
    /// Individual practitioners.
    Practitioners {
        #[command(subcommand)]
        action: EntityAction,
    },
    /// Patients.
    Patients {
        #[command(subcommand)]
        action: EntityAction,
    },
    /// Patient referrals.
    Referrals {
        #[command(subcommand)]
        action: ReferralCommand,
    },
}

#[derive(Args)]
pub struct LoginArgs {
    /// A bearer token obtained elsewhere.
    #[arg(long, conflicts_with_all = ["username", "password"])]
    pub token: Option<String>,
    #[arg(long, short)]
    pub username: Option<String>,
    /// Read from stdin when omitted.
    #[arg(long, short, requires = "username")]
    pub password: Option<String>,
}

/// Operations shared by every directory entity.
#[derive(Subcommand)]
pub enum EntityAction {
    /// List every record.
    List,
    /// Show one record with its related data.
    Show { id: EntityId },
    /// Create a record from `--set key=value` pairs.
    Create {
        #[arg(long = "set", value_name = "KEY=VALUE", value_parser = commands::parse_assignment)]
        set: Vec<(String, String)>,
    },
    /// Load a record, apply `--set key=value` pairs, and save it.
    Update {
        id: EntityId,
        #[arg(long = "set", value_name = "KEY=VALUE", value_parser = commands::parse_assignment)]
        set: Vec<(String, String)>,
    },
    /// Delete a record after confirmation.
    Delete {
        id: EntityId,
        /// Skip the confirmation prompt.
        #[arg(long, short)]
        yes: bool,
    },
}

#[derive(Subcommand)]
pub enum ProviderCommand {
    #[command(flatten)]
    Entity(EntityAction),
    /// Attach a practitioner to a provider.
    AddPractitioner {
        provider: EntityId,
        practitioner: EntityId,
    },
    /// Detach a practitioner from a provider after confirmation.
    RemovePractitioner {
        provider: EntityId,
        practitioner: EntityId,
        #[arg(long, short)]
        yes: bool,
    },
    /// Refer a patient from this provider to another.
    SendReferral(SendReferralArgs),
}

#[derive(Args)]
pub struct SendReferralArgs {
    /// Sending provider.
    pub provider: EntityId,
    #[arg(long)]
    pub patient: EntityId,
    /// Receiving provider.
    #[arg(long = "to")]
    pub receiving_provider: EntityId,
    #[arg(long)]
    pub sending_practitioner: Option<EntityId>,
    #[arg(long)]
    pub receiving_practitioner: Option<EntityId>,
    #[arg(long)]
    pub reason: Option<String>,
    #[arg(long)]
    pub notes: Option<String>,
    #[arg(long)]
    pub priority: Option<String>,
}

#[derive(Subcommand)]
pub enum ReferralCommand {
    /// Show a referral with the names of everyone involved.
    Show { id: EntityId },
    /// Load a referral, apply `--set key=value` pairs, and save it.
    Update {
        id: EntityId,
        #[arg(long = "set", value_name = "KEY=VALUE", value_parser = commands::parse_assignment)]
        set: Vec<(String, String)>,
    },
    /// Delete a referral after confirmation.
    Delete {
        id: EntityId,
        #[arg(long, short)]
        yes: bool,
    },
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    // A missing .env is fine.
    let _ = dotenvy::dotenv();

    // Logs go to stderr so `--json` output stays parseable. RUST_LOG=debug for detail.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    if let Err(e) = commands::run(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
