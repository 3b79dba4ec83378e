//! Referral desk: interactive Ratatui admin front-end.
//!
//! Screens follow the desk's routes: providers, practitioners, and patients
//! lists, their record views and forms, the add-practitioner picker, the
//! referral form, and the login screen. Fetches run on a tokio runtime in
//! the background; the draw loop never waits on the network.
//!
//! Logs go to `tui.log` next to the token file; set `RUST_LOG=debug` for
//! detail.

mod app;
mod ui;

use std::{
    fs::{self, File},
    io,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use anyhow::Context as _;
use clap::Parser;
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::info;
use tracing_subscriber::EnvFilter;

use referral_config::ClientConfig;
use referral_core::{traits::TokenStore, ApiClient, Session};
use referral_http::HttpTransport;
use referral_session::{FileTokenStore, InMemoryTokenStore};

use crate::app::{App, Settings};

#[derive(Parser)]
#[command(name = "referrals-tui", version, about = "Interactive referral desk")]
struct Args {
    /// Config file (defaults to $REFERRALS_CONFIG, then built-in defaults).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Keep the login in memory only; nothing is written to the token file.
    #[arg(long)]
    ephemeral: bool,
}

// ── Logging ───────────────────────────────────────────────────────────────────

/// Send logs to a file; stderr belongs to the terminal UI.
fn init_logging(path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create '{}'", parent.display()))?;
    }
    let file = File::options()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open log file '{}'", path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(false)
        .compact()
        .init();
    Ok(())
}

// ── Terminal setup / teardown ─────────────────────────────────────────────────

fn setup_terminal() -> io::Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> io::Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()
}

// ── Main event loop ───────────────────────────────────────────────────────────

fn run(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> io::Result<()> {
    loop {
        app.drain();
        app.tick();
        terminal.draw(|f| ui::draw(f, app))?;

        if app.should_quit {
            return Ok(());
        }

        if event::poll(app.poll_timeout())? {
            if let Event::Key(key) = event::read()? {
                // Windows also reports releases.
                if key.kind == KeyEventKind::Press {
                    app.handle_key(key);
                }
            }
        }
    }
}

fn main() -> anyhow::Result<()> {
    // A missing .env is fine.
    let _ = dotenvy::dotenv();
    let args = Args::parse();

    let config = ClientConfig::load(args.config.as_deref())?;
    let token_file = config.token_file()?;
    init_logging(&token_file.with_file_name("tui.log"))?;

    let store: Arc<dyn TokenStore> = if args.ephemeral {
        Arc::new(InMemoryTokenStore::new())
    } else {
        Arc::new(FileTokenStore::new(token_file, config.session.token_key.clone()))
    };
    let session = Session::restore(store)?;
    let transport = HttpTransport::new(&config.api.base_url, config.timeout())?;
    let client = ApiClient::new(Arc::new(transport), session);
    info!(base_url = %config.api.base_url, ephemeral = args.ephemeral, "starting");

    let runtime = tokio::runtime::Runtime::new().context("failed to start the async runtime")?;

    // Install a panic hook that restores the terminal before printing the panic.
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        default_hook(info);
    }));

    let mut terminal = setup_terminal()?;
    let mut app = App::new(client, Settings::from_config(&config), runtime.handle().clone());

    let result = run(&mut terminal, &mut app);
    restore_terminal(&mut terminal)?;
    result?;

    // In-flight requests are abandoned.
    runtime.shutdown_background();
    Ok(())
}
