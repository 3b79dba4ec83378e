//! # referral-config
//!
//! TOML-driven configuration for the referral desk front-ends.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use referral_config::ClientConfig;
//!
//! let config = ClientConfig::load(cli.config.as_deref())?;
//! let transport = HttpTransport::new(&config.api.base_url, config.timeout())?;
//! ```
//!
//! ## Sources
//!
//! A file named by `--config` or `REFERRALS_CONFIG`, then the
//! `REFERRALS_API_URL` override. With neither, the defaults point at a local
//! development API on `http://127.0.0.1:8000/api`.

pub mod loader;
pub mod schema;

pub use schema::{ApiConfig, ClientConfig, SessionConfig, UiConfig};

// ── Tests ─────────────────────────────────────────────────────────────────────
