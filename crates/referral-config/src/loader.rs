//! Loading and resolving `ClientConfig`.
//!
//! Resolution order:
//!
//! 1. An explicit path (`--config`), else `REFERRALS_CONFIG`, else defaults.
//! 2. `REFERRALS_API_URL` replaces `api.base_url`.
//! 3. The result is validated; anything unusable is a `Config` error.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use tracing::{debug, info};

use referral_contracts::error::{ReferralError, ReferralResult};

use crate::schema::ClientConfig;

pub const CONFIG_ENV: &str = "REFERRALS_CONFIG";
pub const API_URL_ENV: &str = "REFERRALS_API_URL";

impl ClientConfig {
    /// Parse `s` as TOML.
    ///
    /// Returns `ReferralError::Config` if the TOML is malformed, does not
    /// match the schema, or fails validation.
    pub fn from_toml_str(s: &str) -> ReferralResult<Self> {
        let config: ClientConfig = toml::from_str(s).map_err(|e| ReferralError::Config {
            reason: format!("failed to parse config TOML: {}", e),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Read the file at `path` and parse it as TOML.
    pub fn from_file(path: &Path) -> ReferralResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| ReferralError::Config {
            reason: format!("failed to read config file '{}': {}", path.display(), e),
        })?;
        let config = Self::from_toml_str(&contents)?;
        info!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Resolve the configuration from `explicit`, the process environment,
    /// and defaults.
    pub fn load(explicit: Option<&Path>) -> ReferralResult<Self> {
        Self::load_with(explicit, |key| std::env::var(key).ok())
    }

    /// `load` with an injectable environment lookup.
    pub fn load_with<F>(explicit: Option<&Path>, env: F) -> ReferralResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let from_env = env(CONFIG_ENV).filter(|p| !p.is_empty()).map(PathBuf::from);
        let mut config = match explicit.map(Path::to_path_buf).or(from_env) {
            Some(path) => Self::from_file(&path)?,
            None => {
                debug!("no config file given; using defaults");
                ClientConfig::default()
            }
        };

        if let Some(url) = env(API_URL_ENV).filter(|u| !u.is_empty()) {
            debug!(base_url = %url, "api.base_url overridden from environment");
            config.api.base_url = url;
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> ReferralResult<()> {
        let url = &self.api.base_url;
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ReferralError::Config {
                reason: format!("api.base_url must be an http(s) URL, got '{}'", url),
            });
        }
        if !self.api.token_path.starts_with('/') {
            return Err(ReferralError::Config {
                reason: format!("api.token_path must start with '/', got '{}'", self.api.token_path),
            });
        }
        if self.session.token_key.trim().is_empty() {
            return Err(ReferralError::Config {
                reason: "session.token_key must not be empty".to_string(),
            });
        }
        Ok(())
    }

    // ── Accessors ────────────────────────────────────────────────────────────

    pub fn timeout(&self) -> Option<Duration> {
        self.api.timeout_secs.map(Duration::from_secs)
    }

    pub fn redirect_delay(&self) -> Duration {
        Duration::from_millis(self.ui.redirect_delay_ms)
    }

    pub fn referral_redirect_delay(&self) -> Duration {
        Duration::from_millis(self.ui.referral_redirect_delay_ms)
    }

    /// The token file, with `~/` expanded, or the platform default.
    pub fn token_file(&self) -> ReferralResult<PathBuf> {
        match &self.session.token_file {
            Some(path) => expand_home(path),
            None => dirs::data_dir()
                .map(|dir| dir.join("referrals").join("storage.json"))
                .ok_or_else(|| ReferralError::Config {
                    reason: "no data directory on this platform; set session.token_file".to_string(),
                }),
        }
    }
}

fn expand_home(path: &Path) -> ReferralResult<PathBuf> {
    match path.strip_prefix("~") {
        Ok(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .ok_or_else(|| ReferralError::Config {
                reason: format!("cannot expand '{}': no home directory", path.display()),
            }),
        Err(_) => Ok(path.to_path_buf()),
    }
}
