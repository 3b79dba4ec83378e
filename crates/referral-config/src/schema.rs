//! Configuration schema.
//!
//! Every key is optional; a missing table or key takes the default shown in
//! the example below.
//!
//! ```toml
//! [api]
//! base_url = "http://127.0.0.1:8000/api"
//! token_path = "/token/"
//! timeout_secs = 30
//!
//! [session]
//! token_file = "~/.local/share/referrals/storage.json"
//! token_key = "jwt_token"
//!
//! [ui]
//! redirect_delay_ms = 1500
//! referral_redirect_delay_ms = 1200
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000/api";
pub const DEFAULT_TOKEN_PATH: &str = "/token/";
pub const DEFAULT_TOKEN_KEY: &str = "jwt_token";

/// Where the REST API lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ApiConfig {
    /// Origin plus path prefix; endpoint paths are appended to it.
    pub base_url: String,

    /// Path the username / password exchange is POSTed to.
    pub token_path: String,

    /// Per-request timeout. No timeout when absent.
    pub timeout_secs: Option<u64>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            token_path: DEFAULT_TOKEN_PATH.to_string(),
            timeout_secs: None,
        }
    }
}

/// Where the bearer token is kept between runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// JSON key/value file. Defaults to `<data dir>/referrals/storage.json`.
    /// A leading `~/` is expanded to the home directory.
    pub token_file: Option<PathBuf>,

    /// Key the token is stored under.
    pub token_key: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            token_file: None,
            token_key: DEFAULT_TOKEN_KEY.to_string(),
        }
    }
}

/// Front-end timings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UiConfig {
    /// Pause between a successful entity form submit and the redirect.
    pub redirect_delay_ms: u64,

    /// Same, for the referral form.
    pub referral_redirect_delay_ms: u64,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            redirect_delay_ms: 1500,
            referral_redirect_delay_ms: 1200,
        }
    }
}

/// The top-level structure deserialized from a TOML config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    pub api: ApiConfig,
    pub session: SessionConfig,
    pub ui: UiConfig,
}
