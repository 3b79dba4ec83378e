//! Error types for the referral desk client.
//!
//! All fallible operations return `ReferralResult<T>`. Variants follow the
//! four failure classes a screen has to render: a missing token, a rejected
//! token, a non-OK response, and transport or decode failures.

use thiserror::Error;

/// The unified error type for the referral desk client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReferralError {
    /// No bearer token is stored. Raised before any request is sent.
    #[error("No authentication token found")]
    MissingToken,

    /// The API answered 401. The session is left as-is; no auto-logout.
    #[error("Authentication failed. Please login again.")]
    AuthenticationFailed,

    /// The API answered with any other non-OK status.
    ///
    /// `message` is the server-supplied message when present, otherwise a
    /// generic message for the operation that failed.
    #[error("{message}")]
    Http { status: u16, message: String },

    /// The request never produced a response (connection refused, DNS, ...).
    #[error("network error: {reason}")]
    Network { reason: String },

    /// A response arrived but its body could not be read as expected.
    #[error("invalid response body: {reason}")]
    Decode { reason: String },

    /// A form field is missing or cannot be parsed. No request was sent.
    #[error("{reason}")]
    Validation { field: String, reason: String },

    /// A configuration value is missing or invalid.
    #[error("configuration error: {reason}")]
    Config { reason: String },

    /// The token store could not be read or written.
    #[error("token storage error: {reason}")]
    Storage { reason: String },
}

impl ReferralError {
    /// The text a screen shows for this error.
    ///
    /// Transport and decode failures are reduced to `fallback`; every other
    /// variant already carries a user-facing message.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            ReferralError::Network { .. } | ReferralError::Decode { .. } => fallback.to_string(),
            other => other.to_string(),
        }
    }
}

/// Convenience alias used throughout the referral crates.
pub type ReferralResult<T> = Result<T, ReferralError>;
