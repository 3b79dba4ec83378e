//! Trait seams of the referral desk client.
//!
//! - `Transport`: moves one `ApiRequest` over the wire and reports the status
//! - `TokenStore`: persistent storage for the bearer token
//!
//! Everything above these two traits (session, client, screens) is plain
//! logic and is exercised in tests with scripted implementations.

use async_trait::async_trait;

use referral_contracts::{
    error::ReferralResult,
    transport::{ApiRequest, ApiResponse},
};

/// Sends requests to the referral API.
///
/// Implementations must not interpret the status code: a 401 or 500 is a
/// successful `send` that returns an `ApiResponse` with that status. Only
/// failures that produce no response at all (connection refused, timeouts)
/// are returned as `Err(ReferralError::Network)`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: ApiRequest) -> ReferralResult<ApiResponse>;
}

/// Persistent storage for the bearer token under a fixed key.
///
/// The session reads the store once at startup and writes through on
/// login / logout; nothing else touches it.
pub trait TokenStore: Send + Sync {
    /// Return the stored token, or `None` if absent.
    fn load(&self) -> ReferralResult<Option<String>>;

    /// Store `token`, replacing any previous value.
    fn save(&self, token: &str) -> ReferralResult<()>;

    /// Remove the stored token. Clearing an empty store is not an error.
    fn clear(&self) -> ReferralResult<()>;
}
