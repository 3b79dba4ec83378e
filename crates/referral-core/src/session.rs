//! The authenticated session.
//!
//! A `Session` is an explicit value handed to the API client and the router.
//! It is created once at startup from a `TokenStore`, flipped to
//! authenticated by `login`, and back by `logout`. The stored token is never
//! re-read behind the session's back: expiry while the app is open is only
//! noticed when the API starts answering 401.

use std::sync::{Arc, RwLock};

use tracing::{debug, info};

use referral_contracts::error::{ReferralError, ReferralResult};

use crate::traits::TokenStore;

/// Whether a token is currently held.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Authenticated,
}

/// Shared handle to the current bearer token.
///
/// Cloning is cheap; all clones observe the same login / logout.
#[derive(Clone)]
pub struct Session {
    store: Arc<dyn TokenStore>,
    token: Arc<RwLock<Option<String>>>,
}

impl Session {
    /// Read the store once and build a session from whatever it holds.
    pub fn restore(store: Arc<dyn TokenStore>) -> ReferralResult<Self> {
        let token = store.load()?.filter(|t| !t.is_empty());
        debug!(authenticated = token.is_some(), "session restored from token store");
        Ok(Self {
            store,
            token: Arc::new(RwLock::new(token)),
        })
    }

    /// A session over `store` that ignores whatever it holds. For callers
    /// about to replace or clear the token anyway.
    pub fn signed_out(store: Arc<dyn TokenStore>) -> Self {
        Self {
            store,
            token: Arc::new(RwLock::new(None)),
        }
    }

    pub fn state(&self) -> SessionState {
        if self.current().is_some() {
            SessionState::Authenticated
        } else {
            SessionState::Unauthenticated
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.state() == SessionState::Authenticated
    }

    /// The bearer token, or `MissingToken` if the session is unauthenticated.
    pub fn token(&self) -> ReferralResult<String> {
        self.current().ok_or(ReferralError::MissingToken)
    }

    /// Persist `token` and mark the session authenticated.
    pub fn login(&self, token: &str) -> ReferralResult<()> {
        if token.trim().is_empty() {
            return Err(ReferralError::Validation {
                field: "token".to_string(),
                reason: "Token must not be empty".to_string(),
            });
        }
        self.store.save(token)?;
        *self.write_lock()? = Some(token.to_string());
        info!("session authenticated");
        Ok(())
    }

    /// Remove the token from storage and mark the session unauthenticated.
    pub fn logout(&self) -> ReferralResult<()> {
        self.store.clear()?;
        *self.write_lock()? = None;
        info!("session cleared");
        Ok(())
    }

    fn current(&self) -> Option<String> {
        // A poisoned lock still holds a valid Option; read through it.
        match self.token.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn write_lock(&self) -> ReferralResult<std::sync::RwLockWriteGuard<'_, Option<String>>> {
        self.token.write().map_err(|e| ReferralError::Storage {
            reason: format!("session lock poisoned: {}", e),
        })
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
