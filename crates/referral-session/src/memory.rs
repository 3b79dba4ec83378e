//! In-memory implementation of `TokenStore`.
//!
//! Nothing survives the process. Used for `--ephemeral` runs and in tests.
//! Clones share the same slot, so a test can keep one handle and inspect
//! what the session wrote through another.

use std::sync::{Arc, Mutex};

use tracing::debug;

use referral_contracts::error::{ReferralError, ReferralResult};
use referral_core::traits::TokenStore;

/// A token store backed by a shared `Option<String>`.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTokenStore {
    pub(crate) slot: Arc<Mutex<Option<String>>>,
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that already holds `token`.
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(token.into()))),
        }
    }

    fn lock(&self) -> ReferralResult<std::sync::MutexGuard<'_, Option<String>>> {
        self.slot.lock().map_err(|e| ReferralError::Storage {
            reason: format!("token slot lock poisoned: {}", e),
        })
    }
}

impl TokenStore for InMemoryTokenStore {
    fn load(&self) -> ReferralResult<Option<String>> {
        Ok(self.lock()?.clone())
    }

    fn save(&self, token: &str) -> ReferralResult<()> {
        *self.lock()? = Some(token.to_string());
        debug!("token stored in memory");
        Ok(())
    }

    fn clear(&self) -> ReferralResult<()> {
        *self.lock()? = None;
        debug!("in-memory token cleared");
        Ok(())
    }
}
