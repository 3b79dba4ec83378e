//! # referral-session
//!
//! Storage backends for the bearer token.
//!
//! ## Overview
//!
//! Both stores implement `referral_core::traits::TokenStore` and are handed
//! to `Session::restore` once at startup:
//!
//! - `FileTokenStore` keeps the token under a fixed key (`jwt_token` by
//!   default) in a JSON key/value file, so a login survives restarts.
//! - `InMemoryTokenStore` forgets everything when the process exits.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use referral_session::FileTokenStore;
//! use referral_core::Session;
//!
//! let store = FileTokenStore::new(config.token_file()?, &config.session.token_key);
//! let session = Session::restore(Arc::new(store))?;
//! ```

pub mod file;
pub mod memory;

pub use file::FileTokenStore;
pub use memory::InMemoryTokenStore;

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::{fs, sync::Arc};

    use serde_json::{json, Value};

    use referral_contracts::error::ReferralError;
    use referral_core::{traits::TokenStore, Session, SessionState};

    use super::{FileTokenStore, InMemoryTokenStore};

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn store_in(dir: &tempfile::TempDir) -> FileTokenStore {
        FileTokenStore::new(dir.path().join("nested").join("storage.json"), "jwt_token")
    }

    fn read_json(store: &FileTokenStore) -> Value {
        serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap()
    }

    // ── FileTokenStore ────────────────────────────────────────────────────────

    #[test]
    fn missing_file_loads_as_no_token() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        assert_eq!(store.load().unwrap(), None);
        // Clearing an absent token does not create the file.
        store.clear().unwrap();
        assert!(!store.path().exists());
    }

    #[test]
    fn save_then_load_round_trips_under_the_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        store.save("header.payload.sig").unwrap();

        assert_eq!(store.load().unwrap().as_deref(), Some("header.payload.sig"));
        assert_eq!(read_json(&store), json!({ "jwt_token": "header.payload.sig" }));
    }

    #[test]
    fn other_keys_survive_save_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), r#"{ "theme": "dark" }"#).unwrap();

        store.save("abc").unwrap();
        store.clear().unwrap();

        assert_eq!(read_json(&store), json!({ "theme": "dark" }));
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn corrupt_file_is_a_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), "not json").unwrap();

        assert!(matches!(store.load(), Err(ReferralError::Storage { .. })));
    }

    #[test]
    fn save_and_clear_replace_a_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();

        fs::write(store.path(), "not json").unwrap();
        store.save("fresh").unwrap();
        assert_eq!(read_json(&store), json!({ "jwt_token": "fresh" }));

        fs::write(store.path(), "not json").unwrap();
        store.clear().unwrap();
        assert_eq!(read_json(&store), json!({}));
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn custom_key_is_respected() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().join("s.json"), "desk_token");

        store.save("t").unwrap();
        assert_eq!(read_json(&store), json!({ "desk_token": "t" }));
    }

    // ── Session over a file store ─────────────────────────────────────────────

    #[test]
    fn login_survives_restart_and_logout_clears() {
        let dir = tempfile::tempdir().unwrap();

        let session = Session::restore(Arc::new(store_in(&dir))).unwrap();
        assert_eq!(session.state(), SessionState::Unauthenticated);
        session.login("persisted").unwrap();

        let restarted = Session::restore(Arc::new(store_in(&dir))).unwrap();
        assert_eq!(restarted.token().unwrap(), "persisted");

        restarted.logout().unwrap();
        let again = Session::restore(Arc::new(store_in(&dir))).unwrap();
        assert_eq!(again.state(), SessionState::Unauthenticated);
    }

    // ── InMemoryTokenStore ────────────────────────────────────────────────────

    #[test]
    fn in_memory_clones_share_the_slot() {
        let store = InMemoryTokenStore::new();
        let observer = store.clone();

        store.save("abc").unwrap();
        assert_eq!(observer.load().unwrap().as_deref(), Some("abc"));

        observer.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn in_memory_with_token_starts_authenticated() {
        let session = Session::restore(Arc::new(InMemoryTokenStore::with_token("seed"))).unwrap();
        assert!(session.is_authenticated());
    }
}
