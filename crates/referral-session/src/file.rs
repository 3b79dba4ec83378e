//! File-backed implementation of `TokenStore`.
//!
//! The file is a flat JSON object of string keys, the on-disk counterpart
//! of browser local storage. Only the configured key is touched; any other
//! keys in the file are preserved across `save` and `clear`.

use std::{
    fs,
    path::{Path, PathBuf},
};

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use referral_contracts::error::{ReferralError, ReferralResult};
use referral_core::traits::TokenStore;

/// A token store persisted as one key in a JSON key/value file.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
    key: String,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>, key: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            key: key.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the whole file. A missing file is an empty map.
    fn read_map(&self) -> ReferralResult<Map<String, Value>> {
        let contents = self.read_contents()?;
        self.parse(&contents)
    }

    /// The map to write back into. A file that does not parse is replaced.
    fn writable_map(&self) -> ReferralResult<Map<String, Value>> {
        let contents = self.read_contents()?;
        match self.parse(&contents) {
            Ok(map) => Ok(map),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "replacing unreadable token file");
                Ok(Map::new())
            }
        }
    }

    fn read_contents(&self) -> ReferralResult<String> {
        match fs::read_to_string(&self.path) {
            Ok(c) => Ok(c),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(ReferralError::Storage {
                reason: format!("failed to read '{}': {}", self.path.display(), e),
            }),
        }
    }

    fn parse(&self, contents: &str) -> ReferralResult<Map<String, Value>> {
        if contents.trim().is_empty() {
            return Ok(Map::new());
        }
        match serde_json::from_str::<Value>(contents) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(ReferralError::Storage {
                reason: format!("'{}' does not hold a JSON object", self.path.display()),
            }),
            Err(e) => Err(ReferralError::Storage {
                reason: format!("'{}' is not valid JSON: {}", self.path.display(), e),
            }),
        }
    }

    /// Replace the file with `map`, via a sibling temp file and a rename.
    fn write_map(&self, map: &Map<String, Value>) -> ReferralResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| ReferralError::Storage {
                reason: format!("failed to create '{}': {}", parent.display(), e),
            })?;
        }

        let body = serde_json::to_string_pretty(map).map_err(|e| ReferralError::Storage {
            reason: format!("failed to encode token file: {}", e),
        })?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, body)
            .and_then(|_| fs::rename(&tmp, &self.path))
            .map_err(|e| ReferralError::Storage {
                reason: format!("failed to write '{}': {}", self.path.display(), e),
            })
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> ReferralResult<Option<String>> {
        let map = self.read_map()?;
        let token = match map.get(&self.key) {
            Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
            Some(Value::String(_)) | Some(Value::Null) | None => None,
            Some(other) => {
                warn!(key = %self.key, value = %other, "stored token is not a string; ignoring");
                None
            }
        };
        debug!(path = %self.path.display(), found = token.is_some(), "token file read");
        Ok(token)
    }

    fn save(&self, token: &str) -> ReferralResult<()> {
        let mut map = self.writable_map()?;
        map.insert(self.key.clone(), Value::String(token.to_string()));
        self.write_map(&map)?;
        info!(path = %self.path.display(), key = %self.key, "token saved");
        Ok(())
    }

    fn clear(&self) -> ReferralResult<()> {
        let contents = self.read_contents()?;
        let mut map = match self.parse(&contents) {
            Ok(map) => map,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "replacing unreadable token file");
                return self.write_map(&Map::new());
            }
        };
        if map.remove(&self.key).is_none() {
            debug!(key = %self.key, "no token to clear");
            return Ok(());
        }
        self.write_map(&map)?;
        info!(path = %self.path.display(), key = %self.key, "token removed");
        Ok(())
    }
}
