//! Durable key-value storage for the calendar connection state.
//!
//! A single JSON file holds the OAuth client credentials, the current token
//! payload, and the "connected" flag. Writes go through a temp file and
//! rename for atomicity; on unix the file gets 0600 permissions. A
//! malformed file is repaired by deletion and treated as absent, never
//! surfaced to callers.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{CalendarError, CalendarResult};

/// The on-disk shape of the connection state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersistedState {
    /// OAuth client identifier. Absent means the system is unconfigured.
    #[serde(default)]
    pub client_id: Option<String>,

    /// OAuth client secret, if the operator provided one.
    #[serde(default)]
    pub client_secret: Option<String>,

    /// The current token payload as raw JSON.
    ///
    /// Kept untyped here so that a malformed payload can be detected and
    /// repaired by the token manager without failing the whole state load.
    #[serde(default)]
    pub token: Option<serde_json::Value>,

    /// Whether the account is considered connected.
    #[serde(default)]
    pub connected: bool,
}

/// File-backed store for [`PersistedState`].
#[derive(Debug)]
pub struct StateStore {
    path: PathBuf,
    state: RwLock<PersistedState>,
}

impl StateStore {
    /// Opens the store at the given path, loading any existing state.
    ///
    /// A missing file yields the default (unconfigured) state. An
    /// unparseable file is deleted and also yields the default state.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let state = Self::read_state(&path);
        Self {
            path,
            state: RwLock::new(state),
        }
    }

    fn read_state(path: &Path) -> PersistedState {
        if !path.exists() {
            debug!("no state file at {:?}", path);
            return PersistedState::default();
        }

        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                warn!("failed to read state file {:?}: {}", path, e);
                return PersistedState::default();
            }
        };

        match serde_json::from_str(&content) {
            Ok(state) => {
                debug!("loaded state from {:?}", path);
                state
            }
            Err(e) => {
                warn!("malformed state file {:?} ({}), deleting", path, e);
                let _ = fs::remove_file(path);
                PersistedState::default()
            }
        }
    }

    /// Returns the store path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns a snapshot of the current state.
    pub fn get(&self) -> PersistedState {
        self.state.read().expect("state lock poisoned").clone()
    }

    /// Re-reads the state from disk, replacing the in-memory copy.
    ///
    /// Used to pick up writes made by another process sharing the file.
    pub fn reload(&self) -> PersistedState {
        let state = Self::read_state(&self.path);
        *self.state.write().expect("state lock poisoned") = state.clone();
        state
    }

    /// Mutates the state and persists the result.
    pub fn update<F>(&self, mutate: F) -> CalendarResult<()>
    where
        F: FnOnce(&mut PersistedState),
    {
        let snapshot = {
            let mut state = self.state.write().expect("state lock poisoned");
            mutate(&mut state);
            state.clone()
        };
        self.save(&snapshot)
    }

    fn save(&self, state: &PersistedState) -> CalendarResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                CalendarError::internal(format!("failed to create state directory: {}", e))
            })?;
        }

        let content = serde_json::to_string_pretty(state)
            .map_err(|e| CalendarError::internal(format!("failed to serialize state: {}", e)))?;

        // Temp file then rename, so readers never see a partial write.
        let temp_path = self.path.with_extension("json.tmp");
        fs::write(&temp_path, &content)
            .map_err(|e| CalendarError::internal(format!("failed to write state file: {}", e)))?;
        fs::rename(&temp_path, &self.path)
            .map_err(|e| CalendarError::internal(format!("failed to rename state file: {}", e)))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o600);
            let _ = fs::set_permissions(&self.path, perms);
        }

        debug!("saved state to {:?}", self.path);
        Ok(())
    }

    /// Returns the configured client id, if any.
    pub fn client_id(&self) -> Option<String> {
        self.state
            .read()
            .expect("state lock poisoned")
            .client_id
            .clone()
    }

    /// Returns the configured client secret, if any.
    pub fn client_secret(&self) -> Option<String> {
        self.state
            .read()
            .expect("state lock poisoned")
            .client_secret
            .clone()
    }

    /// Stores the client id.
    pub fn set_client_id(&self, client_id: impl Into<String>) -> CalendarResult<()> {
        let client_id = client_id.into();
        info!("updating OAuth client id");
        self.update(|state| state.client_id = Some(client_id))
    }

    /// Stores the client secret.
    pub fn set_client_secret(&self, client_secret: impl Into<String>) -> CalendarResult<()> {
        let client_secret = client_secret.into();
        self.update(|state| state.client_secret = Some(client_secret))
    }

    /// Deletes the state file and resets the in-memory state.
    #[cfg(test)]
    pub fn wipe(&self) {
        *self.state.write().expect("state lock poisoned") = PersistedState::default();
        let _ = fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> StateStore {
        StateStore::open(dir.path().join("calendar-state.json"))
    }

    #[test]
    fn open_without_file_yields_default() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let state = store.get();
        assert!(state.client_id.is_none());
        assert!(state.token.is_none());
        assert!(!state.connected);
    }

    #[test]
    fn update_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("calendar-state.json");

        let store = StateStore::open(&path);
        store.set_client_id("abc").unwrap();
        store
            .update(|state| {
                state.connected = true;
                state.token = Some(serde_json::json!({"accessToken": "tok"}));
            })
            .unwrap();

        let reopened = StateStore::open(&path);
        let state = reopened.get();
        assert_eq!(state.client_id.as_deref(), Some("abc"));
        assert!(state.connected);
        assert!(state.token.is_some());
    }

    #[test]
    fn malformed_file_is_deleted_and_treated_as_absent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("calendar-state.json");
        fs::write(&path, "{ not json").unwrap();

        let store = StateStore::open(&path);
        assert!(store.get().client_id.is_none());
        assert!(!path.exists());
    }

    #[test]
    fn reload_picks_up_external_writes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("calendar-state.json");

        let writer = StateStore::open(&path);
        let reader = StateStore::open(&path);

        writer.set_client_id("external").unwrap();
        assert!(reader.get().client_id.is_none());

        let state = reader.reload();
        assert_eq!(state.client_id.as_deref(), Some("external"));
    }

    #[cfg(unix)]
    #[test]
    fn state_file_has_restrictive_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("calendar-state.json");
        let store = StateStore::open(&path);
        store.set_client_id("abc").unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
