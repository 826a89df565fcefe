//! OAuth token normalization, validity, and lifecycle management.
//!
//! The [`TokenManager`] exclusively owns the current access token: it is the
//! only component that writes token state, in memory or in the store. Other
//! components read through it.

use std::sync::{Arc, RwLock};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::CalendarResult;
use crate::store::StateStore;

/// A raw token payload as issued by the identity provider.
///
/// Either the relative `expires_in` or the absolute `expiry_timestamp_ms`
/// may be present; normalization fills the absolute stamp from the relative
/// duration when missing.
#[derive(Debug, Clone, Deserialize)]
pub struct IssuedToken {
    /// The access token authorizing calendar reads.
    pub access_token: String,
    /// Token type, usually "Bearer".
    #[serde(default)]
    pub token_type: Option<String>,
    /// Space-separated granted scopes.
    #[serde(default)]
    pub scope: Option<String>,
    /// Relative lifetime in seconds.
    #[serde(default)]
    pub expires_in: Option<i64>,
    /// Absolute expiry as epoch milliseconds, if the payload carries one.
    #[serde(default)]
    pub expiry_timestamp_ms: Option<i64>,
    /// Refresh token for silent renewal, if granted.
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// The normalized, persisted token.
///
/// Serialized in camelCase to match the persisted state contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredToken {
    /// The access token for API requests.
    pub access_token: String,
    /// Token type, usually "Bearer".
    pub token_type: String,
    /// Space-separated granted scopes.
    pub scope: String,
    /// Relative lifetime in seconds at issue time.
    pub expires_in_seconds: i64,
    /// Absolute expiry as epoch milliseconds.
    pub expiry_timestamp: i64,
    /// Refresh token for silent renewal, if granted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl StoredToken {
    /// Default lifetime assumed when the provider sends no expiry at all.
    const FALLBACK_EXPIRES_IN_SECS: i64 = 3600;

    /// Normalizes a raw issued payload into a stored token.
    pub fn from_issued(raw: IssuedToken) -> Self {
        let expires_in = raw.expires_in.unwrap_or(Self::FALLBACK_EXPIRES_IN_SECS);
        let expiry_timestamp = raw
            .expiry_timestamp_ms
            .unwrap_or_else(|| Utc::now().timestamp_millis() + expires_in * 1000);

        Self {
            access_token: raw.access_token,
            token_type: raw.token_type.unwrap_or_else(|| "Bearer".to_string()),
            scope: raw.scope.unwrap_or_default(),
            expires_in_seconds: expires_in,
            expiry_timestamp,
            refresh_token: raw.refresh_token,
        }
    }

    /// Returns true iff the access token is non-empty and unexpired.
    pub fn is_valid(&self) -> bool {
        !self.access_token.is_empty() && self.expiry_timestamp > Utc::now().timestamp_millis()
    }
}

/// Owner of the current access token and its persistence.
#[derive(Debug)]
pub struct TokenManager {
    store: Arc<StateStore>,
    token: RwLock<Option<StoredToken>>,
}

impl TokenManager {
    /// Creates a token manager over the given store.
    pub fn new(store: Arc<StateStore>) -> Self {
        Self {
            store,
            token: RwLock::new(None),
        }
    }

    /// Loads the persisted token into memory.
    ///
    /// Returns false when no token is persisted, when the payload is
    /// malformed (repaired by deletion), or when the token is expired
    /// (also deleted). Never fails: storage problems are logged and treated
    /// as absence.
    pub fn load_from_storage(&self) -> bool {
        // Re-read the file so a token written by another process is seen.
        let state = self.store.reload();

        let Some(value) = state.token else {
            debug!("no persisted token");
            return false;
        };

        let token: StoredToken = match serde_json::from_value(value) {
            Ok(token) => token,
            Err(e) => {
                warn!("malformed persisted token ({}), deleting", e);
                self.delete_persisted_token();
                return false;
            }
        };

        if !token.is_valid() {
            debug!("persisted token is expired, deleting");
            self.delete_persisted_token();
            return false;
        }

        *self.token.write().expect("token lock poisoned") = Some(token);
        true
    }

    /// Normalizes and stores a freshly issued token.
    ///
    /// A missing refresh token in the new payload keeps the previously held
    /// one, so silent renewal stays possible after a plain refresh response.
    pub fn handle_issued_token(&self, raw: IssuedToken) -> CalendarResult<()> {
        let mut token = StoredToken::from_issued(raw);
        if token.refresh_token.is_none() {
            let previous = self.token.read().expect("token lock poisoned");
            token.refresh_token = previous.as_ref().and_then(|t| t.refresh_token.clone());
        }

        let value = serde_json::to_value(&token)
            .map_err(|e| crate::error::CalendarError::internal(format!(
                "failed to serialize token: {}",
                e
            )))?;

        *self.token.write().expect("token lock poisoned") = Some(token);
        self.store.update(|state| {
            state.token = Some(value);
            state.connected = true;
        })?;

        info!("stored issued token");
        Ok(())
    }

    /// Wipes the token from memory and storage and drops the connected flag.
    pub fn clear(&self) -> CalendarResult<()> {
        *self.token.write().expect("token lock poisoned") = None;
        self.store.update(|state| {
            state.token = None;
            state.connected = false;
        })?;
        info!("cleared token state");
        Ok(())
    }

    /// Returns true iff a valid token is held.
    ///
    /// When no token is in memory, a storage reload is attempted first
    /// (cross-process recovery). The persisted connected flag is
    /// resynchronized to the computed result.
    pub fn is_authenticated(&self) -> bool {
        let held = self
            .token
            .read()
            .expect("token lock poisoned")
            .as_ref()
            .is_some_and(StoredToken::is_valid);

        let authenticated = if held { true } else { self.load_from_storage() };

        // Keep the persisted flag honest; expiry can be detected here first.
        if self.store.get().connected != authenticated {
            let _ = self.store.update(|state| state.connected = authenticated);
        }

        authenticated
    }

    /// Returns a clone of the current in-memory token, if any.
    pub fn current(&self) -> Option<StoredToken> {
        self.token.read().expect("token lock poisoned").clone()
    }

    fn delete_persisted_token(&self) {
        let result = self.store.update(|state| {
            state.token = None;
            state.connected = false;
        });
        if let Err(e) = result {
            warn!("failed to delete persisted token: {}", e);
        }
    }
}
