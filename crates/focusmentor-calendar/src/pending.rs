//! Pending sign-in state for OAuth callback correlation.
//!
//! Each authorization URL carries an opaque `state` parameter. The registry
//! maps it back to the initiating request (and, for the bot, to a chat user)
//! when the redirect arrives. A state value is consumable at most once and
//! expires after a fixed window whether or not it was used.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::Rng as _;
use tracing::{debug, trace};

/// A sign-in attempt awaiting its OAuth callback.
#[derive(Debug, Clone)]
pub struct PendingAuthState {
    /// The opaque correlation value embedded in the authorization URL.
    pub state: String,
    /// Bot user that initiated the sign-in, if any.
    pub owner_id: Option<i64>,
    /// When the attempt was registered (monotonic clock).
    pub created_at: Instant,
}

impl PendingAuthState {
    /// Returns true if this attempt is past the given expiry window.
    pub fn is_expired(&self, ttl: Duration) -> bool {
        self.created_at.elapsed() >= ttl
    }
}

/// Registry of pending sign-in attempts keyed by state value.
#[derive(Debug)]
pub struct PendingAuthRegistry {
    ttl: Duration,
    entries: RwLock<HashMap<String, PendingAuthState>>,
}

impl PendingAuthRegistry {
    /// Creates a registry with the given expiry window.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Registers a new pending attempt and returns its state value.
    ///
    /// Attempts tied to a bot user get a `telegram-{owner}-{nonce}` state so
    /// the callback can be mapped back to the chat; anonymous attempts get a
    /// bare nonce.
    pub fn issue(&self, owner_id: Option<i64>) -> String {
        let nonce = Self::generate_nonce();
        let state = match owner_id {
            Some(owner) => format!("telegram-{}-{}", owner, nonce),
            None => nonce,
        };

        let entry = PendingAuthState {
            state: state.clone(),
            owner_id,
            created_at: Instant::now(),
        };
        self.entries
            .write()
            .expect("pending lock poisoned")
            .insert(state.clone(), entry);

        debug!(owner_id = ?owner_id, "registered pending sign-in");
        state
    }

    /// Consumes the entry for the given state value.
    ///
    /// Returns `None` for unknown, already-consumed, or expired states; an
    /// expired entry is removed without being handed out.
    pub fn consume(&self, state: &str) -> Option<PendingAuthState> {
        let mut entries = self.entries.write().expect("pending lock poisoned");
        let entry = entries.remove(state)?;
        if entry.is_expired(self.ttl) {
            debug!("pending sign-in state expired before use");
            return None;
        }
        Some(entry)
    }

    /// Removes all expired entries, returning how many were dropped.
    pub fn evict_expired(&self) -> usize {
        let mut entries = self.entries.write().expect("pending lock poisoned");
        let before = entries.len();
        let ttl = self.ttl;
        entries.retain(|state, entry| {
            let keep = !entry.is_expired(ttl);
            if !keep {
                trace!(state = %state, "evicting expired pending sign-in");
            }
            keep
        });
        before - entries.len()
    }

    /// Returns the number of outstanding attempts.
    pub fn len(&self) -> usize {
        self.entries.read().expect("pending lock poisoned").len()
    }

    /// Returns true if no attempts are outstanding.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn generate_nonce() -> String {
        let mut rng = rand::rng();
        let bytes: Vec<u8> = (0..16).map(|_| rng.random()).collect();
        URL_SAFE_NO_PAD.encode(&bytes)
    }
}
