//! OAuth authorization-code flow controller.
//!
//! Drives a connection attempt through its phases:
//!
//! ```text
//! Unconfigured -(set credentials)-> Disconnected -(sign_in)-> Pending
//! Pending -(callback success)-> Connected
//! Pending -(callback error | timeout)-> Disconnected
//! Connected -(sign_out | expiry | repeated 401/403)-> Disconnected
//! ```
//!
//! The callback arrives out-of-band relative to `sign_in`; correlation runs
//! through the pending-state registry, never call-stack ordering. User-facing
//! outcomes go over the notice channel handed in at construction.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info, warn};

use crate::api::IdentityApi;
use crate::config::CalendarConfig;
use crate::error::{CalendarError, CalendarResult};
use crate::identity::build_auth_url;
use crate::notice::{NoticeSender, UserNotice};
use crate::notifier::ConnectedNotifier;
use crate::pending::PendingAuthRegistry;
use crate::store::StateStore;
use crate::token::TokenManager;

/// Where a connection attempt currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    /// No OAuth client id configured.
    Unconfigured,
    /// Configured but holding no valid token.
    Disconnected,
    /// A sign-in was dispatched and its callback is outstanding.
    Pending,
    /// A valid token is held.
    Connected,
}

/// Query parameters delivered to the OAuth callback endpoint.
#[derive(Debug, Clone, Default)]
pub struct CallbackParams {
    /// Authorization code, present on success.
    pub code: Option<String>,
    /// Correlation state from the authorization URL.
    pub state: Option<String>,
    /// Provider error code, present on failure.
    pub error: Option<String>,
}

/// Title used for every callback failure notice.
const CONNECT_FAILED_TITLE: &str = "Calendar connection failed";

/// Maps a provider callback error code to the fixed user-facing detail text.
pub fn callback_error_detail(code: &str) -> String {
    match code {
        "invalid_client" => {
            "The OAuth client is invalid. Check the configured client id and secret.".to_string()
        }
        "access_denied" => {
            "Access to the calendar was denied. You can retry the connection at any time."
                .to_string()
        }
        other => format!("Sign-in did not complete ({}). Please try again.", other),
    }
}

/// Controller for the OAuth authorization-code flow.
pub struct AuthFlowController {
    config: Arc<CalendarConfig>,
    store: Arc<StateStore>,
    tokens: Arc<TokenManager>,
    identity: Arc<dyn IdentityApi>,
    pending: PendingAuthRegistry,
    notices: NoticeSender,
    notifier: Option<Arc<dyn ConnectedNotifier>>,
    /// Re-entrancy guard: an in-flight connect suppresses new ones.
    connecting: AtomicBool,
}

impl AuthFlowController {
    /// Creates a controller over the given collaborators.
    pub fn new(
        config: Arc<CalendarConfig>,
        store: Arc<StateStore>,
        tokens: Arc<TokenManager>,
        identity: Arc<dyn IdentityApi>,
        notices: NoticeSender,
        notifier: Option<Arc<dyn ConnectedNotifier>>,
    ) -> Self {
        let pending = PendingAuthRegistry::new(config.pending_auth_ttl);
        Self {
            config,
            store,
            tokens,
            identity,
            pending,
            notices,
            notifier,
            connecting: AtomicBool::new(false),
        }
    }

    /// Returns true if an OAuth client id is configured.
    pub fn is_configured(&self) -> bool {
        self.store
            .client_id()
            .is_some_and(|id| !id.is_empty())
    }

    /// Stores the OAuth client id.
    pub fn set_client_id(&self, client_id: impl Into<String>) -> CalendarResult<()> {
        self.store.set_client_id(client_id)
    }

    /// Stores the OAuth client secret.
    pub fn set_client_secret(&self, client_secret: impl Into<String>) -> CalendarResult<()> {
        self.store.set_client_secret(client_secret)
    }

    /// Dispatches a sign-in attempt.
    ///
    /// Returns the authorization URL to present to the user. `Ok(None)`
    /// means a previous attempt is still pending and this call was a
    /// suppressed no-op, not a cancel-and-restart. The actual authentication
    /// outcome arrives later through [`handle_callback`].
    ///
    /// [`handle_callback`]: Self::handle_callback
    pub fn sign_in(&self, owner_id: Option<i64>) -> CalendarResult<Option<String>> {
        // Timed-out attempts free the guard before the check below.
        self.pending.evict_expired();
        if self.pending.is_empty() {
            self.connecting.store(false, Ordering::SeqCst);
        }

        let Some(client_id) = self.store.client_id().filter(|id| !id.is_empty()) else {
            self.notify(UserNotice::error(
                CONNECT_FAILED_TITLE,
                "No OAuth client id is configured. Set one before connecting.",
            ));
            return Err(CalendarError::not_configured("no OAuth client id configured"));
        };

        if self.connecting.swap(true, Ordering::SeqCst) {
            debug!("sign-in already pending, suppressing new attempt");
            return Ok(None);
        }

        let state = self.pending.issue(owner_id);
        let url = build_auth_url(&self.config, &client_id, &state);
        info!(owner_id = ?owner_id, "dispatched sign-in");
        Ok(Some(url))
    }

    /// Handles the OAuth redirect callback.
    ///
    /// Returns `Ok(true)` when a token was obtained and stored, `Ok(false)`
    /// when the callback was rejected (provider error, stale or unknown
    /// state, missing code). Exchange transport failures propagate as
    /// errors. Every rejection emits a user notice.
    pub async fn handle_callback(&self, params: CallbackParams) -> CalendarResult<bool> {
        self.connecting.store(false, Ordering::SeqCst);

        if let Some(error) = params.error {
            warn!(error = %error, "callback reported provider error");
            self.notify(UserNotice::error(
                CONNECT_FAILED_TITLE,
                callback_error_detail(&error),
            ));
            return Ok(false);
        }

        let Some(state) = params.state else {
            self.notify(UserNotice::error(
                CONNECT_FAILED_TITLE,
                "The sign-in response could not be verified. Please start over.",
            ));
            return Ok(false);
        };

        let Some(entry) = self.pending.consume(&state) else {
            warn!("callback state unknown, already used, or expired");
            self.notify(UserNotice::error(
                CONNECT_FAILED_TITLE,
                "This sign-in link has expired. Please start over.",
            ));
            return Ok(false);
        };

        let Some(code) = params.code else {
            self.notify(UserNotice::error(
                CONNECT_FAILED_TITLE,
                "The sign-in response carried no authorization code. Please start over.",
            ));
            return Ok(false);
        };

        let issued = match self.identity.exchange_code(&code).await {
            Ok(issued) => issued,
            Err(e) => {
                self.notify(UserNotice::error(
                    CONNECT_FAILED_TITLE,
                    "The authorization code could not be exchanged. Please try again.",
                ));
                return Err(e);
            }
        };

        self.warn_on_missing_scopes(issued.scope.as_deref());
        self.tokens.handle_issued_token(issued)?;

        if let Some(owner_id) = entry.owner_id {
            if let Some(notifier) = &self.notifier {
                // Out-of-band and best effort; a failed notify must not
                // undo a successful connection.
                if let Err(e) = notifier.calendar_connected(owner_id).await {
                    warn!(owner_id, "bot notify failed: {}", e);
                }
            }
        }

        self.notify(UserNotice::info(
            "Calendar connected",
            "Upcoming events are now available.",
        ));
        info!(owner_id = ?entry.owner_id, "calendar connection established");
        Ok(true)
    }

    /// Convenience wrapper for callers that already extracted code and state.
    pub async fn handle_auth_code(&self, code: &str, state: &str) -> CalendarResult<bool> {
        self.handle_callback(CallbackParams {
            code: Some(code.to_string()),
            state: Some(state.to_string()),
            error: None,
        })
        .await
    }

    /// Signs out: best-effort revocation, then unconditional local clear.
    pub async fn sign_out(&self) -> CalendarResult<bool> {
        if let Some(token) = self.tokens.current() {
            if let Err(e) = self.identity.revoke_token(&token.access_token).await {
                warn!("token revocation failed, clearing locally anyway: {}", e);
            }
        }

        self.tokens.clear()?;
        self.connecting.store(false, Ordering::SeqCst);
        info!("signed out");
        Ok(true)
    }

    /// Returns the current phase of the connection state machine.
    pub fn phase(&self) -> ConnectionPhase {
        if !self.is_configured() {
            return ConnectionPhase::Unconfigured;
        }
        if self.tokens.is_authenticated() {
            return ConnectionPhase::Connected;
        }
        self.pending.evict_expired();
        if self.connecting.load(Ordering::SeqCst) && !self.pending.is_empty() {
            return ConnectionPhase::Pending;
        }
        ConnectionPhase::Disconnected
    }

    fn warn_on_missing_scopes(&self, granted: Option<&str>) {
        let granted: HashSet<&str> = granted.unwrap_or_default().split_whitespace().collect();
        let missing: Vec<&str> = self
            .config
            .scopes
            .iter()
            .map(String::as_str)
            .filter(|scope| !granted.contains(scope))
            .collect();

        if !missing.is_empty() {
            warn!(missing = ?missing, "granted scopes are narrower than requested");
            self.notify(UserNotice::warning(
                "Calendar connected with limits",
                format!(
                    "Some permissions were not granted: {}. Event access may be degraded.",
                    missing.join(", ")
                ),
            ));
        }
    }

    fn notify(&self, notice: UserNotice) {
        // The receiver may be gone during shutdown; that is not an error.
        let _ = self.notices.send(notice);
    }
}
