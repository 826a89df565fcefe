//! The single entry point for the calendar integration.
//!
//! [`CalendarService`] owns the store, token manager, auth controller, and
//! events client, and wires them together explicitly at construction. All
//! callers (chat handlers, the web layer) go through this facade; nothing
//! reaches into the internals.

use std::sync::Arc;

use tracing::debug;

use focusmentor_core::CalendarEvent;

use crate::api::{CalendarApi, IdentityApi};
use crate::auth::{AuthFlowController, CallbackParams, ConnectionPhase};
use crate::client::GoogleEventsClient;
use crate::config::CalendarConfig;
use crate::error::{CalendarError, CalendarResult};
use crate::events::EventsClient;
use crate::identity::GoogleIdentityClient;
use crate::notice::{NoticeReceiver, NoticeSender, notice_channel};
use crate::notifier::{ConnectedNotifier, HttpBotNotifier};
use crate::store::StateStore;
use crate::token::TokenManager;

/// Facade over the calendar integration subsystem.
pub struct CalendarService {
    tokens: Arc<TokenManager>,
    auth: AuthFlowController,
    events: EventsClient,
}

impl CalendarService {
    /// Builds a service with production HTTP clients.
    ///
    /// Returns the service together with the receiving half of the notice
    /// channel; the caller owns rendering notices to the user. Any
    /// previously persisted token is loaded immediately, so a restart
    /// resumes a connected session.
    pub fn new(config: CalendarConfig) -> CalendarResult<(Self, NoticeReceiver)> {
        config
            .validate()
            .map_err(|e| CalendarError::internal(format!("invalid configuration: {}", e)))?;

        let config = Arc::new(config);
        let store = Arc::new(StateStore::open(&config.state_path));
        let identity: Arc<dyn IdentityApi> = Arc::new(GoogleIdentityClient::new(
            Arc::clone(&config),
            Arc::clone(&store),
        ));
        let calendar: Arc<dyn CalendarApi> =
            Arc::new(GoogleEventsClient::new(Arc::clone(&config)));
        let notifier: Option<Arc<dyn ConnectedNotifier>> = config
            .bot_api_base
            .as_ref()
            .map(|base| {
                Arc::new(HttpBotNotifier::new(base.clone(), config.timeout))
                    as Arc<dyn ConnectedNotifier>
            });

        let (sender, receiver) = notice_channel();
        let service = Self::from_parts(config, store, identity, calendar, notifier, sender);
        Ok((service, receiver))
    }

    /// Builds a service from explicit collaborators.
    ///
    /// Used by tests to substitute in-process doubles for the HTTP clients.
    pub fn from_parts(
        config: Arc<CalendarConfig>,
        store: Arc<StateStore>,
        identity: Arc<dyn IdentityApi>,
        calendar: Arc<dyn CalendarApi>,
        notifier: Option<Arc<dyn ConnectedNotifier>>,
        notices: NoticeSender,
    ) -> Self {
        let tokens = Arc::new(TokenManager::new(Arc::clone(&store)));
        if tokens.load_from_storage() {
            debug!("resumed persisted calendar session");
        }

        let auth = AuthFlowController::new(
            Arc::clone(&config),
            store,
            Arc::clone(&tokens),
            Arc::clone(&identity),
            notices,
            notifier,
        );
        let events = EventsClient::new(config, Arc::clone(&tokens), identity, calendar);

        Self {
            tokens,
            auth,
            events,
        }
    }

    /// Returns true if an OAuth client id is configured.
    pub fn is_configured(&self) -> bool {
        self.auth.is_configured()
    }

    /// Stores the OAuth client id.
    pub fn set_client_id(&self, client_id: impl Into<String>) -> CalendarResult<()> {
        self.auth.set_client_id(client_id)
    }

    /// Stores the OAuth client secret.
    pub fn set_client_secret(&self, client_secret: impl Into<String>) -> CalendarResult<()> {
        self.auth.set_client_secret(client_secret)
    }

    /// Dispatches a sign-in attempt, optionally tied to a bot user.
    ///
    /// See [`AuthFlowController::sign_in`] for the return contract.
    pub fn sign_in(&self, owner_id: Option<i64>) -> CalendarResult<Option<String>> {
        self.auth.sign_in(owner_id)
    }

    /// Handles the OAuth redirect callback.
    pub async fn handle_callback(&self, params: CallbackParams) -> CalendarResult<bool> {
        self.auth.handle_callback(params).await
    }

    /// Handles an already-extracted authorization code and state.
    pub async fn handle_auth_code(&self, code: &str, state: &str) -> CalendarResult<bool> {
        self.auth.handle_auth_code(code, state).await
    }

    /// Disconnects the calendar: best-effort revocation, then local clear.
    pub async fn sign_out(&self) -> CalendarResult<bool> {
        self.auth.sign_out().await
    }

    /// Returns true iff a valid token is held.
    pub fn is_authenticated(&self) -> bool {
        self.tokens.is_authenticated()
    }

    /// Reloads the persisted token, returning whether one is now held.
    pub fn load_token_from_storage(&self) -> bool {
        self.tokens.load_from_storage()
    }

    /// Returns the current connection phase.
    pub fn phase(&self) -> ConnectionPhase {
        self.auth.phase()
    }

    /// Returns upcoming events, at most `max_results`, throttled and with
    /// bounded auth recovery.
    pub async fn get_upcoming_events(
        &self,
        max_results: usize,
    ) -> CalendarResult<Vec<CalendarEvent>> {
        self.events.get_upcoming_events(max_results).await
    }
}
