//! Calendar integration configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the calendar integration subsystem.
///
/// Endpoints default to Google's OAuth 2.0 and Calendar v3 services; tests
/// and local development can point them elsewhere. Credentials (client id and
/// secret) are not part of the config: they are operator input persisted in
/// the state store.
#[derive(Debug, Clone)]
pub struct CalendarConfig {
    /// Authorization endpoint the user is sent to for consent.
    pub auth_endpoint: String,

    /// Token endpoint for code exchange and refresh.
    pub token_endpoint: String,

    /// Revocation endpoint used on sign-out.
    pub revoke_endpoint: String,

    /// Base URL of the calendar events API.
    pub events_api_base: String,

    /// Redirect URI registered with the identity provider.
    pub redirect_uri: String,

    /// OAuth scopes to request.
    ///
    /// Defaults to read-only calendar access.
    pub scopes: Vec<String>,

    /// Calendar to read events from.
    pub calendar_id: String,

    /// Path of the persisted connection state file.
    ///
    /// Defaults to `~/.local/share/focusmentor/calendar-state.json`.
    pub state_path: PathBuf,

    /// Base URL of the bot backend for the connected notification, if any.
    pub bot_api_base: Option<String>,

    /// HTTP request timeout.
    pub timeout: Duration,

    /// How far into the future to request events.
    pub fetch_horizon: chrono::Duration,

    /// Minimum interval between upstream event fetches.
    pub min_fetch_interval: Duration,

    /// Total attempts (including the first) for auth-classified fetch
    /// failures.
    pub max_fetch_attempts: u32,

    /// Delay between fetch retry attempts.
    pub retry_delay: Duration,

    /// How long a pending sign-in state stays consumable.
    pub pending_auth_ttl: Duration,
}

impl CalendarConfig {
    /// Default OAuth scope for read-only calendar access.
    pub const DEFAULT_SCOPE: &'static str = "https://www.googleapis.com/auth/calendar.readonly";

    /// Default HTTP timeout in seconds.
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

    /// Creates a configuration with Google defaults and the given redirect
    /// URI.
    pub fn new(redirect_uri: impl Into<String>) -> Self {
        Self {
            auth_endpoint: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            token_endpoint: "https://oauth2.googleapis.com/token".to_string(),
            revoke_endpoint: "https://oauth2.googleapis.com/revoke".to_string(),
            events_api_base: "https://www.googleapis.com/calendar/v3".to_string(),
            redirect_uri: redirect_uri.into(),
            scopes: vec![Self::DEFAULT_SCOPE.to_string()],
            calendar_id: "primary".to_string(),
            state_path: Self::default_state_path(),
            bot_api_base: None,
            timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
            fetch_horizon: chrono::Duration::days(30),
            min_fetch_interval: Duration::from_secs(5),
            max_fetch_attempts: 3,
            retry_delay: Duration::from_secs(1),
            pending_auth_ttl: Duration::from_secs(600),
        }
    }

    /// Returns the default location of the persisted state file.
    pub fn default_state_path() -> PathBuf {
        dirs::home_dir()
            .map(|h| h.join(".local").join("share"))
            .unwrap_or_else(|| PathBuf::from("."))
            .join("focusmentor")
            .join("calendar-state.json")
    }

    /// Sets the state file path.
    pub fn with_state_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.state_path = path.into();
        self
    }

    /// Sets the calendar to read from.
    pub fn with_calendar_id(mut self, id: impl Into<String>) -> Self {
        self.calendar_id = id.into();
        self
    }

    /// Sets the OAuth scopes.
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    /// Sets the bot backend base URL for connected notifications.
    pub fn with_bot_api_base(mut self, base: impl Into<String>) -> Self {
        self.bot_api_base = Some(base.into());
        self
    }

    /// Sets the HTTP timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the forward fetch horizon.
    pub fn with_fetch_horizon(mut self, horizon: chrono::Duration) -> Self {
        self.fetch_horizon = horizon;
        self
    }

    /// Sets the minimum interval between upstream fetches.
    pub fn with_min_fetch_interval(mut self, interval: Duration) -> Self {
        self.min_fetch_interval = interval;
        self
    }

    /// Sets the total fetch attempt bound for auth failures.
    pub fn with_max_fetch_attempts(mut self, attempts: u32) -> Self {
        self.max_fetch_attempts = attempts;
        self
    }

    /// Sets the delay between fetch retries.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Sets the pending sign-in expiry window.
    pub fn with_pending_auth_ttl(mut self, ttl: Duration) -> Self {
        self.pending_auth_ttl = ttl;
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.redirect_uri.is_empty() {
            return Err("redirect_uri is required".to_string());
        }
        if self.scopes.is_empty() {
            return Err("at least one OAuth scope is required".to_string());
        }
        if self.max_fetch_attempts == 0 {
            return Err("max_fetch_attempts must be at least 1".to_string());
        }
        if self.fetch_horizon <= chrono::Duration::zero() {
            return Err("fetch_horizon must be positive".to_string());
        }
        Ok(())
    }
}
