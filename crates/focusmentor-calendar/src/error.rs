//! Error types for calendar integration operations.

use std::fmt;
use thiserror::Error;

/// The category of a calendar error.
///
/// High-level classification used for retry decisions and user messaging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CalendarErrorCode {
    /// No OAuth client id configured - requires user action, never retried.
    NotConfigured,
    /// No token or an expired token - triggers a re-auth prompt, not retried.
    NotAuthenticated,
    /// The provider rejected the token or scopes (401/403) - retried a
    /// bounded number of times, then the connection is downgraded.
    AuthorizationDenied,
    /// Network error - connection failed, timeout, DNS resolution.
    Network,
    /// Rate limit exceeded - too many requests.
    RateLimited,
    /// Server returned a 5xx error.
    Server,
    /// Unparseable or unexpected response from the provider.
    InvalidResponse,
    /// Internal error - unexpected state, bug.
    Internal,
}

impl CalendarErrorCode {
    /// Returns true if this error is transient and the operation may be
    /// retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network | Self::RateLimited | Self::Server)
    }

    /// Returns true if this error signals an authentication/authorization
    /// failure that the events retry loop may recover from by refreshing or
    /// reloading the token.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Self::NotAuthenticated | Self::AuthorizationDenied)
    }

    /// Returns a stable machine-readable name for this code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotConfigured => "not_configured",
            Self::NotAuthenticated => "not_authenticated",
            Self::AuthorizationDenied => "authorization_denied",
            Self::Network => "network_error",
            Self::RateLimited => "rate_limited",
            Self::Server => "server_error",
            Self::InvalidResponse => "invalid_response",
            Self::Internal => "internal_error",
        }
    }
}

impl fmt::Display for CalendarErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An error from the calendar integration layer.
#[derive(Debug, Error)]
pub struct CalendarError {
    code: CalendarErrorCode,
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl CalendarError {
    /// Creates a new error with the given code and message.
    pub fn new(code: CalendarErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Creates a not-configured error.
    pub fn not_configured(message: impl Into<String>) -> Self {
        Self::new(CalendarErrorCode::NotConfigured, message)
    }

    /// Creates a not-authenticated error.
    pub fn not_authenticated(message: impl Into<String>) -> Self {
        Self::new(CalendarErrorCode::NotAuthenticated, message)
    }

    /// Creates an authorization-denied error.
    pub fn authorization_denied(message: impl Into<String>) -> Self {
        Self::new(CalendarErrorCode::AuthorizationDenied, message)
    }

    /// Creates a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(CalendarErrorCode::Network, message)
    }

    /// Creates a rate-limit error.
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(CalendarErrorCode::RateLimited, message)
    }

    /// Creates a server error.
    pub fn server(message: impl Into<String>) -> Self {
        Self::new(CalendarErrorCode::Server, message)
    }

    /// Creates an invalid-response error.
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(CalendarErrorCode::InvalidResponse, message)
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(CalendarErrorCode::Internal, message)
    }

    /// Sets the source error.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    /// Returns the error code.
    pub fn code(&self) -> CalendarErrorCode {
        self.code
    }

    /// Returns the error message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns true if this error is an auth failure eligible for the
    /// bounded retry path.
    pub fn is_auth_failure(&self) -> bool {
        self.code.is_auth_failure()
    }

    /// Returns true if this error is transient and may be retried.
    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }
}

impl fmt::Display for CalendarError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// A specialized Result type for calendar operations.
pub type CalendarResult<T> = Result<T, CalendarError>;
