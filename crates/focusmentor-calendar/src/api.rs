//! Trait seams for the identity provider and the calendar events API.
//!
//! The auth flow and the events client depend on these traits rather than on
//! concrete HTTP clients, so test doubles can stand in without a network.
//! The reqwest-backed implementations live in [`crate::identity`] and
//! [`crate::client`].

use std::future::Future;
use std::pin::Pin;

use focusmentor_core::{CalendarEvent, TimeWindow};

use crate::error::CalendarResult;
use crate::token::IssuedToken;

/// A boxed future for object-safe async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Token-lifecycle operations against the identity provider.
pub trait IdentityApi: Send + Sync {
    /// Exchanges an authorization code for a token.
    ///
    /// This is the secret-bearing step and runs server-side only.
    fn exchange_code<'a>(&'a self, code: &'a str) -> BoxFuture<'a, CalendarResult<IssuedToken>>;

    /// Obtains a fresh access token from a refresh token.
    fn refresh_token<'a>(
        &'a self,
        refresh_token: &'a str,
    ) -> BoxFuture<'a, CalendarResult<IssuedToken>>;

    /// Revokes a token with the provider. Best effort on sign-out.
    fn revoke_token<'a>(&'a self, token: &'a str) -> BoxFuture<'a, CalendarResult<()>>;
}

/// Read-only access to the calendar events endpoint.
pub trait CalendarApi: Send + Sync {
    /// Lists events within the window, pre-sorted by start time ascending
    /// with recurring events expanded to single instances.
    fn list_events<'a>(
        &'a self,
        access_token: &'a str,
        window: TimeWindow,
        max_results: usize,
    ) -> BoxFuture<'a, CalendarResult<Vec<CalendarEvent>>>;
}
