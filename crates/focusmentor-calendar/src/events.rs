//! Upcoming-events retrieval with throttling and bounded auth recovery.
//!
//! One fetch at a time: a second caller arriving while a fetch is in flight
//! gets an error instead of a duplicate upstream request. Fetches closer
//! together than the configured minimum interval are served from the last
//! result without touching the network.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, info, warn};

use focusmentor_core::{CalendarEvent, TimeWindow};

use crate::api::{CalendarApi, IdentityApi};
use crate::config::CalendarConfig;
use crate::error::{CalendarError, CalendarResult};
use crate::token::TokenManager;

/// The most recent successful fetch.
#[derive(Debug, Default)]
struct FetchCache {
    fetched_at: Option<Instant>,
    events: Vec<CalendarEvent>,
}

/// Retrieves upcoming events for the connected calendar.
pub struct EventsClient {
    config: Arc<CalendarConfig>,
    tokens: Arc<TokenManager>,
    identity: Arc<dyn IdentityApi>,
    calendar: Arc<dyn CalendarApi>,
    fetching: AtomicBool,
    cache: Mutex<FetchCache>,
}

/// Resets the fetch flag when the fetch scope exits, including on error.
struct FetchGuard<'a>(&'a AtomicBool);

impl Drop for FetchGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl EventsClient {
    /// Creates an events client over the given collaborators.
    pub fn new(
        config: Arc<CalendarConfig>,
        tokens: Arc<TokenManager>,
        identity: Arc<dyn IdentityApi>,
        calendar: Arc<dyn CalendarApi>,
    ) -> Self {
        Self {
            config,
            tokens,
            identity,
            calendar,
            fetching: AtomicBool::new(false),
            cache: Mutex::new(FetchCache::default()),
        }
    }

    /// Returns upcoming events within the configured horizon, at most
    /// `max_results`, in the provider's start-time order.
    ///
    /// Calls within the minimum fetch interval of the previous success are
    /// answered from that result without an upstream request. On 401/403 the
    /// client retries up to the configured attempt bound, renewing
    /// credentials between attempts; exhaustion clears the token so the next
    /// call reports a clean disconnected state.
    pub async fn get_upcoming_events(
        &self,
        max_results: usize,
    ) -> CalendarResult<Vec<CalendarEvent>> {
        if let Some(cached) = self.throttled(max_results)? {
            return Ok(cached);
        }

        if self.fetching.swap(true, Ordering::SeqCst) {
            return Err(CalendarError::internal("an event fetch is already in progress"));
        }
        let _guard = FetchGuard(&self.fetching);

        if !self.tokens.is_authenticated() {
            return Err(CalendarError::not_authenticated("calendar is not connected"));
        }

        let window = TimeWindow::from_now(Utc::now(), self.config.fetch_horizon);
        let events = self.fetch_with_retry(window, max_results).await?;

        {
            let mut cache = self.cache.lock().expect("cache lock poisoned");
            cache.fetched_at = Some(Instant::now());
            cache.events = events.clone();
        }

        Ok(truncated(events, max_results))
    }

    /// Serves the cached result if the last fetch is fresh enough.
    ///
    /// Authentication is still rechecked, so an expired token surfaces on
    /// the throttled path too instead of being masked by the cache.
    fn throttled(&self, max_results: usize) -> CalendarResult<Option<Vec<CalendarEvent>>> {
        let cache = self.cache.lock().expect("cache lock poisoned");
        let fresh = cache
            .fetched_at
            .is_some_and(|at| at.elapsed() < self.config.min_fetch_interval);
        if !fresh {
            return Ok(None);
        }

        if !self.tokens.is_authenticated() {
            return Err(CalendarError::not_authenticated("calendar is not connected"));
        }

        debug!("serving events from the last fetch");
        Ok(Some(truncated(cache.events.clone(), max_results)))
    }

    async fn fetch_with_retry(
        &self,
        window: TimeWindow,
        max_results: usize,
    ) -> CalendarResult<Vec<CalendarEvent>> {
        let max_attempts = self.config.max_fetch_attempts.max(1);

        for attempt in 1..=max_attempts {
            let Some(token) = self.tokens.current() else {
                break;
            };

            match self
                .calendar
                .list_events(&token.access_token, window, max_results)
                .await
            {
                Ok(events) => {
                    debug!(attempt, count = events.len(), "event fetch succeeded");
                    return Ok(events);
                }
                Err(e) if e.is_auth_failure() && attempt < max_attempts => {
                    warn!(attempt, "event fetch rejected ({}), renewing credentials", e);
                    tokio::time::sleep(self.config.retry_delay).await;
                    self.renew_credentials().await;
                }
                Err(e) if e.is_auth_failure() => {
                    warn!(
                        "event fetch still rejected after {} attempts, disconnecting",
                        max_attempts
                    );
                    self.tokens.clear()?;
                    return Err(CalendarError::authorization_denied(
                        "calendar access was rejected repeatedly; please reconnect",
                    ));
                }
                Err(e) => return Err(e),
            }
        }

        // Only reachable when the token vanished mid-retry.
        self.tokens.clear()?;
        Err(CalendarError::not_authenticated("calendar is not connected"))
    }

    /// Tries to obtain working credentials between attempts.
    ///
    /// A held refresh token gets a silent refresh; otherwise the persisted
    /// state is re-read in case another process renewed the token. Failures
    /// here are logged and left for the next attempt to surface.
    async fn renew_credentials(&self) {
        let refresh_token = self
            .tokens
            .current()
            .and_then(|token| token.refresh_token);

        if let Some(refresh_token) = refresh_token {
            match self.identity.refresh_token(&refresh_token).await {
                Ok(issued) => {
                    if let Err(e) = self.tokens.handle_issued_token(issued) {
                        warn!("failed to store refreshed token: {}", e);
                    } else {
                        info!("silently refreshed access token");
                        return;
                    }
                }
                Err(e) => warn!("silent token refresh failed: {}", e),
            }
        }

        self.tokens.load_from_storage();
    }
}

fn truncated(mut events: Vec<CalendarEvent>, max_results: usize) -> Vec<CalendarEvent> {
    events.truncate(max_results);
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use chrono::TimeZone;
    use tempfile::TempDir;
    use tokio::sync::Notify;

    use focusmentor_core::EventTime;

    use crate::api::BoxFuture;
    use crate::error::CalendarErrorCode;
    use crate::store::StateStore;
    use crate::token::IssuedToken;

    fn event(id: &str, hour: u32) -> CalendarEvent {
        let start = Utc.with_ymd_and_hms(2026, 3, 15, hour, 0, 0).unwrap();
        let end = start + chrono::Duration::hours(1);
        CalendarEvent::new(
            id,
            format!("event {}", id),
            EventTime::from_utc(start),
            EventTime::from_utc(end),
        )
    }

    /// Scripted calendar backend: pops one result per call, repeats the
    /// last entry once the script runs out.
    struct ScriptedCalendar {
        script: Mutex<Vec<CalendarResult<Vec<CalendarEvent>>>>,
        calls: AtomicUsize,
        gate: Option<Arc<Notify>>,
    }

    impl ScriptedCalendar {
        fn new(script: Vec<CalendarResult<Vec<CalendarEvent>>>) -> Self {
            Self {
                script: Mutex::new(script),
                calls: AtomicUsize::new(0),
                gate: None,
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl CalendarApi for ScriptedCalendar {
        fn list_events<'a>(
            &'a self,
            _access_token: &'a str,
            _window: TimeWindow,
            _max_results: usize,
        ) -> BoxFuture<'a, CalendarResult<Vec<CalendarEvent>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut script = self.script.lock().unwrap();
            let result = if script.len() > 1 {
                script.remove(0)
            } else {
                clone_result(&script[0])
            };
            let gate = self.gate.clone();
            Box::pin(async move {
                if let Some(gate) = gate {
                    gate.notified().await;
                }
                result
            })
        }
    }

    fn clone_result(
        result: &CalendarResult<Vec<CalendarEvent>>,
    ) -> CalendarResult<Vec<CalendarEvent>> {
        match result {
            Ok(events) => Ok(events.clone()),
            Err(e) => Err(match e.code() {
                CalendarErrorCode::NotAuthenticated => {
                    CalendarError::not_authenticated(e.message())
                }
                CalendarErrorCode::AuthorizationDenied => {
                    CalendarError::authorization_denied(e.message())
                }
                _ => CalendarError::internal(e.message()),
            }),
        }
    }

    struct MockIdentity {
        refreshes: AtomicUsize,
    }

    impl MockIdentity {
        fn new() -> Self {
            Self {
                refreshes: AtomicUsize::new(0),
            }
        }
    }

    impl IdentityApi for MockIdentity {
        fn exchange_code<'a>(
            &'a self,
            _code: &'a str,
        ) -> BoxFuture<'a, CalendarResult<IssuedToken>> {
            Box::pin(async move { Err(CalendarError::internal("not used in these tests")) })
        }

        fn refresh_token<'a>(
            &'a self,
            _refresh_token: &'a str,
        ) -> BoxFuture<'a, CalendarResult<IssuedToken>> {
            self.refreshes.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move {
                Ok(IssuedToken {
                    access_token: "refreshed-token".to_string(),
                    token_type: Some("Bearer".to_string()),
                    scope: None,
                    expires_in: Some(3600),
                    expiry_timestamp_ms: None,
                    refresh_token: None,
                })
            })
        }

        fn revoke_token<'a>(&'a self, _token: &'a str) -> BoxFuture<'a, CalendarResult<()>> {
            Box::pin(async move { Ok(()) })
        }
    }

    struct Fixture {
        _dir: TempDir,
        client: EventsClient,
        tokens: Arc<TokenManager>,
        calendar: Arc<ScriptedCalendar>,
        identity: Arc<MockIdentity>,
    }

    fn fixture(
        config: CalendarConfig,
        calendar: ScriptedCalendar,
        with_refresh_token: bool,
    ) -> Fixture {
        let dir = TempDir::new().unwrap();
        let config = Arc::new(config.with_state_path(dir.path().join("state.json")));
        let store = Arc::new(StateStore::open(&config.state_path));
        let tokens = Arc::new(TokenManager::new(store));
        let calendar = Arc::new(calendar);
        let identity = Arc::new(MockIdentity::new());

        tokens
            .handle_issued_token(IssuedToken {
                access_token: "initial-token".to_string(),
                token_type: Some("Bearer".to_string()),
                scope: None,
                expires_in: Some(3600),
                expiry_timestamp_ms: None,
                refresh_token: with_refresh_token.then(|| "refresh".to_string()),
            })
            .unwrap();

        let client = EventsClient::new(
            Arc::clone(&config),
            Arc::clone(&tokens),
            Arc::clone(&identity) as Arc<dyn IdentityApi>,
            Arc::clone(&calendar) as Arc<dyn CalendarApi>,
        );

        Fixture {
            _dir: dir,
            client,
            tokens,
            calendar,
            identity,
        }
    }

    fn fast_config() -> CalendarConfig {
        CalendarConfig::new("https://focusmentor.example/oauth/callback")
            .with_min_fetch_interval(Duration::from_secs(60))
            .with_retry_delay(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn unauthenticated_fetch_is_rejected_without_upstream_call() {
        let f = fixture(fast_config(), ScriptedCalendar::new(vec![Ok(vec![])]), false);
        f.tokens.clear().unwrap();

        let err = f.client.get_upcoming_events(10).await.unwrap_err();
        assert_eq!(err.code(), CalendarErrorCode::NotAuthenticated);
        assert_eq!(f.calendar.calls(), 0);
    }

    #[tokio::test]
    async fn rapid_second_fetch_is_served_from_cache() {
        let f = fixture(
            fast_config(),
            ScriptedCalendar::new(vec![Ok(vec![event("a", 9), event("b", 10)])]),
            false,
        );

        let first = f.client.get_upcoming_events(10).await.unwrap();
        let second = f.client.get_upcoming_events(10).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(f.calendar.calls(), 1);
    }

    #[tokio::test]
    async fn throttled_fetch_still_reports_lost_authentication() {
        let f = fixture(
            fast_config(),
            ScriptedCalendar::new(vec![Ok(vec![event("a", 9)])]),
            false,
        );

        f.client.get_upcoming_events(10).await.unwrap();
        f.tokens.clear().unwrap();

        let err = f.client.get_upcoming_events(10).await.unwrap_err();
        assert_eq!(err.code(), CalendarErrorCode::NotAuthenticated);
        assert_eq!(f.calendar.calls(), 1);
    }

    #[tokio::test]
    async fn fetch_after_interval_hits_upstream_again() {
        let config = fast_config().with_min_fetch_interval(Duration::from_millis(10));
        let f = fixture(
            config,
            ScriptedCalendar::new(vec![Ok(vec![event("a", 9)])]),
            false,
        );

        f.client.get_upcoming_events(10).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        f.client.get_upcoming_events(10).await.unwrap();

        assert_eq!(f.calendar.calls(), 2);
    }

    #[tokio::test]
    async fn auth_failure_recovers_after_silent_refresh() {
        let f = fixture(
            fast_config(),
            ScriptedCalendar::new(vec![
                Err(CalendarError::not_authenticated("expired")),
                Ok(vec![event("a", 9)]),
            ]),
            true,
        );

        let events = f.client.get_upcoming_events(10).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(f.calendar.calls(), 2);
        assert_eq!(f.identity.refreshes.load(Ordering::SeqCst), 1);
        assert_eq!(
            f.tokens.current().unwrap().access_token,
            "refreshed-token"
        );
        // The refresh response carried no refresh token; the held one stays.
        assert_eq!(
            f.tokens.current().unwrap().refresh_token.as_deref(),
            Some("refresh")
        );
    }

    #[tokio::test]
    async fn persistent_auth_failure_is_bounded_and_disconnects() {
        let f = fixture(
            fast_config(),
            ScriptedCalendar::new(vec![Err(CalendarError::not_authenticated("expired"))]),
            true,
        );

        let err = f.client.get_upcoming_events(10).await.unwrap_err();
        assert_eq!(err.code(), CalendarErrorCode::AuthorizationDenied);
        assert_eq!(f.calendar.calls(), 3);
        assert!(!f.tokens.is_authenticated());

        // The next call reports a clean disconnected state immediately.
        let err = f.client.get_upcoming_events(10).await.unwrap_err();
        assert_eq!(err.code(), CalendarErrorCode::NotAuthenticated);
        assert_eq!(f.calendar.calls(), 3);
    }

    #[tokio::test]
    async fn non_auth_errors_propagate_without_retry() {
        let f = fixture(
            fast_config(),
            ScriptedCalendar::new(vec![Err(CalendarError::internal("boom"))]),
            true,
        );

        let err = f.client.get_upcoming_events(10).await.unwrap_err();
        assert_eq!(err.code(), CalendarErrorCode::Internal);
        assert_eq!(f.calendar.calls(), 1);
        assert_eq!(f.identity.refreshes.load(Ordering::SeqCst), 0);
        // Non-auth failures must not tear down the connection.
        assert!(f.tokens.is_authenticated());
    }

    #[tokio::test]
    async fn results_are_truncated_in_upstream_order() {
        let f = fixture(
            fast_config(),
            ScriptedCalendar::new(vec![Ok(vec![
                event("a", 9),
                event("b", 10),
                event("c", 11),
            ])]),
            false,
        );

        let events = f.client.get_upcoming_events(2).await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].id, "a");
        assert_eq!(events[1].id, "b");
    }

    #[tokio::test]
    async fn concurrent_fetch_is_rejected() {
        let gate = Arc::new(Notify::new());
        let mut calendar = ScriptedCalendar::new(vec![Ok(vec![event("a", 9)])]);
        calendar.gate = Some(Arc::clone(&gate));
        let f = fixture(fast_config(), calendar, false);

        let client = Arc::new(f.client);
        let background = {
            let client = Arc::clone(&client);
            tokio::spawn(async move { client.get_upcoming_events(10).await })
        };

        // Wait for the background fetch to reach the gated upstream call.
        while f.calendar.calls() == 0 {
            tokio::task::yield_now().await;
        }

        let err = client.get_upcoming_events(10).await.unwrap_err();
        assert_eq!(err.code(), CalendarErrorCode::Internal);

        gate.notify_one();
        assert!(background.await.unwrap().is_ok());
    }
}
