//! Google Calendar API events client.
//!
//! A low-level HTTP client for the Calendar v3 events endpoint. Events are
//! requested pre-sorted by start time with recurring events expanded, so
//! callers must not re-sort.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use tracing::{debug, warn};

use focusmentor_core::{CalendarEvent, EventTime, TimeWindow};

use crate::api::{BoxFuture, CalendarApi};
use crate::config::CalendarConfig;
use crate::error::{CalendarError, CalendarResult};

/// Reqwest-backed [`CalendarApi`] implementation over the configured events
/// endpoint.
#[derive(Debug)]
pub struct GoogleEventsClient {
    http_client: reqwest::Client,
    config: Arc<CalendarConfig>,
}

impl GoogleEventsClient {
    /// Creates a new events client.
    pub fn new(config: Arc<CalendarConfig>) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .expect("failed to create HTTP client");

        Self {
            http_client,
            config,
        }
    }

    async fn list_events_impl(
        &self,
        access_token: &str,
        window: TimeWindow,
        max_results: usize,
    ) -> CalendarResult<Vec<CalendarEvent>> {
        let url = format!(
            "{}/calendars/{}/events",
            self.config.events_api_base,
            urlencoding::encode(&self.config.calendar_id)
        );

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(access_token)
            .query(&[
                ("timeMin", window.start.to_rfc3339()),
                ("timeMax", window.end.to_rfc3339()),
                ("singleEvents", "true".to_string()),
                ("orderBy", "startTime".to_string()),
                ("maxResults", max_results.to_string()),
            ])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CalendarError::network("request timeout")
                } else if e.is_connect() {
                    CalendarError::network(format!("connection failed: {}", e))
                } else {
                    CalendarError::network(format!("request failed: {}", e))
                }
            })?;

        let status = response.status();

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(CalendarError::not_authenticated(
                "access token expired or invalid",
            ));
        }

        if status == reqwest::StatusCode::FORBIDDEN {
            return Err(CalendarError::authorization_denied(
                "access denied to calendar",
            ));
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(CalendarError::rate_limited("rate limit exceeded"));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CalendarError::server(format!(
                "API error ({}): {}",
                status, body
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| CalendarError::network(format!("failed to read response: {}", e)))?;

        let list: EventListResponse = serde_json::from_str(&body).map_err(|e| {
            CalendarError::invalid_response(format!("failed to parse event list: {}", e))
        })?;

        // Preserve upstream order; only drop unusable entries.
        let events: Vec<CalendarEvent> = list
            .items
            .into_iter()
            .filter_map(convert_event)
            .collect();

        debug!(
            "fetched {} events from calendar {}",
            events.len(),
            self.config.calendar_id
        );
        Ok(events)
    }
}

impl CalendarApi for GoogleEventsClient {
    fn list_events<'a>(
        &'a self,
        access_token: &'a str,
        window: TimeWindow,
        max_results: usize,
    ) -> BoxFuture<'a, CalendarResult<Vec<CalendarEvent>>> {
        Box::pin(async move {
            self.list_events_impl(access_token, window, max_results)
                .await
        })
    }
}

/// Converts an API event to a [`CalendarEvent`].
///
/// Cancelled events and events without a usable start or end are skipped.
fn convert_event(event: ApiEvent) -> Option<CalendarEvent> {
    if event.status.as_deref() == Some("cancelled") {
        return None;
    }

    let id = event.id?;
    let start = parse_event_time(&event.start, &id, "start")?;
    let end = parse_event_time(&event.end, &id, "end")?;

    let mut calendar_event =
        CalendarEvent::new(id, event.summary.unwrap_or_default(), start, end);
    calendar_event.description = event.description;
    Some(calendar_event)
}

/// Parses the `date` XOR `dateTime` shape of an API event boundary.
fn parse_event_time(time: &ApiEventTime, event_id: &str, which: &str) -> Option<EventTime> {
    match (&time.date_time, &time.date) {
        (Some(dt), _) => {
            let parsed = DateTime::parse_from_rfc3339(dt)
                .map_err(|e| warn!("event {}: bad {} datetime: {}", event_id, which, e))
                .ok()?;
            Some(EventTime::from_utc(parsed.with_timezone(&Utc)))
        }
        (None, Some(date)) => {
            let parsed = NaiveDate::parse_from_str(date, "%Y-%m-%d")
                .map_err(|e| warn!("event {}: bad {} date: {}", event_id, which, e))
                .ok()?;
            Some(EventTime::from_date(parsed))
        }
        (None, None) => {
            warn!("event {} has no {} time", event_id, which);
            None
        }
    }
}

/// Response from the events.list endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventListResponse {
    #[serde(default)]
    items: Vec<ApiEvent>,
}

/// A single event from the Calendar API.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiEvent {
    id: Option<String>,
    summary: Option<String>,
    description: Option<String>,
    #[serde(default)]
    start: ApiEventTime,
    #[serde(default)]
    end: ApiEventTime,
    status: Option<String>,
}

/// Event boundary from the API: `date` for all-day, `dateTime` for timed.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiEventTime {
    date: Option<String>,
    date_time: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_timed_event() {
        let json = r#"{
            "items": [
                {
                    "id": "evt-1",
                    "summary": "Mentor check-in",
                    "description": "weekly review",
                    "start": { "dateTime": "2026-03-15T10:00:00Z" },
                    "end": { "dateTime": "2026-03-15T10:30:00Z" },
                    "status": "confirmed"
                }
            ]
        }"#;

        let list: EventListResponse = serde_json::from_str(json).unwrap();
        let events: Vec<_> = list.items.into_iter().filter_map(convert_event).collect();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, "evt-1");
        assert_eq!(events[0].title, "Mentor check-in");
        assert_eq!(events[0].description.as_deref(), Some("weekly review"));
        assert!(!events[0].is_all_day());
    }

    #[test]
    fn parse_all_day_event() {
        let json = r#"{
            "id": "evt-2",
            "summary": "Deep work day",
            "start": { "date": "2026-03-15" },
            "end": { "date": "2026-03-16" }
        }"#;

        let event: ApiEvent = serde_json::from_str(json).unwrap();
        let converted = convert_event(event).unwrap();
        assert!(converted.is_all_day());
        assert_eq!(
            converted.start.as_date().unwrap(),
            &NaiveDate::from_ymd_opt(2026, 3, 15).unwrap()
        );
    }

    #[test]
    fn cancelled_events_are_skipped() {
        let json = r#"{
            "id": "evt-3",
            "summary": "Cancelled thing",
            "start": { "dateTime": "2026-03-15T10:00:00Z" },
            "end": { "dateTime": "2026-03-15T11:00:00Z" },
            "status": "cancelled"
        }"#;

        let event: ApiEvent = serde_json::from_str(json).unwrap();
        assert!(convert_event(event).is_none());
    }

    #[test]
    fn event_without_start_is_skipped() {
        let json = r#"{
            "id": "evt-4",
            "summary": "No times",
            "start": {},
            "end": { "dateTime": "2026-03-15T11:00:00Z" }
        }"#;

        let event: ApiEvent = serde_json::from_str(json).unwrap();
        assert!(convert_event(event).is_none());
    }

    #[test]
    fn upstream_order_is_preserved() {
        // Deliberately not start-ordered; the converter must not sort.
        let json = r#"{
            "items": [
                {
                    "id": "b",
                    "summary": "Later",
                    "start": { "dateTime": "2026-03-15T12:00:00Z" },
                    "end": { "dateTime": "2026-03-15T13:00:00Z" }
                },
                {
                    "id": "a",
                    "summary": "Earlier",
                    "start": { "dateTime": "2026-03-15T09:00:00Z" },
                    "end": { "dateTime": "2026-03-15T10:00:00Z" }
                }
            ]
        }"#;

        let list: EventListResponse = serde_json::from_str(json).unwrap();
        let events: Vec<_> = list.items.into_iter().filter_map(convert_event).collect();
        assert_eq!(events[0].id, "b");
        assert_eq!(events[1].id, "a");
    }
}
