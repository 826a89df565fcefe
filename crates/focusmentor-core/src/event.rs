//! The normalized calendar event type.

use serde::{Deserialize, Serialize};

use crate::time::EventTime;

/// A read-only snapshot of a calendar event.
///
/// Events are produced by the calendar client already expanded (recurring
/// events arrive as single instances) and ordered by start time. The system
/// never writes events back to the calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEvent {
    /// Provider-assigned event identifier.
    pub id: String,
    /// Event title (the provider's "summary").
    pub title: String,
    /// Optional longer description.
    pub description: Option<String>,
    /// Start of the event: a datetime for timed events, a date for all-day.
    pub start: EventTime,
    /// End of the event, same shape as `start`.
    pub end: EventTime,
}

impl CalendarEvent {
    /// Creates a new event with the required fields.
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        start: EventTime,
        end: EventTime,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: None,
            start,
            end,
        }
    }

    /// Builder method to attach a description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Returns `true` if this is an all-day event.
    pub fn is_all_day(&self) -> bool {
        self.start.is_all_day()
    }
}
