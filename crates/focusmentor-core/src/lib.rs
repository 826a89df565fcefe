//! Core types shared across the focusmentor workspace.

pub mod event;
pub mod time;
pub mod tracing;

pub use event::CalendarEvent;
pub use time::{EventTime, TimeWindow};
pub use tracing::{init_tracing, TracingConfig, TracingError, TracingOutputFormat};
