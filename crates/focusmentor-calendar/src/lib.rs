//! Calendar integration: OAuth token lifecycle and upcoming-event retrieval.
//!
//! This crate connects a user's Google Calendar and serves upcoming events
//! to the rest of the system:
//!
//! - [`CalendarService`] - The facade everything else calls
//! - [`AuthFlowController`] - OAuth authorization-code flow and sign-out
//! - [`TokenManager`] - Token normalization, validity, and persistence
//! - [`EventsClient`] - Throttled event fetching with bounded auth recovery
//! - [`CalendarError`] - Error taxonomy for all calendar operations
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐
//! │ Chat handler │   │  Web layer   │
//! └──────┬───────┘   └──────┬───────┘
//!        │                  │
//!        └───────┬──────────┘
//!                ▼
//!        ┌───────────────┐      notices      ┌──────────────┐
//!        │CalendarService│ ────────────────▶ │   consumer   │
//!        └───────┬───────┘                   └──────────────┘
//!                │
//!      ┌─────────┼──────────────┐
//!      ▼         ▼              ▼
//! ┌─────────┐ ┌────────────┐ ┌─────────────┐
//! │AuthFlow │ │TokenManager│ │EventsClient │
//! └────┬────┘ └─────┬──────┘ └──────┬──────┘
//!      │            ▼               │
//!      │      ┌──────────┐          │
//!      │      │StateStore│          │
//!      │      └──────────┘          │
//!      ▼                            ▼
//! ┌───────────┐              ┌─────────────┐
//! │IdentityApi│              │ CalendarApi │
//! └───────────┘              └─────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use focusmentor_calendar::{CalendarConfig, CalendarService};
//!
//! let config = CalendarConfig::new("https://mentor.example/oauth/callback");
//! let (service, mut notices) = CalendarService::new(config)?;
//!
//! if let Some(url) = service.sign_in(Some(chat_user_id))? {
//!     // Send `url` to the user; the callback completes the connection.
//! }
//! ```

pub mod api;
pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod facade;
pub mod identity;
pub mod notice;
pub mod notifier;
pub mod pending;
pub mod store;
pub mod token;

// Re-export main types at crate root
pub use api::{BoxFuture, CalendarApi, IdentityApi};
pub use auth::{AuthFlowController, CallbackParams, ConnectionPhase};
pub use client::GoogleEventsClient;
pub use config::CalendarConfig;
pub use error::{CalendarError, CalendarErrorCode, CalendarResult};
pub use events::EventsClient;
pub use facade::CalendarService;
pub use identity::{GoogleIdentityClient, build_auth_url};
pub use notice::{NoticeKind, NoticeReceiver, NoticeSender, UserNotice, notice_channel};
pub use notifier::{ConnectedNotifier, HttpBotNotifier};
pub use pending::{PendingAuthRegistry, PendingAuthState};
pub use store::{PersistedState, StateStore};
pub use token::{IssuedToken, StoredToken, TokenManager};
