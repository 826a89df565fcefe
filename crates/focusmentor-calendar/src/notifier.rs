//! Out-of-band notification to the bot backend on successful connection.

use serde::Serialize;
use tracing::{debug, info};

use crate::api::BoxFuture;
use crate::error::{CalendarError, CalendarResult};

/// Receiver of "calendar connected" notifications for bot users.
pub trait ConnectedNotifier: Send + Sync {
    /// Informs the bot backend that the given user completed the connection.
    fn calendar_connected(&self, user_id: i64) -> BoxFuture<'_, CalendarResult<()>>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ConnectedBody {
    user_id: i64,
    connected: bool,
}

/// HTTP implementation posting to the bot backend.
///
/// Sends `POST {base}/notify-calendar-connected?userId={id}` with a JSON
/// body of `{"userId": id, "connected": true}`.
#[derive(Debug)]
pub struct HttpBotNotifier {
    http_client: reqwest::Client,
    api_base: String,
}

impl HttpBotNotifier {
    /// Creates a notifier posting to the given bot backend base URL.
    pub fn new(api_base: impl Into<String>, timeout: std::time::Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("failed to create HTTP client");

        Self {
            http_client,
            api_base: api_base.into(),
        }
    }
}

impl ConnectedNotifier for HttpBotNotifier {
    fn calendar_connected(&self, user_id: i64) -> BoxFuture<'_, CalendarResult<()>> {
        Box::pin(async move {
            let url = format!(
                "{}/notify-calendar-connected?userId={}",
                self.api_base, user_id
            );
            debug!(user_id, "notifying bot backend of calendar connection");

            let response = self
                .http_client
                .post(&url)
                .json(&ConnectedBody {
                    user_id,
                    connected: true,
                })
                .send()
                .await
                .map_err(|e| CalendarError::network(format!("bot notify failed: {}", e)))?;

            let status = response.status();
            if !status.is_success() {
                return Err(CalendarError::server(format!(
                    "bot notify returned {}",
                    status
                )));
            }

            info!(user_id, "bot backend notified");
            Ok(())
        })
    }
}
