//! Google OAuth 2.0 identity client: code exchange, refresh, revocation.
//!
//! Credentials are read from the state store at call time, so a client id
//! or secret updated by the operator takes effect without reconstructing
//! the client.

use std::sync::Arc;

use tracing::{debug, info};

use crate::api::{BoxFuture, IdentityApi};
use crate::config::CalendarConfig;
use crate::error::{CalendarError, CalendarResult};
use crate::store::StateStore;
use crate::token::IssuedToken;

/// Reqwest-backed [`IdentityApi`] implementation over the configured token
/// and revocation endpoints.
#[derive(Debug)]
pub struct GoogleIdentityClient {
    http_client: reqwest::Client,
    config: Arc<CalendarConfig>,
    store: Arc<StateStore>,
}

impl GoogleIdentityClient {
    /// Creates a new identity client.
    pub fn new(config: Arc<CalendarConfig>, store: Arc<StateStore>) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .expect("failed to create HTTP client");

        Self {
            http_client,
            config,
            store,
        }
    }

    fn credentials(&self) -> CalendarResult<(String, String)> {
        let client_id = self
            .store
            .client_id()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| CalendarError::not_configured("no OAuth client id configured"))?;
        let client_secret = self.store.client_secret().unwrap_or_default();
        Ok((client_id, client_secret))
    }

    async fn token_request(&self, params: &[(&str, &str)]) -> CalendarResult<IssuedToken> {
        let response = self
            .http_client
            .post(&self.config.token_endpoint)
            .form(params)
            .send()
            .await
            .map_err(|e| CalendarError::network(format!("token request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CalendarError::network(format!("failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(CalendarError::not_authenticated(format!(
                "token endpoint returned {}: {}",
                status, body
            )));
        }

        serde_json::from_str(&body)
            .map_err(|e| CalendarError::invalid_response(format!("invalid token response: {}", e)))
    }
}

impl IdentityApi for GoogleIdentityClient {
    fn exchange_code<'a>(&'a self, code: &'a str) -> BoxFuture<'a, CalendarResult<IssuedToken>> {
        Box::pin(async move {
            let (client_id, client_secret) = self.credentials()?;
            let params = [
                ("client_id", client_id.as_str()),
                ("client_secret", client_secret.as_str()),
                ("code", code),
                ("grant_type", "authorization_code"),
                ("redirect_uri", self.config.redirect_uri.as_str()),
            ];

            debug!("exchanging authorization code for token");
            let issued = self.token_request(&params).await?;
            info!("obtained token from code exchange");
            Ok(issued)
        })
    }

    fn refresh_token<'a>(
        &'a self,
        refresh_token: &'a str,
    ) -> BoxFuture<'a, CalendarResult<IssuedToken>> {
        Box::pin(async move {
            let (client_id, client_secret) = self.credentials()?;
            let params = [
                ("client_id", client_id.as_str()),
                ("client_secret", client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ];

            debug!("refreshing access token");
            let issued = self.token_request(&params).await?;
            info!("refreshed access token");
            Ok(issued)
        })
    }

    fn revoke_token<'a>(&'a self, token: &'a str) -> BoxFuture<'a, CalendarResult<()>> {
        Box::pin(async move {
            let response = self
                .http_client
                .post(&self.config.revoke_endpoint)
                .form(&[("token", token)])
                .send()
                .await
                .map_err(|e| CalendarError::network(format!("revoke request failed: {}", e)))?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(CalendarError::server(format!(
                    "revocation returned {}: {}",
                    status, body
                )));
            }

            info!("revoked token with provider");
            Ok(())
        })
    }
}

/// Builds the authorization URL the user is sent to for consent.
pub fn build_auth_url(
    config: &CalendarConfig,
    client_id: &str,
    state: &str,
) -> String {
    let scope = config.scopes.join(" ");
    format!(
        "{}?client_id={}&redirect_uri={}&scope={}&response_type=code&state={}&\
        access_type=offline&prompt=consent",
        config.auth_endpoint,
        urlencoding::encode(client_id),
        urlencoding::encode(&config.redirect_uri),
        urlencoding::encode(&scope),
        urlencoding::encode(state),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_url_format() {
        let config = CalendarConfig::new("https://focusmentor.example/oauth/callback");
        let url = build_auth_url(&config, "abc.apps.googleusercontent.com", "telegram-42-n0nce");

        assert!(url.starts_with("https://accounts.google.com/o/oauth2/v2/auth?"));
        assert!(url.contains("client_id=abc.apps.googleusercontent.com"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("state=telegram-42-n0nce"));
        assert!(url.contains("access_type=offline"));
        assert!(url.contains("prompt=consent"));
        assert!(url.contains("scope=https%3A%2F%2Fwww.googleapis.com%2Fauth%2Fcalendar.readonly"));
    }

    #[test]
    fn auth_url_encodes_redirect_uri() {
        let config = CalendarConfig::new("https://focusmentor.example/oauth/callback?x=1");
        let url = build_auth_url(&config, "abc", "s");
        assert!(url.contains("redirect_uri=https%3A%2F%2Ffocusmentor.example%2Foauth%2Fcallback%3Fx%3D1"));
    }
}
