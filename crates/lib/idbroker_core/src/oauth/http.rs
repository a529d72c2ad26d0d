//! OAuth exchange over HTTP.

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::ACCEPT;
use serde_json::Value;
use tracing::{debug, warn};

use super::{OAuthError, OAuthExchange, ProviderToken};
use crate::config::ProviderSettings;
use crate::provider::Provider;

/// [`OAuthExchange`] posting form-encoded grants with `reqwest`.
#[derive(Debug, Clone, Default)]
pub struct HttpOAuthExchange {
    client: Client,
}

impl HttpOAuthExchange {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a preconfigured client (timeouts, proxies).
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    async fn request_token(
        &self,
        provider: &Provider,
        url: &str,
        params: &[(&str, &str)],
    ) -> Result<ProviderToken, OAuthError> {
        debug!(%provider, url, "requesting provider token");

        let resp = self
            .client
            .post(url)
            .header(ACCEPT, "application/json")
            .form(params)
            .send()
            .await
            .map_err(|e| OAuthError::Request(format!("{provider} token endpoint: {e}")))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| OAuthError::Request(format!("{provider} token endpoint: {e}")))?;

        let token: ProviderToken = match serde_json::from_str(&body) {
            Ok(token) => token,
            Err(_) if !status.is_success() => {
                return Err(OAuthError::Rejected(format!("HTTP {status}: {body}")));
            }
            Err(e) => {
                return Err(OAuthError::Parse(format!("{provider} token response: {e}")));
            }
        };

        if token.access_token.is_none() {
            warn!(%provider, %status, error = ?token.error, "token endpoint returned no access token");
            let detail = format!(
                "{} {}",
                token.error.as_deref().unwrap_or("unknown_error"),
                token.error_description.as_deref().unwrap_or_default()
            );
            return Err(OAuthError::Rejected(detail.trim_end().to_string()));
        }

        Ok(token)
    }
}

#[async_trait]
impl OAuthExchange for HttpOAuthExchange {
    async fn exchange_code(
        &self,
        provider: &Provider,
        settings: &ProviderSettings,
        code: &str,
        client_id: &str,
        redirect_uri: &str,
    ) -> Result<ProviderToken, OAuthError> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", client_id),
            ("client_secret", settings.client_secret.as_str()),
            ("redirect_uri", redirect_uri),
        ];
        self.request_token(provider, &settings.token_url, &params)
            .await
    }

    async fn exchange_refresh_token(
        &self,
        provider: &Provider,
        settings: &ProviderSettings,
        refresh_token: &str,
    ) -> Result<ProviderToken, OAuthError> {
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", settings.client_id.as_str()),
            ("client_secret", settings.client_secret.as_str()),
        ];
        self.request_token(provider, &settings.token_url, &params)
            .await
    }

    async fn fetch_profile(
        &self,
        provider: &Provider,
        settings: &ProviderSettings,
        access_token: &str,
    ) -> Result<Option<Value>, OAuthError> {
        let resp = self
            .client
            .get(&settings.profile_url)
            .header(ACCEPT, "application/json")
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| OAuthError::Request(format!("{provider} profile endpoint: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            debug!(%provider, %status, "no profile returned");
            return Ok(None);
        }

        let body = resp
            .text()
            .await
            .map_err(|e| OAuthError::Request(format!("{provider} profile endpoint: {e}")))?;
        if body.trim().is_empty() {
            return Ok(None);
        }

        serde_json::from_str(&body)
            .map(Some)
            .map_err(|e| OAuthError::Parse(format!("{provider} profile: {e}")))
    }
}
