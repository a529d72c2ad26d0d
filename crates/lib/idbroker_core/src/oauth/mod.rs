//! OAuth2 exchange with federated providers.
//!
//! An [`OAuthExchange`] turns an authorization code or a refresh token into a
//! [`ProviderToken`] and fetches the provider profile. [`providers::normalize`]
//! then reduces token and profile to the subject the directory knows the user
//! by, plus the name and email the broker stores.

pub mod http;
pub mod providers;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::config::ProviderSettings;
use crate::provider::Provider;

pub use http::HttpOAuthExchange;
pub use providers::normalize;

/// OAuth exchange errors.
#[derive(Debug, Error)]
pub enum OAuthError {
    #[error("Provider not configured: {0}")]
    UnsupportedProvider(String),

    #[error("Request failed: {0}")]
    Request(String),

    /// The token endpoint answered without an access token.
    #[error("No token: {0}")]
    Rejected(String),

    #[error("Missing id token for {0}")]
    MissingToken(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

/// Token endpoint response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderToken {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_in: Option<u64>,
    pub id_token: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// The user as a provider reports them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedLogin {
    /// Token presented to the directory as the login subject.
    pub id_token: String,
    pub name: Option<String>,
    pub email: Option<String>,
}

/// Code and refresh-token grants against a provider's endpoints.
#[async_trait]
pub trait OAuthExchange: Send + Sync {
    /// `authorization_code` grant with the caller's client id.
    async fn exchange_code(
        &self,
        provider: &Provider,
        settings: &ProviderSettings,
        code: &str,
        client_id: &str,
        redirect_uri: &str,
    ) -> Result<ProviderToken, OAuthError>;

    /// `refresh_token` grant with the configured client id.
    async fn exchange_refresh_token(
        &self,
        provider: &Provider,
        settings: &ProviderSettings,
        refresh_token: &str,
    ) -> Result<ProviderToken, OAuthError>;

    /// Profile of the token's owner, `None` when the provider returns none.
    async fn fetch_profile(
        &self,
        provider: &Provider,
        settings: &ProviderSettings,
        access_token: &str,
    ) -> Result<Option<Value>, OAuthError>;
}
