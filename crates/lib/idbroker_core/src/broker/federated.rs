//! Federated logins through OAuth providers.

use serde_json::Value;
use tracing::{debug, info};

use super::{IdentityBroker, missing};
use crate::error::{IdentityError, Result};
use crate::models::{LoginOutcome, RefreshedLogin};
use crate::oauth::{OAuthError, normalize};
use crate::provider::Provider;

impl IdentityBroker {
    /// Complete an OAuth authorization.
    ///
    /// With `current_user` the provider login is linked to that identity,
    /// otherwise the login resolves to (or creates) an identity of its own.
    pub async fn login_federated(
        &self,
        provider: &Provider,
        code: &str,
        client_id: &str,
        redirect_uri: &str,
        current_user: Option<&str>,
    ) -> Result<LoginOutcome> {
        let settings = self.provider_settings(provider)?;

        let token = self
            .oauth
            .exchange_code(provider, settings, code, client_id, redirect_uri)
            .await?;
        let access_token = token
            .access_token
            .as_deref()
            .ok_or_else(|| OAuthError::Rejected(format!("{provider} returned no access token")))?;
        let profile = self
            .oauth
            .fetch_profile(provider, settings, access_token)
            .await?;
        let login = normalize(provider, &token, profile.as_ref())?;
        debug!(%provider, linking = current_user.is_some(), "provider login normalized");

        let id = match current_user {
            Some(user) => {
                if self.federated_login_taken(provider, &login.id_token, user).await? {
                    return Err(IdentityError::Conflict(format!(
                        "There is already an account with {provider} that belongs to you"
                    )));
                }
                if let Some(email) = &login.email
                    && self.email_taken(email, user).await?
                {
                    return Err(IdentityError::Conflict(format!(
                        "There is already an account with {email} that belongs to you"
                    )));
                }
                self.link(
                    user,
                    provider,
                    &login.id_token,
                    token.refresh_token.as_deref(),
                    profile.as_ref(),
                )
                .await?
            }
            None => {
                self.login_federated_with_token(
                    provider,
                    &login.id_token,
                    token.refresh_token.as_deref(),
                    profile.as_ref(),
                    login.name.as_deref(),
                    login.email.as_deref(),
                )
                .await?
                .id
            }
        };

        Ok(LoginOutcome {
            id,
            expires_in: token.expires_in,
        })
    }

    /// Log in with an already obtained provider token.
    ///
    /// A profile email is attached as the identity's email identifier unless
    /// the identity has one, or the email belongs to another identity.
    pub async fn login_federated_with_token(
        &self,
        provider: &Provider,
        token: &str,
        refresh_token: Option<&str>,
        profile: Option<&Value>,
        name: Option<&str>,
        email: Option<&str>,
    ) -> Result<LoginOutcome> {
        let mut identity_id = self.resolve_identity(Some(provider), token).await?;

        if let Some(email) = email
            && self.email_of(&identity_id).await?.is_none()
        {
            if self.get_id(None, email).await?.is_some() {
                return Err(IdentityError::Conflict(format!(
                    "There is already an account with {email} that belongs to you"
                )));
            }
            identity_id = self
                .link_with_token(Some(provider), token, None, email)
                .await?;
            info!(identity_id, %provider, "attached profile email");
        }

        self.on_login(
            &identity_id,
            Some(provider),
            token,
            refresh_token,
            profile,
            name,
        )
        .await
    }

    /// Obtain a new provider token with the stored refresh token and log in
    /// with it.
    pub async fn refresh_provider(&self, identity_id: &str) -> Result<RefreshedLogin> {
        let (provider, refresh) = self
            .refresh_token(identity_id)
            .await?
            .ok_or_else(|| missing("no refresh token found"))?;

        if !provider.is_federated() {
            return Err(IdentityError::Upstream(format!(
                "refresh is not supported for {provider}"
            )));
        }
        let settings = self.provider_settings(&provider)?;

        let token = self
            .oauth
            .exchange_refresh_token(&provider, settings, &refresh)
            .await?;
        let login = normalize(&provider, &token, None)?;
        debug!(identity_id, %provider, "provider token refreshed");

        self.login_federated_with_token(&provider, &login.id_token, None, None, None, None)
            .await?;

        Ok(RefreshedLogin {
            token: login.id_token,
            expires_in: token.expires_in,
        })
    }

    /// Whether a provider login belongs to an identity other than `user`
    /// that is in use.
    ///
    /// A pseudo-provider login only resolves when an identity carries it.
    /// A federated login resolves to a fresh identity when unseen, so its
    /// owner counts only once it has records or developer identifiers.
    async fn federated_login_taken(
        &self,
        provider: &Provider,
        token: &str,
        user: &str,
    ) -> Result<bool> {
        let Some(identity_id) = self.get_id(Some(provider), token).await? else {
            return Ok(false);
        };
        if identity_id == user || identity_id == self.surviving_id(user).await? {
            return Ok(false);
        }
        if !provider.is_federated() {
            return Ok(true);
        }
        if !self.developer_identifiers(&identity_id).await?.is_empty() {
            return Ok(true);
        }
        let records = self.records.get_records(&identity_id, &[""]).await?;
        Ok(!records.is_empty())
    }

    /// Id `identity_id` resolves to after any merges.
    async fn surviving_id(&self, identity_id: &str) -> Result<String> {
        Ok(self.directory.describe_identity(identity_id).await?.identity_id)
    }

    async fn email_taken(&self, email: &str, user: &str) -> Result<bool> {
        Ok(self
            .get_id(None, email)
            .await?
            .is_some_and(|id| id != user))
    }
}
