//! Identity broker.
//!
//! [`IdentityBroker`] resolves email/password and federated logins to one
//! durable identity in the directory, links and unlinks logins, and keeps the
//! identity's profile records (current login pointer, password hash, refresh
//! tokens, provider profiles) in its dataset.
//!
//! The broker holds no mutable state of its own; clones share collaborators.

mod credentials;
mod federated;
mod link;
mod password;
mod profile;

pub use credentials::{BoundCredentials, CredentialContext, RenewableCredential};

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::config::{BrokerConfig, DirectorySettings, ProviderSettings};
use crate::directory::{IdentityDirectory, Logins, OpenIdToken, RecordStore};
use crate::error::{IdentityError, Result};
use crate::mail::MailSender;
use crate::models::{CurrentLogin, LoginOutcome};
use crate::oauth::{OAuthError, OAuthExchange};
use crate::provider::{self, NormalizedProvider, Provider};
use crate::records::{ProfileStore, RecordUpdate, profile_key, refresh_key};

/// Entry point for every identity operation.
#[derive(Clone)]
pub struct IdentityBroker {
    directory: Arc<dyn IdentityDirectory>,
    records: ProfileStore,
    mail: Arc<dyn MailSender>,
    oauth: Arc<dyn OAuthExchange>,
    config: Arc<BrokerConfig>,
}

impl IdentityBroker {
    pub fn new(
        config: BrokerConfig,
        directory: Arc<dyn IdentityDirectory>,
        records: Arc<dyn RecordStore>,
        mail: Arc<dyn MailSender>,
        oauth: Arc<dyn OAuthExchange>,
    ) -> Self {
        let records = ProfileStore::new(records, config.directory.dataset_name.clone());
        Self {
            directory,
            records,
            mail,
            oauth,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    pub fn records(&self) -> &ProfileStore {
        &self.records
    }

    fn settings(&self) -> &DirectorySettings {
        &self.config.directory
    }

    fn normalize(&self, provider: Option<&Provider>, token: Option<&str>) -> NormalizedProvider {
        provider::normalize(provider, token, self.settings())
    }

    fn provider_settings(&self, provider: &Provider) -> Result<&ProviderSettings> {
        self.config
            .provider(provider)
            .ok_or_else(|| OAuthError::UnsupportedProvider(provider.to_string()).into())
    }

    fn developer_logins(&self, identifier: &str) -> Logins {
        Logins::from([(
            self.settings().developer_provider_name.clone(),
            identifier.to_string(),
        )])
    }

    /// Issue an open-id token, attaching `logins` to the identity.
    async fn open_id_token(&self, identity_id: Option<&str>, logins: &Logins) -> Result<OpenIdToken> {
        Ok(self
            .directory
            .get_open_id_token_for_developer_identity(identity_id, logins)
            .await?)
    }

    /// Identity of a login.
    ///
    /// Developer logins (email, pseudo-providers) are looked up and may not
    /// exist. Federated logins always resolve: the directory creates an
    /// identity for a login it has not seen.
    pub async fn get_id(&self, provider: Option<&Provider>, token: &str) -> Result<Option<String>> {
        let p = self.normalize(provider, Some(token));
        let Some(token) = p.token else {
            return Ok(None);
        };
        if p.is_developer {
            Ok(self.directory.lookup_developer_identity(&token).await?)
        } else {
            let logins = Logins::from([(p.namespace, token)]);
            Ok(Some(self.directory.get_id(&logins).await?))
        }
    }

    /// Like [`Self::get_id`], creating a developer identity when none exists.
    async fn resolve_identity(&self, provider: Option<&Provider>, token: &str) -> Result<String> {
        if let Some(id) = self.get_id(provider, token).await? {
            return Ok(id);
        }
        let p = self.normalize(provider, Some(token));
        let identifier = p.token.unwrap_or_default();
        debug!(provider = ?provider.map(Provider::as_str), "creating developer identity");
        Ok(self
            .open_id_token(None, &self.developer_logins(&identifier))
            .await?
            .identity_id)
    }

    /// Developer identifiers (emails and prefixed pseudo-provider ids) of an identity.
    pub async fn developer_identifiers(&self, identity_id: &str) -> Result<Vec<String>> {
        Ok(self.directory.developer_identifiers(identity_id).await?)
    }

    /// The email identifier of an identity: the developer identifier
    /// without a provider prefix.
    pub async fn email_of(&self, identity_id: &str) -> Result<Option<String>> {
        let separator = &self.settings().separator;
        Ok(self
            .developer_identifiers(identity_id)
            .await?
            .into_iter()
            .find(|t| !t.contains(separator.as_str())))
    }

    /// The login used most recently.
    pub async fn current_login(&self, identity_id: &str) -> Result<CurrentLogin> {
        let mut current = self
            .records
            .get_records(identity_id, &["provider", "token"])
            .await?;
        match current.remove("provider") {
            Some(name) => Ok(CurrentLogin {
                provider: Some(Provider::from_name(&name)),
                token: current.remove("token"),
            }),
            None => Ok(CurrentLogin {
                provider: None,
                token: self.email_of(identity_id).await?,
            }),
        }
    }

    /// Provider of the current login and its stored refresh token.
    pub async fn refresh_token(&self, identity_id: &str) -> Result<Option<(Provider, String)>> {
        let mut records = self
            .records
            .get_records(identity_id, &["provider", "refresh"])
            .await?;
        let Some(name) = records.remove("provider") else {
            return Ok(None);
        };
        let provider = Provider::from_name(&name);
        Ok(records
            .remove(&refresh_key(provider.as_str()))
            .map(|token| (provider, token)))
    }

    /// Store the login pointer and what came with the login.
    ///
    /// `provider = None` points at the email login.
    async fn on_login(
        &self,
        identity_id: &str,
        provider: Option<&Provider>,
        token: &str,
        refresh_token: Option<&str>,
        profile: Option<&Value>,
        name: Option<&str>,
    ) -> Result<LoginOutcome> {
        let mut update = RecordUpdate::new();
        if let Some(name) = name {
            update = update.create("name", name);
        }
        match provider {
            Some(p) => {
                update = update.replace("provider", p.as_str()).replace("token", token);
                update = with_provider_records(update, p, refresh_token, profile);
            }
            None => update = update.clear("provider").clear("token"),
        }
        self.records.update_records(identity_id, update).await?;
        debug!(identity_id, provider = ?provider.map(Provider::as_str), "login recorded");
        Ok(LoginOutcome::new(identity_id))
    }

    /// Store the refresh token and profile of a provider.
    async fn update_refresh_token(
        &self,
        identity_id: &str,
        provider: &Provider,
        refresh_token: Option<&str>,
        profile: Option<&Value>,
    ) -> Result<()> {
        let update = with_provider_records(RecordUpdate::new(), provider, refresh_token, profile);
        self.records.update_records(identity_id, update).await
    }
}

fn with_provider_records(
    mut update: RecordUpdate,
    provider: &Provider,
    refresh_token: Option<&str>,
    profile: Option<&Value>,
) -> RecordUpdate {
    if let Some(refresh) = refresh_token {
        update = update.replace(refresh_key(provider.as_str()), refresh);
    }
    if let Some(profile) = profile {
        update = update.replace(profile_key(provider.as_str()), profile.to_string());
    }
    update
}

/// Error for an identity with nothing to act on.
fn missing(what: impl std::fmt::Display) -> IdentityError {
    IdentityError::NotFound(what.to_string())
}
