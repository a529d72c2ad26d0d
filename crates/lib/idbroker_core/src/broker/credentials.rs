//! Temporary credentials for an identity's current login.

use async_trait::async_trait;
use tracing::{debug, warn};

use super::IdentityBroker;
use crate::directory::{DirectoryError, Logins, TemporaryCredentials};
use crate::error::{IdentityError, Result};

impl IdentityBroker {
    /// Exchange the current login for temporary credentials.
    ///
    /// `None` when the identity has no login to present. A login rejected as
    /// stale triggers one provider refresh and one retry with the new token.
    pub async fn get_credentials(&self, identity_id: &str) -> Result<Option<TemporaryCredentials>> {
        let current = self.current_login(identity_id).await?;
        let Some(token) = current.token else {
            return Ok(None);
        };

        let login = self.normalize(current.provider.as_ref(), Some(&token));
        let token = login.token.unwrap_or(token);

        let (namespace, token) = if login.is_developer {
            let open_id = self
                .open_id_token(Some(identity_id), &self.developer_logins(&token))
                .await?;
            (self.settings().openid_namespace.clone(), open_id.token)
        } else {
            (login.namespace, token)
        };

        let logins = Logins::from([(namespace.clone(), token)]);
        match self
            .directory
            .get_credentials_for_identity(identity_id, &logins)
            .await
        {
            Ok(credentials) => Ok(Some(credentials)),
            Err(DirectoryError::NotAuthorized(detail)) => {
                debug!(identity_id, %detail, "login rejected, refreshing provider token");
                let refreshed = self.refresh_provider(identity_id).await.inspect_err(|e| {
                    warn!(identity_id, error = %e, "provider refresh failed");
                })?;
                let logins = Logins::from([(namespace, refreshed.token)]);
                Ok(Some(
                    self.directory
                        .get_credentials_for_identity(identity_id, &logins)
                        .await?,
                ))
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Credentials that know how to replace themselves once expired.
#[async_trait]
pub trait RenewableCredential: Send + Sync {
    /// The credentials held, if any were obtained.
    fn current(&self) -> Option<&TemporaryCredentials>;

    fn is_expired(&self) -> bool {
        self.current().is_none_or(TemporaryCredentials::is_expired)
    }

    async fn renew(&mut self) -> Result<()>;
}

/// Credentials of one identity, renewed through the broker.
#[derive(Clone)]
pub struct BoundCredentials {
    broker: IdentityBroker,
    identity_id: String,
    credentials: Option<TemporaryCredentials>,
}

impl BoundCredentials {
    pub fn new(broker: IdentityBroker, identity_id: impl Into<String>) -> Self {
        Self {
            broker,
            identity_id: identity_id.into(),
            credentials: None,
        }
    }

    pub fn identity_id(&self) -> &str {
        &self.identity_id
    }
}

#[async_trait]
impl RenewableCredential for BoundCredentials {
    fn current(&self) -> Option<&TemporaryCredentials> {
        self.credentials.as_ref()
    }

    async fn renew(&mut self) -> Result<()> {
        let credentials = self
            .broker
            .get_credentials(&self.identity_id)
            .await?
            .ok_or_else(|| {
                IdentityError::Unauthorized(format!(
                    "identity {} has no login to obtain credentials with",
                    self.identity_id
                ))
            })?;
        self.credentials = Some(credentials);
        Ok(())
    }
}

/// Per-caller credential cache. Returns the held credentials while they are
/// valid and renews them once expired.
pub struct CredentialContext<C = BoundCredentials> {
    credential: C,
    renewals: u64,
}

impl<C: RenewableCredential> CredentialContext<C> {
    pub fn new(credential: C) -> Self {
        Self {
            credential,
            renewals: 0,
        }
    }

    pub async fn credentials(&mut self) -> Result<&TemporaryCredentials> {
        if self.credential.is_expired() {
            self.credential.renew().await?;
            self.renewals += 1;
        }
        self.credential
            .current()
            .ok_or_else(|| IdentityError::Unauthorized("no credentials available".into()))
    }

    /// Number of renewals performed so far.
    pub fn renewals(&self) -> u64 {
        self.renewals
    }

    pub fn into_inner(self) -> C {
        self.credential
    }
}
