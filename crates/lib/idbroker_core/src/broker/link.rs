//! Linking and unlinking logins.
//!
//! Which directory call links two logins depends on whether each side is a
//! developer identifier or a federated login:
//!
//! | current   | target    | call |
//! |-----------|-----------|------|
//! | developer | developer | merge the current identity into the target's |
//! | federated | federated | open-id token with both logins |
//! | federated | developer | merge through an existing developer identifier, or open-id token with both |
//! | developer | federated | open-id token with both |
//!
//! Callers check for conflicting identities before linking.

use serde_json::Value;
use tracing::{debug, info};

use super::{IdentityBroker, missing};
use crate::directory::Logins;
use crate::error::Result;
use crate::provider::{Provider, developer_prefix};

impl IdentityBroker {
    /// Link a provider login to an identity, then store the provider's
    /// refresh token and profile on the linked identity. Returns the identity id after linking, which
    /// differs from `identity_id` when the identity was merged away.
    pub async fn link(
        &self,
        identity_id: &str,
        provider: &Provider,
        token: &str,
        refresh_token: Option<&str>,
        profile: Option<&Value>,
    ) -> Result<String> {
        let current = self.current_login(identity_id).await?;
        let current_token = current
            .token
            .ok_or_else(|| missing(format!("identity {identity_id} has no current login")))?;

        let linked = self
            .link_with_token(current.provider.as_ref(), &current_token, Some(provider), token)
            .await?;
        self.update_refresh_token(&linked, provider, refresh_token, profile)
            .await?;
        info!(identity_id, linked, %provider, "login linked");
        Ok(linked)
    }

    /// Remove a provider login from an identity. `token` names the exact
    /// login; without it the single login of that provider is removed.
    pub async fn unlink(
        &self,
        identity_id: &str,
        provider: Option<&Provider>,
        token: Option<&str>,
    ) -> Result<()> {
        let current = self.current_login(identity_id).await?;
        let current_token = current
            .token
            .ok_or_else(|| missing(format!("identity {identity_id} has no current login")))?;

        self.unlink_with_token(current.provider.as_ref(), &current_token, provider, token)
            .await?;
        info!(identity_id, provider = ?provider.map(Provider::as_str), "login unlinked");
        Ok(())
    }

    /// Link the target login to the identity of the current login.
    pub async fn link_with_token(
        &self,
        current_provider: Option<&Provider>,
        current_token: &str,
        target_provider: Option<&Provider>,
        target_token: &str,
    ) -> Result<String> {
        let identity_id = self
            .get_id(current_provider, current_token)
            .await?
            .ok_or_else(|| missing(format!("no identity for {current_token}")))?;

        let current = self.normalize(current_provider, Some(current_token));
        let target = self.normalize(target_provider, Some(target_token));
        let (Some(current_token), Some(target_token)) = (current.token, target.token) else {
            return Err(missing("nothing to link"));
        };

        let dev = self.settings().developer_provider_name.clone();
        match (current.is_developer, target.is_developer) {
            (true, true) => {
                debug!(identity_id, "linking two developer identifiers");
                self.link_developers(&current_token, &target_token).await
            }
            (false, false) => {
                debug!(identity_id, "linking two federated logins");
                let logins = Logins::from([
                    (current.namespace, current_token),
                    (target.namespace, target_token),
                ]);
                Ok(self.open_id_token(Some(&identity_id), &logins).await?.identity_id)
            }
            (false, true) => {
                let existing = self.developer_identifiers(&identity_id).await?;
                match existing.first() {
                    Some(identifier) => {
                        debug!(identity_id, "linking developer identifier through an existing one");
                        self.link_developers(identifier, &target_token).await
                    }
                    None => {
                        debug!(identity_id, "linking developer identifier to a federated identity");
                        let logins = Logins::from([
                            (current.namespace, current_token),
                            (dev, target_token),
                        ]);
                        Ok(self.open_id_token(Some(&identity_id), &logins).await?.identity_id)
                    }
                }
            }
            (true, false) => {
                debug!(identity_id, "linking federated login to a developer identity");
                let logins = Logins::from([
                    (target.namespace, target_token),
                    (dev, current_token),
                ]);
                Ok(self.open_id_token(Some(&identity_id), &logins).await?.identity_id)
            }
        }
    }

    /// Ensure the destination developer identity exists, then merge the
    /// source's identity into it.
    async fn link_developers(&self, source: &str, destination: &str) -> Result<String> {
        self.open_id_token(None, &self.developer_logins(destination))
            .await?;
        Ok(self
            .directory
            .merge_developer_identities(source, destination)
            .await?)
    }

    /// Unlink the target login from the identity of the current login.
    pub async fn unlink_with_token(
        &self,
        current_provider: Option<&Provider>,
        current_token: &str,
        target_provider: Option<&Provider>,
        target_token: Option<&str>,
    ) -> Result<()> {
        let identity_id = self
            .get_id(current_provider, current_token)
            .await?
            .ok_or_else(|| missing(format!("no identity for {current_token}")))?;

        let current = self.normalize(current_provider, Some(current_token));
        let target = self.normalize(target_provider, target_token);
        let current_token = current
            .token
            .ok_or_else(|| missing("no current login"))?;

        if target.is_developer {
            let identifier = match target.token {
                Some(identifier) => identifier,
                None => {
                    let prefix = target_provider.map(Provider::as_str).unwrap_or_default();
                    let separator = &self.settings().separator;
                    self.developer_identifiers(&identity_id)
                        .await?
                        .into_iter()
                        .find(|t| developer_prefix(t, separator) == prefix)
                        .ok_or_else(|| {
                            missing(format!("no {prefix} identifier linked to {identity_id}"))
                        })?
                }
            };
            return Ok(self
                .directory
                .unlink_developer_identity(&identity_id, &identifier)
                .await?);
        }

        let proof = if !current.is_developer {
            Logins::from([(current.namespace, current_token)])
        } else if let Some(token) = target.token {
            Logins::from([(target.namespace.clone(), token)])
        } else {
            let open_id = self
                .open_id_token(Some(&identity_id), &self.developer_logins(&current_token))
                .await?;
            Logins::from([(self.settings().openid_namespace.clone(), open_id.token)])
        };

        Ok(self
            .directory
            .unlink_login(&identity_id, &proof, &[target.namespace])
            .await?)
    }
}
