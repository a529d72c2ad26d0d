//! Read-side views of an identity.

use std::collections::BTreeMap;

use super::IdentityBroker;
use crate::error::{IdentityError, Result};
use crate::models::{LinkedLogins, Profile};
use crate::provider::{Provider, developer_prefix};

impl IdentityBroker {
    /// Federated logins and developer identifiers attached to an identity.
    pub async fn describe(&self, identity_id: &str) -> Result<LinkedLogins> {
        let (description, identifiers) = tokio::try_join!(
            async {
                self.directory
                    .describe_identity(identity_id)
                    .await
                    .map_err(IdentityError::from)
            },
            self.developer_identifiers(identity_id),
        )?;

        let mut linked = BTreeMap::new();
        for namespace in &description.logins {
            if let Some(provider) = Provider::from_namespace(namespace) {
                linked.insert(provider.as_str().to_string(), true);
            }
        }

        let mut email = None;
        for identifier in &identifiers {
            match developer_prefix(identifier, &self.settings().separator) {
                "" => email = Some(identifier.clone()),
                prefix => {
                    linked.insert(prefix.to_string(), true);
                }
            }
        }

        Ok(LinkedLogins {
            id: description.identity_id,
            email,
            linked,
        })
    }

    /// Linked logins together with the stored profile records.
    pub async fn get_profile(&self, identity_id: &str) -> Result<Profile> {
        let (logins, mut records) = tokio::try_join!(
            self.describe(identity_id),
            self.records
                .get_records(identity_id, &["name", "provider", "profile", "password"]),
        )?;

        let name = records
            .remove("name")
            .or_else(|| logins.email.clone())
            .unwrap_or_else(|| logins.id.clone());
        let provider = records.remove("provider");
        let password = records.remove("password").is_some();
        let provider_profiles = records
            .into_iter()
            .filter(|(k, _)| k.starts_with("profile"))
            .collect();

        Ok(Profile {
            id: logins.id,
            display_name: name.clone(),
            name,
            email: logins.email,
            provider,
            password,
            linked: logins.linked,
            provider_profiles,
        })
    }
}
