//! Broker configuration.

use std::collections::BTreeMap;
use std::env;

use crate::provider::Provider;

/// Configuration for the identity broker.
#[derive(Clone, Debug, Default)]
pub struct BrokerConfig {
    pub directory: DirectorySettings,
    pub password_reset: PasswordResetSettings,
    /// OAuth settings per provider. Providers without an entry cannot be
    /// used for federated login.
    pub providers: BTreeMap<Provider, ProviderSettings>,
}

/// Where identities and their records live.
#[derive(Clone, Debug)]
pub struct DirectorySettings {
    /// Identity pool id in the directory.
    pub pool_id: String,
    /// Namespace under which developer identifiers are registered.
    pub developer_provider_name: String,
    /// Separates a pseudo-provider name from its external id.
    pub separator: String,
    /// Namespace of the directory's own open-id tokens.
    pub openid_namespace: String,
    /// Dataset holding the profile records.
    pub dataset_name: String,
}

impl Default for DirectorySettings {
    fn default() -> Self {
        Self {
            pool_id: "local:identity-pool".into(),
            developer_provider_name: "login.idbroker".into(),
            separator: "----".into(),
            openid_namespace: "identity.directory".into(),
            dataset_name: "profile".into(),
        }
    }
}

/// Templates for the password reset email.
///
/// `url` may reference `{email}` and `{reset}`, `body` may reference `{name}`.
#[derive(Clone, Debug)]
pub struct PasswordResetSettings {
    pub url: String,
    pub body: String,
    pub subject: String,
    pub source: String,
}

impl Default for PasswordResetSettings {
    fn default() -> Self {
        Self {
            url: "http://localhost:8100/app.html#/reset/{email}/{reset}".into(),
            body: "Dear {name}, please follow the link below to reset your password:".into(),
            subject: "Password reset".into(),
            source: "Password reset <noreply@localhost>".into(),
        }
    }
}

/// OAuth endpoints and client credentials of one provider.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderSettings {
    /// Token endpoint for code and refresh-token grants.
    pub token_url: String,
    /// Profile ("people") endpoint called with the access token.
    pub profile_url: String,
    /// Client id used for refresh grants. Code grants use the caller's.
    pub client_id: String,
    pub client_secret: String,
}

impl ProviderSettings {
    /// Public endpoints of a provider with empty client credentials.
    pub fn defaults_for(provider: &Provider) -> Option<Self> {
        let (token_url, profile_url) = match provider {
            Provider::Google => (
                "https://accounts.google.com/o/oauth2/token",
                "https://www.googleapis.com/plus/v1/people/me/openIdConnect",
            ),
            Provider::Facebook => (
                "https://graph.facebook.com/v2.3/oauth/access_token",
                "https://graph.facebook.com/v2.3/me?fields=id,name,email",
            ),
            Provider::Amazon => (
                "https://api.amazon.com/auth/o2/token",
                "https://api.amazon.com/user/profile",
            ),
            Provider::Twitter => (
                "https://api.twitter.com/2/oauth2/token",
                "https://api.twitter.com/2/users/me",
            ),
            Provider::Stripe => (
                "https://connect.stripe.com/oauth/token",
                "https://api.stripe.com/v1/account",
            ),
            Provider::PayPal => (
                "https://api.sandbox.paypal.com/v1/identity/openidconnect/tokenservice",
                "https://api.sandbox.paypal.com/v1/identity/openidconnect/userinfo?schema=openid",
            ),
            Provider::Developer(_) => return None,
        };
        Some(Self {
            token_url: token_url.into(),
            profile_url: profile_url.into(),
            client_id: String::new(),
            client_secret: String::new(),
        })
    }
}

impl BrokerConfig {
    /// Reads configuration from environment variables with development defaults.
    ///
    /// | Variable                  | Default                                  |
    /// |---------------------------|------------------------------------------|
    /// | `IDENTITY_POOL_ID`        | `local:identity-pool`                    |
    /// | `DEVELOPER_PROVIDER_NAME` | `login.idbroker`                         |
    /// | `DEVELOPER_SEPARATOR`     | `----`                                   |
    /// | `OPENID_NAMESPACE`        | `identity.directory`                     |
    /// | `PROFILE_DATASET_NAME`    | `profile`                                |
    /// | `PASSWORD_RESET_URL` / `_BODY` / `_SUBJECT` / `_SOURCE` | see [`PasswordResetSettings`] |
    /// | `<PROVIDER>_CLIENT_ID`, `<PROVIDER>_SECRET` | empty                  |
    /// | `<PROVIDER>_TOKEN_URL`, `<PROVIDER>_PROFILE_URL` | public endpoints  |
    pub fn from_env() -> Self {
        let dir = DirectorySettings::default();
        let reset = PasswordResetSettings::default();

        let directory = DirectorySettings {
            pool_id: env_or("IDENTITY_POOL_ID", dir.pool_id),
            developer_provider_name: env_or("DEVELOPER_PROVIDER_NAME", dir.developer_provider_name),
            separator: env_or("DEVELOPER_SEPARATOR", dir.separator),
            openid_namespace: env_or("OPENID_NAMESPACE", dir.openid_namespace),
            dataset_name: env_or("PROFILE_DATASET_NAME", dir.dataset_name),
        };

        let password_reset = PasswordResetSettings {
            url: env_or("PASSWORD_RESET_URL", reset.url),
            body: env_or("PASSWORD_RESET_BODY", reset.body),
            subject: env_or("PASSWORD_RESET_SUBJECT", reset.subject),
            source: env_or("PASSWORD_RESET_SOURCE", reset.source),
        };

        let mut providers = BTreeMap::new();
        for provider in Provider::OAUTH {
            let Some(defaults) = ProviderSettings::defaults_for(&provider) else {
                continue;
            };
            let prefix = provider.env_prefix();
            let settings = ProviderSettings {
                token_url: env_or(&format!("{prefix}_TOKEN_URL"), defaults.token_url),
                profile_url: env_or(&format!("{prefix}_PROFILE_URL"), defaults.profile_url),
                client_id: env_or(&format!("{prefix}_CLIENT_ID"), defaults.client_id),
                client_secret: env_or(&format!("{prefix}_SECRET"), defaults.client_secret),
            };
            providers.insert(provider, settings);
        }

        Self {
            directory,
            password_reset,
            providers,
        }
    }

    /// Settings for a provider, if it is configured.
    pub fn provider(&self, provider: &Provider) -> Option<&ProviderSettings> {
        self.providers.get(provider)
    }
}

fn env_or(key: &str, default: String) -> String {
    match env::var(key) {
        Ok(v) if !v.is_empty() => v,
        _ => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_env_configures_every_oauth_provider() {
        let config = BrokerConfig::from_env();
        for p in Provider::OAUTH {
            assert!(config.provider(&p).is_some(), "missing settings for {p}");
        }
        assert!(config.provider(&Provider::from_name("github")).is_none());
    }

    #[test]
    fn developer_providers_have_no_default_endpoints() {
        assert!(ProviderSettings::defaults_for(&Provider::Developer("x".into())).is_none());
        let stripe = ProviderSettings::defaults_for(&Provider::Stripe).unwrap();
        assert!(stripe.token_url.starts_with("https://connect.stripe.com"));
    }

    #[test]
    fn default_separator_is_four_dashes() {
        assert_eq!(DirectorySettings::default().separator, "----");
    }
}
