//! Per-provider token/profile normalization.

use serde_json::Value;

use super::{NormalizedLogin, OAuthError, ProviderToken};
use crate::provider::Provider;

fn field(profile: Option<&Value>, path: &[&str]) -> Option<String> {
    let mut value = profile?;
    for key in path {
        value = value.get(key)?;
    }
    value.as_str().map(str::to_string)
}

/// Reduce a provider response to the login subject, name and email.
///
/// | provider | subject |
/// |----------|---------|
/// | google   | `id_token` |
/// | amazon, facebook, twitter | `access_token` |
/// | stripe   | `profile.id` |
/// | paypal   | last `/` segment of `profile.user_id` |
pub fn normalize(
    provider: &Provider,
    token: &ProviderToken,
    profile: Option<&Value>,
) -> Result<NormalizedLogin, OAuthError> {
    let name = |path: &[&str]| field(profile, path);
    let email = field(profile, &["email"]);

    let (id_token, name, email) = match provider {
        Provider::Google => (token.id_token.clone(), name(&["name"]), email),
        Provider::Amazon | Provider::Facebook => {
            (token.access_token.clone(), name(&["name"]), email)
        }
        Provider::Twitter => (token.access_token.clone(), name(&["data", "name"]), None),
        Provider::Stripe => (field(profile, &["id"]), name(&["display_name"]), email),
        Provider::PayPal => {
            let id = field(profile, &["user_id"])
                .map(|id| id.rsplit('/').next().unwrap_or_default().to_string());
            (id, name(&["name"]), email)
        }
        Provider::Developer(other) => {
            return Err(OAuthError::UnsupportedProvider(other.clone()));
        }
    };

    let id_token = id_token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| OAuthError::MissingToken(provider.to_string()))?;

    Ok(NormalizedLogin {
        id_token,
        name,
        email,
    })
}
