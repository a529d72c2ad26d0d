//! Broker domain models.
//!
//! Serialized field names are camelCase, matching what the front controller
//! returns to clients.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::provider::Provider;

/// The login an identity used most recently.
///
/// `provider = None` is a developer login by email; the token then holds the
/// email, or nothing if the identity has no email identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentLogin {
    pub provider: Option<Provider>,
    pub token: Option<String>,
}

/// Result of a successful login or signup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginOutcome {
    /// Durable identity id, the subject for token issuance.
    pub id: String,
    /// Lifetime in seconds of the provider token, for federated logins.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
}

impl LoginOutcome {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            expires_in: None,
        }
    }
}

/// A federated token obtained with a refresh grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshedLogin {
    pub token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
}

/// Logins attached to an identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LinkedLogins {
    pub id: String,
    /// Plain email developer identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Provider name → linked, for federated logins and prefixed developer
    /// identifiers (`stripe`, `paypal`, ...).
    #[serde(flatten)]
    pub linked: BTreeMap<String, bool>,
}

impl LinkedLogins {
    pub fn is_linked(&self, provider: &Provider) -> bool {
        self.linked.get(provider.as_str()).copied().unwrap_or(false)
    }
}

/// Full user profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: String,
    /// Stored name, falling back to the email, then the id.
    pub name: String,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Provider of the current login; absent for email logins.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// Whether a password is set.
    pub password: bool,
    #[serde(flatten)]
    pub linked: BTreeMap<String, bool>,
    /// `profile<provider>` → JSON text returned by that provider.
    #[serde(flatten)]
    pub provider_profiles: BTreeMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_serializes_flat() {
        let profile = Profile {
            id: "local:1".into(),
            name: "Ann".into(),
            display_name: "Ann".into(),
            email: Some("ann@test.com".into()),
            provider: None,
            password: true,
            linked: BTreeMap::from([("google".to_string(), true)]),
            provider_profiles: BTreeMap::from([(
                "profilegoogle".to_string(),
                "{\"name\":\"Ann\"}".to_string(),
            )]),
        };
        let json = serde_json::to_value(&profile).unwrap();
        assert_eq!(json["displayName"], "Ann");
        assert_eq!(json["google"], true);
        assert_eq!(json["password"], true);
        assert_eq!(json["profilegoogle"], "{\"name\":\"Ann\"}");
        assert!(json.get("provider").is_none());
    }

    #[test]
    fn login_outcome_omits_missing_expiry() {
        let json = serde_json::to_value(LoginOutcome::new("local:1")).unwrap();
        assert_eq!(json, serde_json::json!({"id": "local:1"}));
    }
}
