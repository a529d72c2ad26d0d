//! Provider normalization.
//!
//! Maps a login provider name onto the directory's provider namespace and
//! decides whether the login is owned by the broker itself (developer) or
//! delegated to a third party (federated).

use std::fmt;

use serde::Serialize;

use crate::config::DirectorySettings;

/// Login providers known to the broker.
///
/// The four federated providers are integrated natively with the identity
/// directory. Stripe, PayPal and any other name are stored as developer
/// identifiers prefixed with the provider name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Provider {
    Google,
    Facebook,
    Amazon,
    Twitter,
    Stripe,
    PayPal,
    Developer(String),
}

impl Provider {
    /// All providers with OAuth settings.
    pub const OAUTH: [Provider; 6] = [
        Provider::Google,
        Provider::Facebook,
        Provider::Amazon,
        Provider::Twitter,
        Provider::Stripe,
        Provider::PayPal,
    ];

    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "google" => Provider::Google,
            "facebook" => Provider::Facebook,
            "amazon" => Provider::Amazon,
            "twitter" => Provider::Twitter,
            "stripe" => Provider::Stripe,
            "paypal" => Provider::PayPal,
            _ => Provider::Developer(name.to_string()),
        }
    }

    /// Reverse lookup from a federated directory namespace.
    pub fn from_namespace(namespace: &str) -> Option<Self> {
        match namespace {
            "accounts.google.com" => Some(Provider::Google),
            "graph.facebook.com" => Some(Provider::Facebook),
            "www.amazon.com" => Some(Provider::Amazon),
            "api.twitter.com" => Some(Provider::Twitter),
            _ => None,
        }
    }

    /// Name used in record keys (`refresh<name>`) and developer prefixes.
    pub fn as_str(&self) -> &str {
        match self {
            Provider::Google => "google",
            Provider::Facebook => "facebook",
            Provider::Amazon => "amazon",
            Provider::Twitter => "twitter",
            Provider::Stripe => "stripe",
            Provider::PayPal => "paypal",
            Provider::Developer(name) => name,
        }
    }

    /// Directory namespace of a natively integrated provider.
    pub fn federated_namespace(&self) -> Option<&'static str> {
        match self {
            Provider::Google => Some("accounts.google.com"),
            Provider::Facebook => Some("graph.facebook.com"),
            Provider::Amazon => Some("www.amazon.com"),
            Provider::Twitter => Some("api.twitter.com"),
            Provider::Stripe | Provider::PayPal | Provider::Developer(_) => None,
        }
    }

    pub fn is_federated(&self) -> bool {
        self.federated_namespace().is_some()
    }

    /// Environment variable prefix for this provider's settings.
    pub fn env_prefix(&self) -> String {
        self.as_str().to_ascii_uppercase()
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A login expressed in directory terms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizedProvider {
    /// Directory namespace: a federated namespace or the developer provider name.
    pub namespace: String,
    pub is_developer: bool,
    /// Token as presented to the directory, prefixed for pseudo-providers.
    pub token: Option<String>,
}

/// Normalize a `(provider, token)` pair.
///
/// `None` as provider denotes a plain email login.
pub fn normalize(
    provider: Option<&Provider>,
    token: Option<&str>,
    settings: &DirectorySettings,
) -> NormalizedProvider {
    if let Some(namespace) = provider.and_then(Provider::federated_namespace) {
        return NormalizedProvider {
            namespace: namespace.to_string(),
            is_developer: false,
            token: token.map(str::to_string),
        };
    }

    let token = match (provider, token) {
        (Some(p), Some(t)) => Some(format!("{}{}{}", p.as_str(), settings.separator, t)),
        (_, t) => t.map(str::to_string),
    };

    NormalizedProvider {
        namespace: settings.developer_provider_name.clone(),
        is_developer: true,
        token,
    }
}

/// Pseudo-provider prefix of a developer identifier; empty for a plain email.
pub fn developer_prefix<'a>(identifier: &'a str, separator: &str) -> &'a str {
    match identifier.find(separator) {
        Some(idx) => &identifier[..idx],
        None => "",
    }
}
