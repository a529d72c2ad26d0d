//! Subcommand implementations. Each returns the JSON document to print.

use std::sync::Arc;

use idbroker_core::IdentityBroker;
use idbroker_core::config::BrokerConfig;
use idbroker_core::directory::memory::MemoryDirectory;
use idbroker_core::hashing::generate_reset_token;
use idbroker_core::mail::{LogMailSender, render_reset_mail};
use idbroker_core::oauth::HttpOAuthExchange;
use idbroker_core::provider::{self, Provider};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::info;

use crate::Result;

#[derive(Debug, Serialize)]
pub struct ProviderRow {
    pub provider: String,
    pub namespace: String,
    pub federated: bool,
    pub token_url: Option<String>,
    pub client_configured: bool,
}

pub fn providers(config: &BrokerConfig) -> Vec<ProviderRow> {
    Provider::OAUTH
        .iter()
        .map(|p| {
            let settings = config.provider(p);
            ProviderRow {
                provider: p.to_string(),
                namespace: p
                    .federated_namespace()
                    .map(str::to_string)
                    .unwrap_or_else(|| config.directory.developer_provider_name.clone()),
                federated: p.is_federated(),
                token_url: settings.map(|s| s.token_url.clone()),
                client_configured: settings.is_some_and(|s| !s.client_secret.is_empty()),
            }
        })
        .collect()
}

pub fn normalize(config: &BrokerConfig, provider: Option<&str>, token: &str) -> Result<Value> {
    let provider = provider.map(Provider::from_name);
    let normalized = provider::normalize(provider.as_ref(), Some(token), &config.directory);
    Ok(serde_json::to_value(normalized)?)
}

pub fn reset_mail(config: &BrokerConfig, email: &str) -> Result<Value> {
    let reset = generate_reset_token();
    let mail = render_reset_mail(&config.password_reset, email, &reset);
    Ok(json!({ "reset": reset, "mail": mail }))
}

/// Signup, login, profile and credentials against a fresh in-memory directory.
pub async fn demo(config: BrokerConfig, name: &str, email: &str, password: &str) -> Result<Value> {
    let directory = Arc::new(MemoryDirectory::new(config.directory.clone()));
    let broker = IdentityBroker::new(
        config,
        directory.clone(),
        directory,
        Arc::new(LogMailSender),
        Arc::new(HttpOAuthExchange::new()),
    );

    let signup = broker.signup(name, email, password).await?;
    info!(id = %signup.id, "demo identity created");
    let login = broker.login(email, Some(password), None).await?;
    let profile = broker.get_profile(&login.id).await?;
    let credentials = broker.get_credentials(&login.id).await?;

    Ok(json!({
        "signup": signup,
        "login": login,
        "profile": profile,
        "credentials": credentials,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_oauth_provider_is_listed() {
        let config = BrokerConfig::from_env();
        let rows = providers(&config);
        assert_eq!(rows.len(), Provider::OAUTH.len());
        let stripe = rows.iter().find(|r| r.provider == "stripe").unwrap();
        assert!(!stripe.federated);
        assert_eq!(stripe.namespace, config.directory.developer_provider_name);
        let google = rows.iter().find(|r| r.provider == "google").unwrap();
        assert_eq!(google.namespace, "accounts.google.com");
    }

    #[test]
    fn normalize_prefixes_pseudo_providers() {
        let value = normalize(&BrokerConfig::default(), Some("paypal"), "abc").unwrap();
        assert_eq!(value["is_developer"], true);
        assert_eq!(value["token"], "paypal----abc");
    }

    #[test]
    fn reset_mail_embeds_the_token() {
        let value = reset_mail(&BrokerConfig::default(), "ann@test.com").unwrap();
        let reset = value["reset"].as_str().unwrap();
        assert!(value["mail"]["text"].as_str().unwrap().contains(reset));
    }

    #[tokio::test]
    async fn demo_round_trips_a_profile() {
        let value = demo(BrokerConfig::default(), "Ann", "ann@test.com", "pw")
            .await
            .unwrap();
        assert_eq!(value["signup"]["id"], value["login"]["id"]);
        assert_eq!(value["profile"]["name"], "Ann");
        assert_eq!(value["profile"]["email"], "ann@test.com");
        assert!(value["credentials"]["accessKeyId"].is_string());
    }
}
