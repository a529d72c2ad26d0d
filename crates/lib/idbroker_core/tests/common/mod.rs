//! Shared fixture: a broker over the in-memory directory, a mail sender that
//! records what it was asked to send and a scripted OAuth exchange.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Duration;
use idbroker_core::config::{BrokerConfig, DirectorySettings, ProviderSettings};
use idbroker_core::directory::memory::MemoryDirectory;
use idbroker_core::mail::{MailSender, OutgoingMail};
use idbroker_core::oauth::{OAuthError, OAuthExchange, ProviderToken};
use idbroker_core::{IdentityBroker, Provider};
use serde_json::Value;

#[derive(Default)]
pub struct RecordingMail {
    sent: Mutex<Vec<OutgoingMail>>,
}

impl RecordingMail {
    pub fn sent(&self) -> Vec<OutgoingMail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MailSender for RecordingMail {
    async fn send(&self, mail: &OutgoingMail) -> idbroker_core::Result<()> {
        self.sent.lock().unwrap().push(mail.clone());
        Ok(())
    }
}

/// OAuth exchange answering from scripted responses.
#[derive(Default)]
pub struct StubOAuth {
    codes: Mutex<HashMap<String, ProviderToken>>,
    refreshes: Mutex<HashMap<String, ProviderToken>>,
    profiles: Mutex<HashMap<String, Value>>,
}

impl StubOAuth {
    pub fn on_code(&self, code: &str, token: ProviderToken, profile: Option<Value>) {
        if let (Some(access), Some(profile)) = (&token.access_token, profile) {
            self.profiles
                .lock()
                .unwrap()
                .insert(access.clone(), profile);
        }
        self.codes.lock().unwrap().insert(code.to_string(), token);
    }

    pub fn on_refresh(&self, refresh_token: &str, token: ProviderToken) {
        self.refreshes
            .lock()
            .unwrap()
            .insert(refresh_token.to_string(), token);
    }
}

#[async_trait]
impl OAuthExchange for StubOAuth {
    async fn exchange_code(
        &self,
        _provider: &Provider,
        _settings: &ProviderSettings,
        code: &str,
        _client_id: &str,
        _redirect_uri: &str,
    ) -> Result<ProviderToken, OAuthError> {
        self.codes
            .lock()
            .unwrap()
            .get(code)
            .cloned()
            .ok_or_else(|| OAuthError::Rejected("invalid_grant".into()))
    }

    async fn exchange_refresh_token(
        &self,
        _provider: &Provider,
        _settings: &ProviderSettings,
        refresh_token: &str,
    ) -> Result<ProviderToken, OAuthError> {
        self.refreshes
            .lock()
            .unwrap()
            .get(refresh_token)
            .cloned()
            .ok_or_else(|| OAuthError::Rejected("invalid_grant".into()))
    }

    async fn fetch_profile(
        &self,
        _provider: &Provider,
        _settings: &ProviderSettings,
        access_token: &str,
    ) -> Result<Option<Value>, OAuthError> {
        Ok(self.profiles.lock().unwrap().get(access_token).cloned())
    }
}

pub struct Harness {
    pub broker: IdentityBroker,
    pub directory: Arc<MemoryDirectory>,
    pub mail: Arc<RecordingMail>,
    pub oauth: Arc<StubOAuth>,
}

pub fn config() -> BrokerConfig {
    let providers = Provider::OAUTH
        .into_iter()
        .filter_map(|p| {
            let mut settings = ProviderSettings::defaults_for(&p)?;
            settings.client_id = "test-client".into();
            settings.client_secret = "test-secret".into();
            Some((p, settings))
        })
        .collect();
    BrokerConfig {
        providers,
        ..BrokerConfig::default()
    }
}

pub fn harness() -> Harness {
    harness_with(MemoryDirectory::new(DirectorySettings::default()))
}

/// Harness whose credentials expire `ttl` after issue.
pub fn harness_with_ttl(ttl: Duration) -> Harness {
    harness_with(MemoryDirectory::new(DirectorySettings::default()).with_credentials_ttl(ttl))
}

fn harness_with(directory: MemoryDirectory) -> Harness {
    let directory = Arc::new(directory);
    let mail = Arc::new(RecordingMail::default());
    let oauth = Arc::new(StubOAuth::default());
    let broker = IdentityBroker::new(
        config(),
        directory.clone(),
        directory.clone(),
        mail.clone(),
        oauth.clone(),
    );
    Harness {
        broker,
        directory,
        mail,
        oauth,
    }
}

pub fn token(access: &str, id_token: Option<&str>, refresh: Option<&str>) -> ProviderToken {
    ProviderToken {
        access_token: Some(access.to_string()),
        id_token: id_token.map(str::to_string),
        refresh_token: refresh.map(str::to_string),
        expires_in: Some(3600),
        ..ProviderToken::default()
    }
}

/// Script a Google login: `code` yields id token `id_token` and refresh
/// token `refresh`, with a profile carrying `email` when given.
pub fn script_google(h: &Harness, code: &str, id_token: &str, refresh: Option<&str>, email: Option<&str>) {
    let access = format!("access-{id_token}");
    let profile = match email {
        Some(email) => serde_json::json!({"name": "Gina", "email": email}),
        None => serde_json::json!({"name": "Gina"}),
    };
    h.oauth
        .on_code(code, token(&access, Some(id_token), refresh), Some(profile));
}
