//! # idbroker_core
//!
//! Identity resolution, linking and credential refresh for the identity broker.
//!
//! [`IdentityBroker`] is the entry point. It talks to an [`IdentityDirectory`]
//! and a [`RecordStore`] (see [`directory::memory::MemoryDirectory`] for an
//! in-process implementation), a [`MailSender`] for password resets and an
//! [`OAuthExchange`] for federated providers.

pub mod broker;
pub mod config;
pub mod directory;
pub mod error;
pub mod hashing;
pub mod mail;
pub mod models;
pub mod oauth;
pub mod provider;
pub mod records;

pub use broker::{BoundCredentials, CredentialContext, IdentityBroker, RenewableCredential};
pub use config::BrokerConfig;
pub use directory::{IdentityDirectory, RecordStore};
pub use error::{IdentityError, Result};
pub use mail::MailSender;
pub use oauth::OAuthExchange;
pub use provider::Provider;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
