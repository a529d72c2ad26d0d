//! Identity directory and record store contracts.
//!
//! The broker keeps no identities of its own. A directory service owns the
//! durable identity ids, the developer identifiers and federated logins
//! attached to them, and a small per-identity record store with optimistic
//! concurrency. [`memory::MemoryDirectory`] implements both traits in process.

pub mod memory;

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Logins presented to the directory: namespace → token.
pub type Logins = BTreeMap<String, String>;

/// Errors reported by the directory or the record store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("{0}")]
    NotFound(String),

    /// A presented login is invalid or has expired.
    #[error("{0}")]
    NotAuthorized(String),

    /// Version mismatch on a record patch, or an identifier owned elsewhere.
    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Upstream(String),
}

/// An open-id token issued by the directory for an identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenIdToken {
    pub identity_id: String,
    pub token: String,
}

/// Identity as described by the directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityDescription {
    pub identity_id: String,
    /// Namespaces of the attached federated logins.
    pub logins: Vec<String>,
}

/// Temporary access credentials issued for an identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemporaryCredentials {
    pub identity_id: String,
    pub access_key_id: String,
    pub secret_key: String,
    pub session_token: String,
    pub expiration: DateTime<Utc>,
}

impl TemporaryCredentials {
    pub fn is_expired(&self) -> bool {
        self.expiration <= Utc::now()
    }
}

/// A record in an identity's dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub key: String,
    pub value: Option<String>,
    pub sync_count: u64,
}

/// Dataset contents plus the session token required to patch them.
#[derive(Debug, Clone, Default)]
pub struct RecordSnapshot {
    pub records: Vec<Record>,
    pub session_token: String,
}

impl RecordSnapshot {
    pub fn get(&self, key: &str) -> Option<&Record> {
        self.records.iter().find(|r| r.key == key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchOp {
    Create,
    Replace,
    Remove,
}

/// One write in a record batch. `sync_count` echoes the last observed
/// version, 0 for a record not seen before.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordPatch {
    pub op: PatchOp,
    pub key: String,
    pub value: Option<String>,
    pub sync_count: u64,
}

/// Durable identity directory.
#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    /// Identity owning a developer identifier, if any.
    async fn lookup_developer_identity(
        &self,
        identifier: &str,
    ) -> Result<Option<String>, DirectoryError>;

    /// Developer identifiers attached to an identity.
    async fn developer_identifiers(&self, identity_id: &str)
    -> Result<Vec<String>, DirectoryError>;

    /// Identity for a set of federated logins, created when none exists.
    async fn get_id(&self, logins: &Logins) -> Result<String, DirectoryError>;

    /// Issue an open-id token for a developer identity.
    ///
    /// Without `identity_id` the identity is resolved from (or created for)
    /// the developer identifier in `logins`. With `identity_id` every login in
    /// `logins` is attached to that identity.
    async fn get_open_id_token_for_developer_identity(
        &self,
        identity_id: Option<&str>,
        logins: &Logins,
    ) -> Result<OpenIdToken, DirectoryError>;

    /// Merge the identity of `source` into the identity of `destination`,
    /// returning the surviving identity id.
    async fn merge_developer_identities(
        &self,
        source: &str,
        destination: &str,
    ) -> Result<String, DirectoryError>;

    async fn unlink_developer_identity(
        &self,
        identity_id: &str,
        identifier: &str,
    ) -> Result<(), DirectoryError>;

    /// Remove federated logins. `logins` proves continued ownership.
    async fn unlink_login(
        &self,
        identity_id: &str,
        logins: &Logins,
        logins_to_remove: &[String],
    ) -> Result<(), DirectoryError>;

    async fn describe_identity(
        &self,
        identity_id: &str,
    ) -> Result<IdentityDescription, DirectoryError>;

    /// Exchange logins for temporary credentials. Fails with
    /// [`DirectoryError::NotAuthorized`] when a federated token is stale.
    async fn get_credentials_for_identity(
        &self,
        identity_id: &str,
        logins: &Logins,
    ) -> Result<TemporaryCredentials, DirectoryError>;
}

/// Per-identity key/value store with optimistic concurrency.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn list_records(
        &self,
        identity_id: &str,
        dataset: &str,
    ) -> Result<RecordSnapshot, DirectoryError>;

    /// Apply a batch of patches. Fails with [`DirectoryError::Conflict`] when
    /// a patch does not echo the current version of its record.
    async fn patch_records(
        &self,
        identity_id: &str,
        dataset: &str,
        session_token: &str,
        patches: &[RecordPatch],
    ) -> Result<(), DirectoryError>;
}
