//! In-process identity directory.
//!
//! Implements [`IdentityDirectory`] and [`RecordStore`] over a single
//! mutex-guarded state. Used by the test suite and the CLI demo. Federated
//! tokens are opaque: a token is its own subject unless [`MemoryDirectory::alias_token`]
//! declares it a refreshed token of an earlier one.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use super::{
    DirectoryError, IdentityDescription, IdentityDirectory, Logins, OpenIdToken, PatchOp, Record,
    RecordPatch, RecordSnapshot, RecordStore, TemporaryCredentials,
};
use crate::config::DirectorySettings;

/// Default lifetime of issued credentials: 1 hour.
const DEFAULT_CREDENTIALS_TTL_SECS: i64 = 3600;

#[derive(Debug, Default)]
struct IdentityEntry {
    /// namespace → subject
    logins: BTreeMap<String, String>,
    developer_ids: BTreeSet<String>,
    merged_into: Option<String>,
}

#[derive(Debug, Default)]
struct State {
    identities: HashMap<String, IdentityEntry>,
    developer_index: HashMap<String, String>,
    login_index: HashMap<(String, String), String>,
    aliases: HashMap<String, String>,
    expired: HashSet<String>,
    open_id_tokens: HashMap<String, String>,
    datasets: HashMap<(String, String), BTreeMap<String, Record>>,
    sessions: HashSet<String>,
}

impl State {
    /// Follow merge bookkeeping to the surviving identity.
    fn canonical(&self, identity_id: &str) -> Result<String, DirectoryError> {
        let mut id = identity_id;
        loop {
            let entry = self
                .identities
                .get(id)
                .ok_or_else(|| DirectoryError::NotFound(format!("identity {identity_id} not found")))?;
            match &entry.merged_into {
                Some(next) => id = next,
                None => return Ok(id.to_string()),
            }
        }
    }

    fn subject(&self, token: &str) -> String {
        self.aliases
            .get(token)
            .cloned()
            .unwrap_or_else(|| token.to_string())
    }

    fn create_identity(&mut self, region: &str) -> String {
        let id = format!("{region}:{}", Uuid::new_v4());
        self.identities.insert(id.clone(), IdentityEntry::default());
        id
    }

    fn attach_developer(&mut self, id: &str, identifier: &str) -> Result<(), DirectoryError> {
        if let Some(owner) = self.developer_index.get(identifier) {
            let owner = self.canonical(owner)?;
            if owner != id {
                return Err(DirectoryError::Conflict(format!(
                    "developer identifier {identifier} is linked to another identity"
                )));
            }
            return Ok(());
        }
        self.developer_index
            .insert(identifier.to_string(), id.to_string());
        if let Some(entry) = self.identities.get_mut(id) {
            entry.developer_ids.insert(identifier.to_string());
        }
        Ok(())
    }

    /// Attach a federated login. An identity bound only to that login is
    /// absorbed into `id`; one carrying anything else is a conflict.
    fn attach_login(&mut self, id: &str, namespace: &str, token: &str) -> Result<(), DirectoryError> {
        let subject = self.subject(token);
        let key = (namespace.to_string(), subject.clone());

        if let Some(owner) = self.login_index.get(&key).cloned() {
            let owner = self.canonical(&owner)?;
            if owner == id {
                return Ok(());
            }
            let bare = self
                .identities
                .get(&owner)
                .is_some_and(|e| e.logins.len() == 1 && e.developer_ids.is_empty());
            if !bare {
                return Err(DirectoryError::Conflict(format!(
                    "{namespace} login is linked to another identity"
                )));
            }
            self.merge(&owner, id);
            return Ok(());
        }

        let entry = self
            .identities
            .get_mut(id)
            .ok_or_else(|| DirectoryError::NotFound(format!("identity {id} not found")))?;
        if let Some(existing) = entry.logins.get(namespace)
            && *existing != subject
        {
            return Err(DirectoryError::Conflict(format!(
                "identity {id} already has a different {namespace} login"
            )));
        }
        entry.logins.insert(namespace.to_string(), subject);
        self.login_index.insert(key, id.to_string());
        Ok(())
    }

    /// Move logins, developer identifiers and records of `source` into
    /// `destination`. Records already present in the destination win.
    fn merge(&mut self, source: &str, destination: &str) {
        debug!(source, destination, "merging identities");
        let Some(src) = self.identities.get_mut(source) else {
            return;
        };
        let logins = std::mem::take(&mut src.logins);
        let developer_ids = std::mem::take(&mut src.developer_ids);
        src.merged_into = Some(destination.to_string());

        for (namespace, subject) in &logins {
            self.login_index
                .insert((namespace.clone(), subject.clone()), destination.to_string());
        }
        for identifier in &developer_ids {
            self.developer_index
                .insert(identifier.clone(), destination.to_string());
        }
        if let Some(dst) = self.identities.get_mut(destination) {
            for (namespace, subject) in logins {
                dst.logins.entry(namespace).or_insert(subject);
            }
            dst.developer_ids.extend(developer_ids);
        }

        let moved: Vec<(String, String)> = self
            .datasets
            .keys()
            .filter(|(id, _)| id == source)
            .cloned()
            .collect();
        for key in moved {
            let Some(records) = self.datasets.remove(&key) else {
                continue;
            };
            let target = self
                .datasets
                .entry((destination.to_string(), key.1))
                .or_default();
            for (k, record) in records {
                target.entry(k).or_insert(record);
            }
        }
    }

    /// Check that a presented login is valid for the identity.
    fn validate_login(
        &self,
        id: &str,
        namespace: &str,
        token: &str,
        settings: &DirectorySettings,
    ) -> Result<(), DirectoryError> {
        if self.expired.contains(token) {
            return Err(DirectoryError::NotAuthorized("Token is expired.".into()));
        }

        let owner = if namespace == settings.openid_namespace {
            self.open_id_tokens.get(token)
        } else if namespace == settings.developer_provider_name {
            None
        } else {
            self.login_index
                .get(&(namespace.to_string(), self.subject(token)))
        };

        match owner.map(|o| self.canonical(o)).transpose()? {
            Some(owner) if owner == id => Ok(()),
            _ => Err(DirectoryError::NotAuthorized("Invalid login token.".into())),
        }
    }
}

/// In-memory identity directory and record store.
pub struct MemoryDirectory {
    settings: DirectorySettings,
    credentials_ttl: Duration,
    state: Mutex<State>,
}

impl MemoryDirectory {
    pub fn new(settings: DirectorySettings) -> Self {
        Self {
            settings,
            credentials_ttl: Duration::seconds(DEFAULT_CREDENTIALS_TTL_SECS),
            state: Mutex::new(State::default()),
        }
    }

    /// Set the lifetime of issued credentials.
    pub fn with_credentials_ttl(mut self, ttl: Duration) -> Self {
        self.credentials_ttl = ttl;
        self
    }

    fn region(&self) -> &str {
        self.settings
            .pool_id
            .split(':')
            .next()
            .unwrap_or("local")
    }

    /// Mark a federated token as stale; credential exchanges presenting it
    /// fail with [`DirectoryError::NotAuthorized`].
    pub async fn expire_token(&self, token: &str) {
        self.state.lock().await.expired.insert(token.to_string());
    }

    /// Declare `token` a refreshed token for the same subject as `previous`.
    pub async fn alias_token(&self, token: &str, previous: &str) {
        let mut state = self.state.lock().await;
        let subject = state.subject(previous);
        state.aliases.insert(token.to_string(), subject);
    }

    /// Surviving identity id after any merges.
    pub async fn canonical_id(&self, identity_id: &str) -> Result<String, DirectoryError> {
        self.state.lock().await.canonical(identity_id)
    }

    /// Number of identities that have not been merged away.
    pub async fn active_identities(&self) -> usize {
        self.state
            .lock()
            .await
            .identities
            .values()
            .filter(|e| e.merged_into.is_none())
            .count()
    }
}

#[async_trait]
impl IdentityDirectory for MemoryDirectory {
    async fn lookup_developer_identity(
        &self,
        identifier: &str,
    ) -> Result<Option<String>, DirectoryError> {
        let state = self.state.lock().await;
        state
            .developer_index
            .get(identifier)
            .map(|id| state.canonical(id))
            .transpose()
    }

    async fn developer_identifiers(
        &self,
        identity_id: &str,
    ) -> Result<Vec<String>, DirectoryError> {
        let state = self.state.lock().await;
        let id = state.canonical(identity_id)?;
        Ok(state
            .identities
            .get(&id)
            .map(|e| e.developer_ids.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn get_id(&self, logins: &Logins) -> Result<String, DirectoryError> {
        if logins.is_empty() {
            return Err(DirectoryError::Upstream("no logins supplied".into()));
        }
        if logins.contains_key(&self.settings.developer_provider_name) {
            return Err(DirectoryError::Upstream(
                "developer identifiers cannot be resolved with get_id".into(),
            ));
        }

        let mut state = self.state.lock().await;
        let existing = logins.iter().find_map(|(namespace, token)| {
            state
                .login_index
                .get(&(namespace.clone(), state.subject(token)))
                .cloned()
        });
        let id = match existing {
            Some(id) => state.canonical(&id)?,
            None => state.create_identity(self.region()),
        };
        for (namespace, token) in logins {
            state.attach_login(&id, namespace, token)?;
        }
        Ok(id)
    }

    async fn get_open_id_token_for_developer_identity(
        &self,
        identity_id: Option<&str>,
        logins: &Logins,
    ) -> Result<OpenIdToken, DirectoryError> {
        let developer = logins.get(&self.settings.developer_provider_name);
        let mut state = self.state.lock().await;

        let id = match (identity_id, developer) {
            (Some(id), _) => state.canonical(id)?,
            (None, Some(identifier)) => match state.developer_index.get(identifier).cloned() {
                Some(id) => state.canonical(&id)?,
                None => state.create_identity(self.region()),
            },
            (None, None) => {
                return Err(DirectoryError::Upstream(
                    "a developer identifier or identity id is required".into(),
                ));
            }
        };

        for (namespace, token) in logins {
            if *namespace == self.settings.developer_provider_name {
                state.attach_developer(&id, token)?;
            } else {
                state.attach_login(&id, namespace, token)?;
            }
        }

        let token = Uuid::new_v4().simple().to_string();
        state.open_id_tokens.insert(token.clone(), id.clone());
        Ok(OpenIdToken {
            identity_id: id,
            token,
        })
    }

    async fn merge_developer_identities(
        &self,
        source: &str,
        destination: &str,
    ) -> Result<String, DirectoryError> {
        let mut state = self.state.lock().await;
        let lookup = |state: &State, identifier: &str| {
            state
                .developer_index
                .get(identifier)
                .ok_or_else(|| {
                    DirectoryError::NotFound(format!("developer identifier {identifier} not found"))
                })
                .and_then(|id| state.canonical(id))
        };
        let src = lookup(&state, source)?;
        let dst = lookup(&state, destination)?;
        if src != dst {
            state.merge(&src, &dst);
        }
        Ok(dst)
    }

    async fn unlink_developer_identity(
        &self,
        identity_id: &str,
        identifier: &str,
    ) -> Result<(), DirectoryError> {
        let mut state = self.state.lock().await;
        let id = state.canonical(identity_id)?;
        let removed = state
            .identities
            .get_mut(&id)
            .is_some_and(|e| e.developer_ids.remove(identifier));
        if !removed {
            return Err(DirectoryError::NotFound(format!(
                "developer identifier {identifier} is not linked to {id}"
            )));
        }
        state.developer_index.remove(identifier);
        Ok(())
    }

    async fn unlink_login(
        &self,
        identity_id: &str,
        logins: &Logins,
        logins_to_remove: &[String],
    ) -> Result<(), DirectoryError> {
        let mut state = self.state.lock().await;
        let id = state.canonical(identity_id)?;
        for (namespace, token) in logins {
            state.validate_login(&id, namespace, token, &self.settings)?;
        }

        for namespace in logins_to_remove {
            let subject = state
                .identities
                .get_mut(&id)
                .and_then(|e| e.logins.remove(namespace))
                .ok_or_else(|| {
                    DirectoryError::NotFound(format!("no {namespace} login linked to {id}"))
                })?;
            state.login_index.remove(&(namespace.clone(), subject));
        }
        Ok(())
    }

    async fn describe_identity(
        &self,
        identity_id: &str,
    ) -> Result<IdentityDescription, DirectoryError> {
        let state = self.state.lock().await;
        let id = state.canonical(identity_id)?;
        let logins = state
            .identities
            .get(&id)
            .map(|e| e.logins.keys().cloned().collect())
            .unwrap_or_default();
        Ok(IdentityDescription {
            identity_id: id,
            logins,
        })
    }

    async fn get_credentials_for_identity(
        &self,
        identity_id: &str,
        logins: &Logins,
    ) -> Result<TemporaryCredentials, DirectoryError> {
        let state = self.state.lock().await;
        let id = state.canonical(identity_id)?;
        if logins.is_empty() {
            return Err(DirectoryError::NotAuthorized(
                "Unauthenticated access is not supported.".into(),
            ));
        }
        for (namespace, token) in logins {
            state.validate_login(&id, namespace, token, &self.settings)?;
        }

        Ok(TemporaryCredentials {
            identity_id: id,
            access_key_id: format!("ASIA{}", Uuid::new_v4().simple()),
            secret_key: Uuid::new_v4().simple().to_string(),
            session_token: Uuid::new_v4().to_string(),
            expiration: Utc::now() + self.credentials_ttl,
        })
    }
}

#[async_trait]
impl RecordStore for MemoryDirectory {
    async fn list_records(
        &self,
        identity_id: &str,
        dataset: &str,
    ) -> Result<RecordSnapshot, DirectoryError> {
        let mut state = self.state.lock().await;
        let id = state.canonical(identity_id)?;
        let records = state
            .datasets
            .get(&(id, dataset.to_string()))
            .map(|r| r.values().cloned().collect())
            .unwrap_or_default();
        let session_token = Uuid::new_v4().to_string();
        state.sessions.insert(session_token.clone());
        Ok(RecordSnapshot {
            records,
            session_token,
        })
    }

    async fn patch_records(
        &self,
        identity_id: &str,
        dataset: &str,
        session_token: &str,
        patches: &[RecordPatch],
    ) -> Result<(), DirectoryError> {
        let mut state = self.state.lock().await;
        let id = state.canonical(identity_id)?;
        if !state.sessions.remove(session_token) {
            return Err(DirectoryError::Upstream("invalid sync session token".into()));
        }

        let key = (id, dataset.to_string());
        let mut records = state.datasets.get(&key).cloned().unwrap_or_default();
        for patch in patches {
            let current = records.get(&patch.key).map(|r| r.sync_count);
            let conflict = || {
                DirectoryError::Conflict(format!(
                    "record {} has changed (sent {}, current {:?})",
                    patch.key, patch.sync_count, current
                ))
            };
            match patch.op {
                PatchOp::Create => {
                    if current.is_some() || patch.sync_count != 0 {
                        return Err(conflict());
                    }
                    records.insert(
                        patch.key.clone(),
                        Record {
                            key: patch.key.clone(),
                            value: patch.value.clone(),
                            sync_count: 1,
                        },
                    );
                }
                PatchOp::Replace => {
                    if current.unwrap_or(0) != patch.sync_count {
                        return Err(conflict());
                    }
                    records.insert(
                        patch.key.clone(),
                        Record {
                            key: patch.key.clone(),
                            value: patch.value.clone(),
                            sync_count: patch.sync_count + 1,
                        },
                    );
                }
                PatchOp::Remove => {
                    if current != Some(patch.sync_count) {
                        return Err(conflict());
                    }
                    records.remove(&patch.key);
                }
            }
        }
        state.datasets.insert(key, records);
        Ok(())
    }
}
