//! Profile records kept in the identity's dataset.
//!
//! Reads filter by key prefix. Writes list the dataset first to learn record
//! versions and the session token, then submit one batched patch.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use tracing::debug;

use crate::directory::{DirectoryError, PatchOp, RecordPatch, RecordStore};
use crate::error::Result;

/// Record holding the refresh token of a provider.
pub fn refresh_key(provider: &str) -> String {
    format!("refresh{provider}")
}

/// Record holding the JSON profile returned by a provider.
pub fn profile_key(provider: &str) -> String {
    format!("profile{provider}")
}

/// A batch of record writes.
///
/// `create` only writes keys that do not exist yet. `replace` overwrites (a
/// `None` value clears the record). `remove` deletes keys that exist.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordUpdate {
    pub create: BTreeMap<String, Option<String>>,
    pub replace: BTreeMap<String, Option<String>>,
    pub remove: BTreeSet<String>,
}

impl RecordUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.create.insert(key.into(), Some(value.into()));
        self
    }

    pub fn replace(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.replace.insert(key.into(), Some(value.into()));
        self
    }

    /// Replace with a null value.
    pub fn clear(mut self, key: impl Into<String>) -> Self {
        self.replace.insert(key.into(), None);
        self
    }

    pub fn remove(mut self, key: impl Into<String>) -> Self {
        self.remove.insert(key.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.create.is_empty() && self.replace.is_empty() && self.remove.is_empty()
    }
}

/// Profile dataset of every identity.
#[derive(Clone)]
pub struct ProfileStore {
    store: Arc<dyn RecordStore>,
    dataset: String,
}

impl ProfileStore {
    pub fn new(store: Arc<dyn RecordStore>, dataset: impl Into<String>) -> Self {
        Self {
            store,
            dataset: dataset.into(),
        }
    }

    /// Records whose key starts with any of `prefixes`. Null records are left out.
    pub async fn get_records(
        &self,
        identity_id: &str,
        prefixes: &[&str],
    ) -> Result<HashMap<String, String>> {
        let snapshot = self.store.list_records(identity_id, &self.dataset).await?;
        Ok(snapshot
            .records
            .into_iter()
            .filter(|r| prefixes.iter().any(|p| r.key.starts_with(p)))
            .filter_map(|r| r.value.map(|v| (r.key, v)))
            .collect())
    }

    /// Apply `update` in one batch.
    ///
    /// A version conflict on the batch is logged and treated as success:
    /// the store may report one even though the write went through.
    pub async fn update_records(&self, identity_id: &str, update: RecordUpdate) -> Result<()> {
        let snapshot = self.store.list_records(identity_id, &self.dataset).await?;
        let version = |key: &str| snapshot.get(key).map(|r| r.sync_count);

        let mut patches = Vec::new();
        for (key, value) in update.create {
            if version(&key).is_none() {
                patches.push(RecordPatch {
                    op: PatchOp::Create,
                    key,
                    value,
                    sync_count: 0,
                });
            }
        }
        for (key, value) in update.replace {
            patches.push(RecordPatch {
                op: PatchOp::Replace,
                sync_count: version(&key).unwrap_or(0),
                key,
                value,
            });
        }
        for key in update.remove {
            if let Some(sync_count) = version(&key) {
                patches.push(RecordPatch {
                    op: PatchOp::Remove,
                    key,
                    value: None,
                    sync_count,
                });
            }
        }

        if patches.is_empty() {
            return Ok(());
        }

        debug!(identity_id, patches = patches.len(), "patching profile records");
        match self
            .store
            .patch_records(identity_id, &self.dataset, &snapshot.session_token, &patches)
            .await
        {
            Ok(()) => Ok(()),
            Err(DirectoryError::Conflict(detail)) => {
                debug!(identity_id, %detail, "ignoring record conflict");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}
