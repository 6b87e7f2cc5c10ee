//! Typed collections over the key-value space
//!
//! Layout (one key per collection or scalar):
//!
//! ```text
//! plansync.projects              { <project id>: ProjectRecord, ... }
//! plansync.backups               { <backup id>: BackupRecord, ... }
//! plansync.migrations            { <source id>: MigrationMapping, ... }
//! plansync.current_project       "<project id>"
//! plansync.migration_completed   "<rfc3339 timestamp>"
//! ```
//!
//! Reads never fail because of bad data: an unparseable collection is
//! treated as empty and unparseable entries are skipped, each with a warning.

use crate::error::StoreError;
use crate::kv::{KeyValueStore, MemoryStore};
use chrono::{DateTime, Utc};
use plansync_model::{BackupId, BackupRecord, MigrationMapping, ProjectId, ProjectRecord};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Key of the project collection
pub const PROJECTS_KEY: &str = "plansync.projects";
/// Key of the backup collection
pub const BACKUPS_KEY: &str = "plansync.backups";
/// Key of the migration mapping table
pub const MIGRATIONS_KEY: &str = "plansync.migrations";
/// Key of the current project pointer
pub const CURRENT_PROJECT_KEY: &str = "plansync.current_project";
/// Key of the migration-completed marker
pub const MIGRATION_COMPLETED_KEY: &str = "plansync.migration_completed";

/// Typed access to the local store
#[derive(Debug)]
pub struct LocalRecords {
    store: Arc<dyn KeyValueStore>,
    /// Serializes read-modify-write cycles
    write_lock: Mutex<()>,
}

impl LocalRecords {
    /// Wrap a key-value backend
    #[inline]
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    /// Unlimited in-memory store
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// Underlying key-value backend
    #[inline]
    #[must_use]
    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    // ----- projects -----

    /// All readable project records, oldest first
    pub async fn projects(&self) -> Result<Vec<ProjectRecord>, StoreError> {
        let mut records: Vec<ProjectRecord> = self
            .read_collection(PROJECTS_KEY)
            .await?
            .into_values()
            .collect();
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(records)
    }

    /// One project record
    pub async fn project(&self, id: &ProjectId) -> Result<Option<ProjectRecord>, StoreError> {
        Ok(self
            .read_collection::<ProjectRecord>(PROJECTS_KEY)
            .await?
            .remove(id.as_str()))
    }

    /// Insert or replace a project record
    pub async fn put_project(&self, record: &ProjectRecord) -> Result<(), StoreError> {
        let record = record.clone();
        self.update_collection(PROJECTS_KEY, move |map: &mut BTreeMap<String, ProjectRecord>| {
            map.insert(record.id.to_string(), record);
        })
        .await
    }

    /// Remove a project record; returns whether it existed
    pub async fn remove_project(&self, id: &ProjectId) -> Result<bool, StoreError> {
        self.update_collection(PROJECTS_KEY, |map: &mut BTreeMap<String, ProjectRecord>| {
            map.remove(id.as_str()).is_some()
        })
        .await
    }

    // ----- backups -----

    /// All readable backups, oldest first
    pub async fn backups(&self) -> Result<Vec<BackupRecord>, StoreError> {
        let mut backups: Vec<BackupRecord> = self
            .read_collection(BACKUPS_KEY)
            .await?
            .into_values()
            .collect();
        backups.sort_by(|a, b| a.captured_at.cmp(&b.captured_at).then_with(|| a.id.cmp(&b.id)));
        Ok(backups)
    }

    /// One backup
    pub async fn backup(&self, id: BackupId) -> Result<Option<BackupRecord>, StoreError> {
        Ok(self
            .read_collection::<BackupRecord>(BACKUPS_KEY)
            .await?
            .remove(&id.to_string()))
    }

    /// Store a backup
    pub async fn put_backup(&self, record: &BackupRecord) -> Result<(), StoreError> {
        let record = record.clone();
        self.update_collection(BACKUPS_KEY, move |map: &mut BTreeMap<String, BackupRecord>| {
            map.insert(record.id.to_string(), record);
        })
        .await
    }

    /// Remove backups; returns how many existed
    pub async fn remove_backups(&self, ids: &[BackupId]) -> Result<usize, StoreError> {
        self.update_collection(BACKUPS_KEY, |map: &mut BTreeMap<String, BackupRecord>| {
            ids.iter()
                .filter(|id| map.remove(&id.to_string()).is_some())
                .count()
        })
        .await
    }

    // ----- migration mappings -----

    /// All mappings
    pub async fn mappings(&self) -> Result<Vec<MigrationMapping>, StoreError> {
        Ok(self
            .read_collection(MIGRATIONS_KEY)
            .await?
            .into_values()
            .collect())
    }

    /// Mapping for a source identifier
    pub async fn mapping(&self, source: &ProjectId) -> Result<Option<MigrationMapping>, StoreError> {
        Ok(self
            .read_collection::<MigrationMapping>(MIGRATIONS_KEY)
            .await?
            .remove(source.as_str()))
    }

    /// Record a mapping; returns `false` (and changes nothing) if the source
    /// is already mapped
    pub async fn put_mapping(&self, mapping: &MigrationMapping) -> Result<bool, StoreError> {
        let mapping = mapping.clone();
        self.update_collection(MIGRATIONS_KEY, move |map: &mut BTreeMap<String, MigrationMapping>| {
            let key = mapping.source.to_string();
            if map.contains_key(&key) {
                return false;
            }
            map.insert(key, mapping);
            true
        })
        .await
    }

    // ----- scalars -----

    /// Identifier of the project open in the editor
    pub async fn current_project(&self) -> Result<Option<ProjectId>, StoreError> {
        self.read_scalar(CURRENT_PROJECT_KEY).await
    }

    /// Set or clear the current project pointer
    pub async fn set_current_project(&self, id: Option<&ProjectId>) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        match id {
            Some(id) => self.write_value(CURRENT_PROJECT_KEY, id).await,
            None => self.store.remove(CURRENT_PROJECT_KEY).await,
        }
    }

    /// When a migration last completed with at least one upload
    pub async fn migration_completed(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        self.read_scalar(MIGRATION_COMPLETED_KEY).await
    }

    /// Set the migration-completed marker
    pub async fn mark_migration_completed(&self, at: DateTime<Utc>) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        self.write_value(MIGRATION_COMPLETED_KEY, &at).await
    }

    // ----- helpers -----

    async fn read_scalar<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        let Some(raw) = self.store.get(key).await? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                tracing::warn!(key, error = %e, "ignoring corrupted local value");
                Ok(None)
            }
        }
    }

    async fn read_collection<T: DeserializeOwned>(
        &self,
        key: &str,
    ) -> Result<BTreeMap<String, T>, StoreError> {
        let Some(raw) = self.store.get(key).await? else {
            return Ok(BTreeMap::new());
        };
        let entries: Map<String, Value> = match serde_json::from_str(&raw) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(key, error = %e, "local collection is corrupted, treating as empty");
                return Ok(BTreeMap::new());
            }
        };

        let mut parsed = BTreeMap::new();
        for (entry_key, value) in entries {
            match serde_json::from_value(value) {
                Ok(item) => {
                    parsed.insert(entry_key, item);
                }
                Err(e) => {
                    tracing::warn!(key, entry = %entry_key, error = %e, "skipping corrupted local entry");
                }
            }
        }
        Ok(parsed)
    }

    async fn update_collection<T, F, R>(&self, key: &str, f: F) -> Result<R, StoreError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(&mut BTreeMap<String, T>) -> R,
    {
        let _guard = self.write_lock.lock().await;
        let mut map = self.read_collection::<T>(key).await?;
        let out = f(&mut map);
        self.write_value(key, &map).await?;
        Ok(out)
    }

    async fn write_value<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let raw = serde_json::to_string(value).map_err(|source| StoreError::Encode {
            key: key.to_string(),
            source,
        })?;
        self.store.set(key, raw).await
    }
}
