//! Quest persistence behind one asynchronous CRUD surface.
//!
//! [`QuestStorage`] owns a legacy blob store and, when the environment offers
//! one, a record database. Which of the two serves a call is decided fresh on
//! every call by [`use_record_backend`], so a migration that finishes mid
//! session is picked up by the next call without any restart.

pub mod kv;
pub mod legacy;
pub mod migration;
pub mod record;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, error, warn};

use crate::config::StorageConfig;
use crate::error::{QuestStorageError, StoreResult};
use crate::templates::TemplateService;
use crate::types::{Quest, now};
use kv::{FileKeyValueStore, KeyValueStore};
use legacy::LegacyStore;
use migration::MigrationOutcome;
use record::RecordStore;

/// One storage strategy. Write operations hand back the full collection so
/// callers can refresh their in-memory copy from the return value.
#[async_trait]
pub trait QuestBackend: Send + Sync {
    fn name(&self) -> &'static str;
    async fn load_all(&self) -> StoreResult<Vec<Quest>>;
    async fn save_all(&self, quests: &[Quest]) -> StoreResult<()>;
    async fn add(&self, quest: Quest) -> StoreResult<Vec<Quest>>;
    async fn update(&self, quest: Quest) -> StoreResult<Vec<Quest>>;
    async fn delete(&self, id: &str) -> StoreResult<Vec<Quest>>;
    async fn toggle_completion(&self, id: &str, at: DateTime<Utc>) -> StoreResult<Vec<Quest>>;
    async fn toggle_subtask(&self, quest_id: &str, subtask_id: &str) -> StoreResult<Vec<Quest>>;
}

/// The record database serves calls only once it exists and the legacy data
/// has been moved into it.
pub fn use_record_backend(record_available: bool, migration_complete: bool) -> bool {
    record_available && migration_complete
}

pub struct QuestStorage {
    config: StorageConfig,
    kv: Arc<dyn KeyValueStore>,
    legacy: LegacyStore,
    record: Option<RecordStore>,
    writes: Option<Arc<Mutex<()>>>,
}

impl QuestStorage {
    pub fn new(config: StorageConfig, kv: Arc<dyn KeyValueStore>) -> Self {
        let legacy = LegacyStore::new(kv.clone(), config.keys.quests.clone());
        let record = config.record_database.clone().map(RecordStore::new);
        let writes = config
            .serialize_writes
            .then(|| Arc::new(Mutex::new(())));
        Self {
            config,
            kv,
            legacy,
            record,
            writes,
        }
    }

    /// Storage rooted at `config.data_dir` with a file-backed legacy store.
    pub fn open(config: StorageConfig) -> StoreResult<Self> {
        std::fs::create_dir_all(&config.data_dir)?;
        let kv: Arc<dyn KeyValueStore> = Arc::new(FileKeyValueStore::new(config.legacy_path()));
        Ok(Self::new(config, kv))
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    pub fn key_value_store(&self) -> Arc<dyn KeyValueStore> {
        self.kv.clone()
    }

    pub fn legacy(&self) -> &LegacyStore {
        &self.legacy
    }

    pub fn record(&self) -> Option<&RecordStore> {
        self.record.as_ref()
    }

    pub fn templates(&self) -> TemplateService {
        TemplateService::new(
            self.kv.clone(),
            self.config.keys.clone(),
            self.config.builtin_templates.clone(),
        )
        .with_write_queue(self.writes.clone())
    }

    pub fn record_database_available(&self) -> bool {
        self.record.is_some()
    }

    /// An unreadable marker counts as not migrated.
    pub fn migration_complete(&self) -> bool {
        migration::is_migration_complete(self.kv.as_ref(), &self.config.keys).unwrap_or_else(|e| {
            warn!(error = %e, "could not read migration marker");
            false
        })
    }

    /// Re-evaluated on every call; nothing about the choice is cached.
    pub fn uses_record_backend(&self) -> bool {
        use_record_backend(self.record_database_available(), self.migration_complete())
    }

    pub fn active_backend(&self) -> &dyn QuestBackend {
        self.backend_for(self.uses_record_backend())
    }

    fn backend_for(&self, on_record: bool) -> &dyn QuestBackend {
        match &self.record {
            Some(record) if on_record => record,
            _ => &self.legacy,
        }
    }

    async fn write_guard(&self) -> Option<MutexGuard<'_, ()>> {
        match &self.writes {
            Some(lock) => Some(lock.lock().await),
            None => None,
        }
    }

    /// Never fails: a record-database error falls back to the legacy store and
    /// a legacy error yields an empty collection.
    pub async fn load(&self) -> Vec<Quest> {
        let on_record = self.uses_record_backend();
        let backend = self.backend_for(on_record);
        debug!(backend = backend.name(), "loading quests");
        match backend.load_all().await {
            Ok(quests) => return quests,
            Err(e) if !on_record => {
                error!(error = %e, "failed to load quests");
                return Vec::new();
            }
            Err(e) => warn!(error = %e, "record load failed, falling back to legacy store"),
        }

        self.legacy.load_all().await.unwrap_or_else(|e| {
            error!(error = %e, "failed to load quests from legacy store");
            Vec::new()
        })
    }

    pub async fn save(&self, quests: &[Quest]) -> Result<(), QuestStorageError> {
        let _guard = self.write_guard().await;
        let on_record = self.uses_record_backend();
        let backend = self.backend_for(on_record);
        debug!(backend = backend.name(), count = quests.len(), "saving quests");
        match backend.save_all(quests).await {
            Ok(()) => return Ok(()),
            Err(e) if !on_record => {
                error!(error = %e, "failed to save quests");
                return Err(QuestStorageError::Save(e));
            }
            Err(e) => warn!(error = %e, "record save failed, falling back to legacy store"),
        }

        self.legacy.save_all(quests).await.map_err(|e| {
            error!(error = %e, "failed to save quests to legacy store");
            QuestStorageError::Save(e)
        })
    }

    pub async fn add(&self, quest: Quest) -> Result<Vec<Quest>, QuestStorageError> {
        let _guard = self.write_guard().await;
        let id = quest.id.clone();
        self.active_backend()
            .add(quest)
            .await
            .map_err(|source| QuestStorageError::Add { id, source })
    }

    /// Replaces the quest with the same id; an unknown id changes nothing.
    pub async fn update(&self, quest: Quest) -> Result<Vec<Quest>, QuestStorageError> {
        let _guard = self.write_guard().await;
        let id = quest.id.clone();
        self.active_backend()
            .update(quest)
            .await
            .map_err(|source| QuestStorageError::Update { id, source })
    }

    pub async fn delete(&self, id: &str) -> Result<Vec<Quest>, QuestStorageError> {
        let _guard = self.write_guard().await;
        self.active_backend()
            .delete(id)
            .await
            .map_err(|source| QuestStorageError::Delete {
                id: id.to_string(),
                source,
            })
    }

    pub async fn toggle_completion(&self, id: &str) -> Result<Vec<Quest>, QuestStorageError> {
        let _guard = self.write_guard().await;
        self.active_backend()
            .toggle_completion(id, now())
            .await
            .map_err(|source| QuestStorageError::ToggleCompletion {
                id: id.to_string(),
                source,
            })
    }

    pub async fn toggle_subtask(
        &self,
        quest_id: &str,
        subtask_id: &str,
    ) -> Result<Vec<Quest>, QuestStorageError> {
        let _guard = self.write_guard().await;
        self.active_backend()
            .toggle_subtask(quest_id, subtask_id)
            .await
            .map_err(|source| QuestStorageError::ToggleSubtask {
                quest_id: quest_id.to_string(),
                subtask_id: subtask_id.to_string(),
                source,
            })
    }

    pub async fn migrate_if_needed(&self) -> MigrationOutcome {
        let _guard = self.write_guard().await;
        migration::migrate_if_needed(
            self.kv.as_ref(),
            &self.config.keys,
            &self.legacy,
            self.record.as_ref(),
        )
        .await
    }
}
