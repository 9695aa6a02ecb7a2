use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::QuestBackend;
use super::kv::KeyValueStore;
use crate::error::{StoreError, StoreResult};
use crate::types::Quest;

/// The whole quest collection serialized as one JSON array under one key.
/// Every mutation is read-modify-write of the full blob, run on the blocking
/// pool since the key-value store may sit on a file.
#[derive(Clone)]
pub struct LegacyStore {
    kv: Arc<dyn KeyValueStore>,
    key: String,
}

impl LegacyStore {
    pub fn new(kv: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            kv,
            key: key.into(),
        }
    }

    /// Missing or blank blob reads as an empty collection; a blob that does
    /// not parse is an error so it is never overwritten by accident.
    pub fn read(&self) -> StoreResult<Vec<Quest>> {
        match self.kv.get_item(&self.key)? {
            Some(raw) if !raw.trim().is_empty() => Ok(serde_json::from_str(&raw)?),
            _ => Ok(Vec::new()),
        }
    }

    pub fn write(&self, quests: &[Quest]) -> StoreResult<()> {
        let raw = serde_json::to_string(quests)?;
        self.kv.set_item(&self.key, &raw)
    }

    async fn blocking<T, F>(&self, op: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&LegacyStore) -> StoreResult<T> + Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || op(&store))
            .await
            .map_err(|e| StoreError::Task(format!("spawn_blocking failed: {e}")))?
    }

    /// Nothing is written when `apply` fails.
    async fn modify<F>(&self, apply: F) -> StoreResult<Vec<Quest>>
    where
        F: FnOnce(&mut Vec<Quest>) -> StoreResult<()> + Send + 'static,
    {
        self.blocking(move |store| {
            let mut quests = store.read()?;
            apply(&mut quests)?;
            store.write(&quests)?;
            Ok(quests)
        })
        .await
    }
}

/// Ids are unique across the collection; a second quest with a known id is
/// refused rather than appended.
pub(crate) fn push_quest(quests: &mut Vec<Quest>, quest: Quest) -> StoreResult<()> {
    if quests.iter().any(|q| q.id == quest.id) {
        return Err(StoreError::DuplicateId(quest.id));
    }
    quests.push(quest);
    Ok(())
}

pub(crate) fn replace_quest(quests: &mut [Quest], updated: Quest) {
    if let Some(slot) = quests.iter_mut().find(|q| q.id == updated.id) {
        *slot = updated;
    }
}

pub(crate) fn remove_quest(quests: &mut Vec<Quest>, id: &str) {
    quests.retain(|q| q.id != id);
}

#[async_trait]
impl QuestBackend for LegacyStore {
    fn name(&self) -> &'static str {
        "legacy"
    }

    async fn load_all(&self) -> StoreResult<Vec<Quest>> {
        self.blocking(|store| store.read()).await
    }

    async fn save_all(&self, quests: &[Quest]) -> StoreResult<()> {
        let quests = quests.to_vec();
        self.blocking(move |store| store.write(&quests)).await
    }

    async fn add(&self, quest: Quest) -> StoreResult<Vec<Quest>> {
        self.modify(move |quests| push_quest(quests, quest)).await
    }

    async fn update(&self, quest: Quest) -> StoreResult<Vec<Quest>> {
        self.modify(move |quests| {
            replace_quest(quests, quest);
            Ok(())
        })
        .await
    }

    async fn delete(&self, id: &str) -> StoreResult<Vec<Quest>> {
        let id = id.to_string();
        self.modify(move |quests| {
            remove_quest(quests, &id);
            Ok(())
        })
        .await
    }

    async fn toggle_completion(&self, id: &str, at: DateTime<Utc>) -> StoreResult<Vec<Quest>> {
        let id = id.to_string();
        self.modify(move |quests| {
            if let Some(quest) = quests.iter_mut().find(|q| q.id == id) {
                quest.toggle_completion(at);
            }
            Ok(())
        })
        .await
    }

    async fn toggle_subtask(&self, quest_id: &str, subtask_id: &str) -> StoreResult<Vec<Quest>> {
        let quest_id = quest_id.to_string();
        let subtask_id = subtask_id.to_string();
        self.modify(move |quests| {
            if let Some(quest) = quests.iter_mut().find(|q| q.id == quest_id) {
                quest.toggle_subtask(&subtask_id);
            }
            Ok(())
        })
        .await
    }
}
