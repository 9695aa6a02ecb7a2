#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use quest_ledger::storage::kv::{KeyValueStore, MemoryKeyValueStore};
use quest_ledger::{Quest, QuestCategory, QuestStorage, StorageConfig, SubTask};

pub fn quest(id: &str) -> Quest {
    Quest {
        id: id.to_string(),
        title: format!("The Trial of {id}"),
        original_title: format!("finish {id}"),
        description: format!("finish {id}"),
        epic_description: format!("Shadows gather around {id}."),
        category: QuestCategory::Main,
        completed: false,
        created_at: Utc.timestamp_millis_opt(1_700_000_000_000).unwrap(),
        completed_at: None,
        due_date: Some(Utc.timestamp_millis_opt(1_700_086_400_000).unwrap()),
        sub_tasks: vec![
            SubTask {
                id: "s1".to_string(),
                description: "Light the candle".to_string(),
                completed: false,
            },
            SubTask {
                id: "s2".to_string(),
                description: "Read the scroll".to_string(),
                completed: true,
            },
        ],
        real_life_reward: "Tea".to_string(),
        visual_reward: Some("A shard of moonlight".to_string()),
    }
}

pub struct Harness {
    pub kv: Arc<MemoryKeyValueStore>,
    pub storage: QuestStorage,
    pub _dir: tempfile::TempDir,
}

/// Storage with an in-memory legacy store and a record database in a fresh
/// temp dir.
pub fn harness() -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let config = StorageConfig::new(dir.path());
    harness_with(dir, config)
}

pub fn harness_with(dir: tempfile::TempDir, config: StorageConfig) -> Harness {
    let kv = Arc::new(MemoryKeyValueStore::new());
    let storage = QuestStorage::new(config, kv.clone());
    Harness {
        kv,
        storage,
        _dir: dir,
    }
}

/// Record database path that cannot be opened: its parent is a plain file.
pub fn broken_record_path(dir: &Path) -> std::path::PathBuf {
    let blocker = dir.join("not-a-directory");
    std::fs::write(&blocker, b"x").unwrap();
    blocker.join("quests.sqlite3")
}

pub fn seed_legacy(kv: &MemoryKeyValueStore, quests: &[Quest]) {
    kv.set_item("todo-quest-data", &serde_json::to_string(quests).unwrap())
        .unwrap();
}

pub fn mark_migrated(kv: &MemoryKeyValueStore) {
    kv.set_item("todo-quest-migrated", "true").unwrap();
}
