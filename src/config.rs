use std::path::{Path, PathBuf};

use crate::templates::builtin_templates;
use crate::types::QuestTemplate;

const LEGACY_FILE: &str = "local-storage.json";
const RECORD_FILE: &str = "quests.sqlite3";

/// Key names used inside the legacy key-value store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorageKeys {
    pub quests: String,
    pub templates: String,
    pub template_usage_prefix: String,
    pub migrated: String,
}

impl StorageKeys {
    pub fn template_usage(&self, template_id: &str) -> String {
        format!("{}{}", self.template_usage_prefix, template_id)
    }
}

impl Default for StorageKeys {
    fn default() -> Self {
        Self {
            quests: "todo-quest-data".to_string(),
            templates: "quest-templates".to_string(),
            template_usage_prefix: "template-usage-".to_string(),
            migrated: "todo-quest-migrated".to_string(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    pub keys: StorageKeys,
    /// Location of the record database. `None` means the environment has no
    /// record-database capability and every call stays on the legacy store.
    pub record_database: Option<PathBuf>,
    /// Hold a single-writer lock for the length of every write.
    pub serialize_writes: bool,
    pub builtin_templates: Vec<QuestTemplate>,
}

impl StorageConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            record_database: Some(data_dir.join(RECORD_FILE)),
            data_dir,
            keys: StorageKeys::default(),
            serialize_writes: true,
            builtin_templates: builtin_templates(crate::types::now()),
        }
    }

    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("quest-ledger")
    }

    pub fn legacy_path(&self) -> PathBuf {
        self.data_dir.join(LEGACY_FILE)
    }

    pub fn record_database_path(&self) -> Option<&Path> {
        self.record_database.as_deref()
    }

    pub fn with_record_database(mut self, path: Option<PathBuf>) -> Self {
        self.record_database = path;
        self
    }

    pub fn without_record_database(self) -> Self {
        self.with_record_database(None)
    }

    pub fn with_serialized_writes(mut self, enabled: bool) -> Self {
        self.serialize_writes = enabled;
        self
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::new(Self::default_data_dir())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_database_lives_next_to_legacy_file() {
        let config = StorageConfig::new("/tmp/ql");
        assert_eq!(config.legacy_path(), PathBuf::from("/tmp/ql/local-storage.json"));
        assert_eq!(
            config.record_database_path(),
            Some(Path::new("/tmp/ql/quests.sqlite3"))
        );
        assert!(config.without_record_database().record_database.is_none());
    }

    #[test]
    fn usage_key_uses_prefix() {
        let keys = StorageKeys::default();
        assert_eq!(keys.template_usage("daily-standup"), "template-usage-daily-standup");
    }
}
