pub mod config;
pub mod error;
pub mod filters;
pub mod presentation;
pub mod stats;
pub mod storage;
pub mod templates;
pub mod types;

pub use config::{StorageConfig, StorageKeys};
pub use error::{DraftError, QuestStorageError, StoreError, StoreResult, TemplateError};
pub use storage::QuestStorage;
pub use storage::migration::{MigrationOutcome, SkipReason};
pub use types::{NewTemplate, Quest, QuestCategory, QuestTemplate, SubTask};
