use thiserror::Error;
use tokio::io;

pub type StoreResult<T> = core::result::Result<T, StoreError>;

/// Failures raised by a single backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("blocking task failed: {0}")]
    Task(String),
    #[error("a quest with id {0} already exists")]
    DuplicateId(String),
}

/// Façade-level failures, one variant per write operation so callers can
/// tell the user which action did not stick.
#[derive(Debug, Error)]
pub enum QuestStorageError {
    #[error("failed to save quests: {0}")]
    Save(#[source] StoreError),
    #[error("failed to add quest {id}: {source}")]
    Add { id: String, source: StoreError },
    #[error("failed to update quest {id}: {source}")]
    Update { id: String, source: StoreError },
    #[error("failed to delete quest {id}: {source}")]
    Delete { id: String, source: StoreError },
    #[error("failed to toggle quest {id}: {source}")]
    ToggleCompletion { id: String, source: StoreError },
    #[error("failed to toggle subtask {subtask_id} of quest {quest_id}: {source}")]
    ToggleSubtask {
        quest_id: String,
        subtask_id: String,
        source: StoreError,
    },
}

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("built-in template '{0}' cannot be deleted")]
    BuiltinReadOnly(String),
    #[error("template store error: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DraftError {
    #[error("quest title is required")]
    EmptyTitle,
}
