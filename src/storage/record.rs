//! Per-record quest storage on SQLite.
//!
//! Each quest is one row keyed by `id`, with the full record as JSON in
//! `body` and the attributes worth indexing copied into their own columns.
//! Every accessor opens its own connection on the blocking pool and closes it
//! before returning, whatever the outcome.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};
use tracing::{debug, warn};

use super::QuestBackend;
use crate::error::{StoreError, StoreResult};
use crate::types::Quest;

pub const SCHEMA_VERSION: i64 = 1;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS quests (
    id TEXT PRIMARY KEY NOT NULL,
    completed INTEGER NOT NULL,
    category TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    due_date INTEGER,
    body TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_quests_completed ON quests(completed);
CREATE INDEX IF NOT EXISTS idx_quests_category ON quests(category);
CREATE INDEX IF NOT EXISTS idx_quests_created_at ON quests(created_at);
CREATE INDEX IF NOT EXISTS idx_quests_due_date ON quests(due_date);
";

#[derive(Clone, Debug)]
pub struct RecordStore {
    path: PathBuf,
}

impl RecordStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open the database, creating the schema on the first-ever open. Safe to
    /// call concurrently.
    pub async fn open(&self) -> StoreResult<()> {
        self.with_connection(|_| Ok(())).await
    }

    pub async fn schema_version(&self) -> StoreResult<i64> {
        self.with_connection(|conn| {
            Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
        })
        .await
    }

    async fn with_connection<T, F>(&self, op: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> StoreResult<T> + Send + 'static,
    {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || -> StoreResult<T> {
            let mut conn = open_connection(&path)?;
            let result = op(&mut conn);
            if let Err((_, e)) = conn.close() {
                warn!(path = %path.display(), error = %e, "failed to close record database");
            }
            result
        })
        .await
        .map_err(|e| StoreError::Task(format!("spawn_blocking failed: {e}")))?
    }
}

fn open_connection(path: &Path) -> StoreResult<Connection> {
    let mut conn = Connection::open(path)?;
    conn.busy_timeout(BUSY_TIMEOUT)?;

    // IMMEDIATE takes the write lock up front, so two first-time opens queue
    // here instead of both seeing version 0.
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let version: i64 = tx.pragma_query_value(None, "user_version", |row| row.get(0))?;
    if version < SCHEMA_VERSION {
        debug!(path = %path.display(), from = version, to = SCHEMA_VERSION, "creating record schema");
        tx.execute_batch(SCHEMA)?;
        tx.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    }
    tx.commit()?;
    Ok(conn)
}

fn insert_quest(conn: &Connection, quest: &Quest) -> StoreResult<()> {
    let body = serde_json::to_string(quest)?;
    conn.execute(
        "INSERT INTO quests (id, completed, category, created_at, due_date, body)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            quest.id,
            quest.completed,
            quest.category.as_str(),
            quest.created_at.timestamp_millis(),
            quest.due_date.map(|d| d.timestamp_millis()),
            body
        ],
    )?;
    Ok(())
}

fn replace_quest(conn: &Connection, quest: &Quest) -> StoreResult<bool> {
    let body = serde_json::to_string(quest)?;
    let changed = conn.execute(
        "UPDATE quests
         SET completed = ?2, category = ?3, created_at = ?4, due_date = ?5, body = ?6
         WHERE id = ?1",
        params![
            quest.id,
            quest.completed,
            quest.category.as_str(),
            quest.created_at.timestamp_millis(),
            quest.due_date.map(|d| d.timestamp_millis()),
            body
        ],
    )?;
    Ok(changed > 0)
}

fn get_quest(conn: &Connection, id: &str) -> StoreResult<Option<Quest>> {
    let body: Option<String> = conn
        .query_row("SELECT body FROM quests WHERE id = ?1", params![id], |row| {
            row.get(0)
        })
        .optional()?;
    match body {
        Some(body) => Ok(Some(serde_json::from_str(&body)?)),
        None => Ok(None),
    }
}

/// Rows come back in insertion order, the same order the legacy array keeps.
fn select_all(conn: &Connection) -> StoreResult<Vec<Quest>> {
    let mut stmt = conn.prepare("SELECT body FROM quests ORDER BY rowid")?;
    let bodies = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    bodies
        .iter()
        .map(|body| serde_json::from_str(body).map_err(StoreError::from))
        .collect()
}

/// Load one quest, let `apply` change it, write it back. Unknown ids are left
/// untouched.
fn modify_quest(
    conn: &mut Connection,
    id: &str,
    apply: impl FnOnce(&mut Quest),
) -> StoreResult<Vec<Quest>> {
    let tx = conn.transaction()?;
    if let Some(mut quest) = get_quest(&tx, id)? {
        apply(&mut quest);
        replace_quest(&tx, &quest)?;
    }
    tx.commit()?;
    select_all(conn)
}

#[async_trait]
impl QuestBackend for RecordStore {
    fn name(&self) -> &'static str {
        "record"
    }

    async fn load_all(&self) -> StoreResult<Vec<Quest>> {
        self.with_connection(|conn| select_all(conn)).await
    }

    /// Clear, then insert every record. Not a merge: whatever the table held
    /// before is gone.
    async fn save_all(&self, quests: &[Quest]) -> StoreResult<()> {
        let quests = quests.to_vec();
        self.with_connection(move |conn| {
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM quests", [])?;
            for quest in &quests {
                insert_quest(&tx, quest)?;
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn add(&self, quest: Quest) -> StoreResult<Vec<Quest>> {
        self.with_connection(move |conn| {
            if get_quest(conn, &quest.id)?.is_some() {
                return Err(StoreError::DuplicateId(quest.id));
            }
            insert_quest(conn, &quest)?;
            select_all(conn)
        })
        .await
    }

    async fn update(&self, quest: Quest) -> StoreResult<Vec<Quest>> {
        self.with_connection(move |conn| {
            replace_quest(conn, &quest)?;
            select_all(conn)
        })
        .await
    }

    async fn delete(&self, id: &str) -> StoreResult<Vec<Quest>> {
        let id = id.to_string();
        self.with_connection(move |conn| {
            conn.execute("DELETE FROM quests WHERE id = ?1", params![id])?;
            select_all(conn)
        })
        .await
    }

    async fn toggle_completion(&self, id: &str, at: DateTime<Utc>) -> StoreResult<Vec<Quest>> {
        let id = id.to_string();
        self.with_connection(move |conn| modify_quest(conn, &id, |q| q.toggle_completion(at)))
            .await
    }

    async fn toggle_subtask(&self, quest_id: &str, subtask_id: &str) -> StoreResult<Vec<Quest>> {
        let quest_id = quest_id.to_string();
        let subtask_id = subtask_id.to_string();
        self.with_connection(move |conn| {
            modify_quest(conn, &quest_id, |q| {
                q.toggle_subtask(&subtask_id);
            })
        })
        .await
    }
}
