use std::fmt;

use serde::Serialize;
use tracing::{error, info};

use super::QuestBackend;
use super::kv::KeyValueStore;
use super::legacy::LegacyStore;
use super::record::RecordStore;
use crate::config::StorageKeys;
use crate::error::StoreResult;

const MARKER_VALUE: &str = "true";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Unavailable,
    AlreadyMigrated,
    NothingToMigrate,
}

impl SkipReason {
    pub fn message(self) -> &'static str {
        match self {
            Self::Unavailable => "record database not available",
            Self::AlreadyMigrated => "already migrated",
            Self::NothingToMigrate => "no data to migrate",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MigrationOutcome {
    Migrated { count: usize },
    Skipped { reason: SkipReason },
    Failed { error: String },
}

impl MigrationOutcome {
    pub fn migrated(&self) -> bool {
        matches!(self, Self::Migrated { .. })
    }

    pub fn error(&self) -> Option<String> {
        match self {
            Self::Migrated { .. } => None,
            Self::Skipped { reason } => Some(reason.message().to_string()),
            Self::Failed { error } => Some(error.clone()),
        }
    }
}

impl fmt::Display for MigrationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Migrated { count } => write!(f, "migrated {count} quests"),
            Self::Skipped { reason } => write!(f, "not migrated: {}", reason.message()),
            Self::Failed { error } => write!(f, "migration failed: {error}"),
        }
    }
}

pub fn is_migration_complete(kv: &dyn KeyValueStore, keys: &StorageKeys) -> StoreResult<bool> {
    Ok(kv.get_item(&keys.migrated)?.as_deref() == Some(MARKER_VALUE))
}

/// Copy the legacy blob into the record database once. The marker is written
/// last and only after the bulk save succeeded, so a failed run is retried on
/// the next start. An empty legacy store sets no marker.
pub async fn migrate_if_needed(
    kv: &dyn KeyValueStore,
    keys: &StorageKeys,
    legacy: &LegacyStore,
    record: Option<&RecordStore>,
) -> MigrationOutcome {
    let Some(record) = record else {
        return MigrationOutcome::Skipped {
            reason: SkipReason::Unavailable,
        };
    };

    match is_migration_complete(kv, keys) {
        Ok(true) => {
            return MigrationOutcome::Skipped {
                reason: SkipReason::AlreadyMigrated,
            };
        }
        Ok(false) => {}
        Err(e) => {
            error!(error = %e, "could not read migration marker");
            return MigrationOutcome::Failed {
                error: e.to_string(),
            };
        }
    }

    let quests = match legacy.load_all().await {
        Ok(quests) => quests,
        Err(e) => {
            error!(error = %e, "migration failed reading legacy store");
            return MigrationOutcome::Failed {
                error: e.to_string(),
            };
        }
    };

    if quests.is_empty() {
        info!("no legacy quests to migrate");
        return MigrationOutcome::Skipped {
            reason: SkipReason::NothingToMigrate,
        };
    }

    info!(count = quests.len(), "migrating quests to record database");
    if let Err(e) = record.save_all(&quests).await {
        error!(error = %e, "migration failed writing record database");
        return MigrationOutcome::Failed {
            error: e.to_string(),
        };
    }

    if let Err(e) = kv.set_item(&keys.migrated, MARKER_VALUE) {
        error!(error = %e, "migration failed setting completion marker");
        return MigrationOutcome::Failed {
            error: e.to_string(),
        };
    }

    info!(count = quests.len(), "migration complete");
    MigrationOutcome::Migrated {
        count: quests.len(),
    }
}
