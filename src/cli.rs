use std::path::PathBuf;

use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};
use clap::{Args, Parser, Subcommand};
use quest_ledger::QuestCategory;
use quest_ledger::filters::{DueFilter, StatusFilter};
use quest_ledger::StorageConfig;

use crate::metadata::{PKG_DESCRIPTION, PKG_NAME, PKG_VERSION};

#[derive(Parser, Debug, Clone)]
#[command(name = PKG_NAME)]
#[command(version = PKG_VERSION)]
#[command(about = PKG_DESCRIPTION, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub storage: StorageArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Show which backend is active and where data lives
    Status,
    /// Move legacy quests into the record database if that has not happened yet
    Migrate,
    /// List quests
    List(ListArgs),
    /// Create a quest with fallback presentation text
    Add(AddArgs),
    /// Toggle a quest's completion
    Complete { id: String },
    /// Toggle one subtask of a quest
    Subtask { quest_id: String, subtask_id: String },
    /// Delete a quest
    Delete {
        id: String,
        /// Skip the confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
    },
    /// Completion statistics
    Stats,
    /// Manage quest templates
    #[command(subcommand)]
    Templates(TemplateCommand),
    /// Print version information
    Version,
}

#[derive(Subcommand, Debug, Clone)]
pub enum TemplateCommand {
    /// List built-in and custom templates
    List,
    /// Save a custom template
    Save {
        name: String,
        title: String,
        #[arg(long, default_value = "main")]
        category: QuestCategory,
        /// Subtask line; repeat for more
        #[arg(long = "subtask")]
        subtasks: Vec<String>,
    },
    /// Delete a custom template
    Delete { id: String },
}

#[derive(Args, Debug, Clone)]
pub struct StorageArgs {
    /// Directory holding the legacy store and the record database
    #[arg(long, env = "QUEST_DATA_DIR", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Behave as if no record database is available
    #[arg(long, env = "QUEST_NO_RECORD_DB", default_value_t = false, global = true)]
    pub no_record_db: bool,

    /// Let writes interleave instead of queueing them
    #[arg(long, env = "QUEST_NO_WRITE_QUEUE", default_value_t = false, global = true)]
    pub no_write_queue: bool,
}

impl StorageArgs {
    /// Validate CLI/environment-derived arguments.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(dir) = &self.data_dir {
            if dir.as_os_str().is_empty() {
                return Err("QUEST_DATA_DIR cannot be empty".to_string());
            }
            if dir.exists() && !dir.is_dir() {
                return Err(format!("QUEST_DATA_DIR '{}' is not a directory", dir.display()));
            }
        }
        Ok(())
    }

    pub fn to_config(&self) -> StorageConfig {
        let data_dir = self
            .data_dir
            .clone()
            .unwrap_or_else(StorageConfig::default_data_dir);
        let config = StorageConfig::new(data_dir).with_serialized_writes(!self.no_write_queue);
        if self.no_record_db {
            config.without_record_database()
        } else {
            config
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ListArgs {
    /// Case-insensitive text search
    #[arg(long, default_value = "")]
    pub search: String,
    #[arg(long)]
    pub category: Option<QuestCategory>,
    #[arg(long, default_value = "all")]
    pub status: StatusFilter,
    /// all, overdue, today, week or none
    #[arg(long, default_value = "all")]
    pub due: DueFilter,
}

#[derive(Args, Debug, Clone)]
pub struct AddArgs {
    /// Quest title; defaults to the template's title when --template is given
    pub title: Option<String>,
    /// Defaults to the template's category, or main
    #[arg(long)]
    pub category: Option<QuestCategory>,
    #[arg(long, default_value = "")]
    pub reward: String,
    /// Due date as YYYY-MM-DD (end of that day, local time)
    #[arg(long, value_parser = parse_due_date)]
    pub due: Option<DateTime<Utc>>,
    /// Subtask line; repeat for more
    #[arg(long = "subtask")]
    pub subtasks: Vec<String>,
    /// Start from a template; its subtasks come before any given here
    #[arg(long)]
    pub template: Option<String>,
}

fn parse_due_date(raw: &str) -> Result<DateTime<Utc>, String> {
    let date = NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|e| format!("invalid due date '{raw}': {e}"))?;
    let end_of_day = date
        .and_hms_opt(23, 59, 59)
        .ok_or_else(|| format!("invalid due date '{raw}'"))?;
    Local
        .from_local_datetime(&end_of_day)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| format!("due date '{raw}' does not exist in the local time zone"))
}
