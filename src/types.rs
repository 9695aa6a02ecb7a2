use chrono::serde::{ts_milliseconds, ts_milliseconds_option};
use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Current time truncated to millisecond precision, the resolution every
/// persisted timestamp is stored at.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestCategory {
    Daily,
    #[default]
    Main,
    Optional,
}

impl QuestCategory {
    pub const ALL: [QuestCategory; 3] = [Self::Main, Self::Optional, Self::Daily];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Main => "main",
            Self::Optional => "optional",
        }
    }
}

impl fmt::Display for QuestCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuestCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(Self::Daily),
            "main" => Ok(Self::Main),
            "optional" => Ok(Self::Optional),
            other => Err(format!("unknown quest category '{other}'")),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubTask {
    pub id: String,
    pub description: String,
    #[serde(default)]
    pub completed: bool,
}

/// A user task and its presentation text. Field names serialize in the
/// camelCase layout used by the legacy blob so older data loads unchanged.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quest {
    pub id: String,
    #[serde(default)]
    pub title: String,
    pub original_title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub epic_description: String,
    #[serde(default)]
    pub category: QuestCategory,
    #[serde(default)]
    pub completed: bool,
    #[serde(with = "ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(
        default,
        with = "ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(
        default,
        with = "ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub sub_tasks: Vec<SubTask>,
    #[serde(default)]
    pub real_life_reward: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visual_reward: Option<String>,
}

impl Quest {
    /// Flip completion. `completed_at` is set on false -> true and cleared on
    /// true -> false. Subtasks are left alone.
    pub fn toggle_completion(&mut self, at: DateTime<Utc>) {
        self.completed = !self.completed;
        self.completed_at = self.completed.then_some(at);
    }

    /// Flip one subtask. Returns false when no subtask has that id.
    pub fn toggle_subtask(&mut self, subtask_id: &str) -> bool {
        match self.sub_tasks.iter_mut().find(|s| s.id == subtask_id) {
            Some(subtask) => {
                subtask.completed = !subtask.completed;
                true
            }
            None => false,
        }
    }

    pub fn completed_subtasks(&self) -> usize {
        self.sub_tasks.iter().filter(|s| s.completed).count()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestTemplate {
    pub id: String,
    pub name: String,
    pub title: String,
    #[serde(default)]
    pub category: QuestCategory,
    #[serde(default)]
    pub subtasks: Vec<String>,
    #[serde(with = "ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub usage_count: u64,
}

/// The user-supplied part of a template; id, creation time and usage are
/// assigned on save.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTemplate {
    pub name: String,
    pub title: String,
    pub category: QuestCategory,
    pub subtasks: Vec<String>,
}
