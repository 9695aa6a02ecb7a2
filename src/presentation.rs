//! Building quests from user input.
//!
//! The themed text for a quest comes from an outside rewriting service. This
//! module only knows how to read that service's reply and what to write when
//! there is no usable reply, so quest creation never waits on it.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Deserialize;
use ulid::Ulid;

use crate::error::DraftError;
use crate::types::{Quest, QuestCategory, SubTask, now};

static JSON_OBJECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{.*\}").expect("static regex"));

pub const DEFAULT_REWARD: &str = "Completion of the dark ritual";

/// Themed text for one quest.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Presentation {
    pub epic_title: String,
    pub epic_description: String,
    #[serde(default)]
    pub epic_reward: String,
    /// Rewritten subtask lines, index-aligned with the draft's subtasks.
    #[serde(default)]
    pub subtasks: Vec<String>,
}

impl Presentation {
    pub fn fallback(title: &str, reward: &str) -> Self {
        let reward = reward.trim();
        Self {
            epic_title: title.to_string(),
            epic_description: format!(
                "The task of {} awaits, inevitable as the fading of light.",
                title.to_lowercase()
            ),
            epic_reward: if reward.is_empty() {
                DEFAULT_REWARD.to_string()
            } else {
                reward.to_string()
            },
            subtasks: Vec::new(),
        }
    }

    /// Pull the first `{...}` span out of a free-form reply and read it.
    /// Replies without a usable title or description give `None`.
    pub fn from_reply(reply: &str) -> Option<Self> {
        let span = JSON_OBJECT.find(reply)?;
        let parsed: Self = serde_json::from_str(span.as_str()).ok()?;
        if parsed.epic_title.trim().is_empty() || parsed.epic_description.trim().is_empty() {
            return None;
        }
        Some(parsed)
    }

    fn subtask_text(&self, index: usize, original: &str) -> String {
        match self.subtasks.get(index) {
            Some(text) if text.trim().chars().count() >= 5 => text.trim().to_string(),
            _ => subtask_fallback(original),
        }
    }
}

pub fn subtask_fallback(subtask: &str) -> String {
    format!("You must {}, as it was foretold.", subtask.trim().to_lowercase())
}

/// What the user typed, before ids and themed text are attached.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QuestDraft {
    pub title: String,
    pub category: QuestCategory,
    pub reward: String,
    pub due_date: Option<DateTime<Utc>>,
    pub subtasks: Vec<String>,
}

impl QuestDraft {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn fallback_presentation(&self) -> Presentation {
        Presentation::fallback(self.title.trim(), &self.reward)
    }

    /// Assemble the quest. `presentation` of `None` uses the fallback text.
    /// `original_title` keeps the literal input; blank subtasks are dropped.
    pub fn into_quest(self, presentation: Option<Presentation>) -> Result<Quest, DraftError> {
        if self.title.trim().is_empty() {
            return Err(DraftError::EmptyTitle);
        }
        let presentation = presentation.unwrap_or_else(|| self.fallback_presentation());

        let sub_tasks = self
            .subtasks
            .iter()
            .filter(|s| !s.trim().is_empty())
            .enumerate()
            .map(|(i, s)| SubTask {
                id: Ulid::new().to_string(),
                description: presentation.subtask_text(i, s),
                completed: false,
            })
            .collect();

        Ok(Quest {
            id: Ulid::new().to_string(),
            title: presentation.epic_title,
            original_title: self.title.clone(),
            description: self.title,
            epic_description: presentation.epic_description,
            category: self.category,
            completed: false,
            created_at: now(),
            completed_at: None,
            due_date: self.due_date,
            sub_tasks,
            real_life_reward: self.reward,
            visual_reward: Some(presentation.epic_reward).filter(|r| !r.is_empty()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_with_prose_around_json_is_read() {
        let reply = r#"Here is your quest:
{"epicTitle": "The Siege of the Inbox", "epicDescription": "Letters pile like bones.", "epicReward": "Silence"}
Fare well."#;
        let p = Presentation::from_reply(reply).unwrap();
        assert_eq!(p.epic_title, "The Siege of the Inbox");
        assert_eq!(p.epic_reward, "Silence");
    }

    #[test]
    fn unusable_replies_are_rejected() {
        assert_eq!(Presentation::from_reply("no json at all"), None);
        assert_eq!(Presentation::from_reply("{not: valid}"), None);
        assert_eq!(
            Presentation::from_reply(r#"{"epicTitle": "", "epicDescription": "x"}"#),
            None
        );
    }

    #[test]
    fn empty_title_is_refused() {
        assert_eq!(QuestDraft::new("   ").into_quest(None), Err(DraftError::EmptyTitle));
    }

    #[test]
    fn fallback_fills_every_presentation_field() {
        let mut draft = QuestDraft::new("Water plants");
        draft.subtasks = vec!["Fill can".into(), "  ".into(), "Pour".into()];
        let quest = draft.into_quest(None).unwrap();

        assert_eq!(quest.original_title, "Water plants");
        assert_eq!(quest.title, "Water plants");
        assert_eq!(
            quest.epic_description,
            "The task of water plants awaits, inevitable as the fading of light."
        );
        assert_eq!(quest.visual_reward.as_deref(), Some(DEFAULT_REWARD));
        let lines: Vec<_> = quest.sub_tasks.iter().map(|s| s.description.as_str()).collect();
        assert_eq!(
            lines,
            ["You must fill can, as it was foretold.", "You must pour, as it was foretold."]
        );
        assert_ne!(quest.sub_tasks[0].id, quest.sub_tasks[1].id);
    }

    #[test]
    fn short_rewrites_fall_back_per_subtask() {
        let mut draft = QuestDraft::new("Clean desk");
        draft.subtasks = vec!["Dust".into(), "Sort papers".into()];
        let presentation = Presentation {
            epic_title: "The Altar Cleansed".into(),
            epic_description: "Grime clings to the altar.".into(),
            epic_reward: String::new(),
            subtasks: vec!["ok".into(), "Sift the parchments of the damned".into()],
        };
        let quest = draft.into_quest(Some(presentation)).unwrap();
        assert_eq!(quest.title, "The Altar Cleansed");
        assert_eq!(quest.original_title, "Clean desk");
        assert_eq!(quest.sub_tasks[0].description, "You must dust, as it was foretold.");
        assert_eq!(quest.sub_tasks[1].description, "Sift the parchments of the damned");
        assert_eq!(quest.visual_reward, None);
    }
}
