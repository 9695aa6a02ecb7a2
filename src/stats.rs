use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, TimeZone};
use serde::Serialize;

use crate::types::Quest;

pub const SOULS_PER_QUEST: u64 = 10;
pub const SOULS_PER_SUBTASK: u64 = 5;
pub const SOULS_PER_LEVEL: u64 = 100;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct QuestStats {
    pub total: usize,
    pub completed: usize,
    pub active: usize,
    /// Whole percent, rounded.
    pub completion_rate: u32,
    pub souls: u64,
    pub mastery_level: u64,
    pub current_streak: u32,
    pub longest_streak: u32,
}

impl QuestStats {
    pub fn compute<Tz: TimeZone>(quests: &[Quest], now: &DateTime<Tz>) -> Self {
        let total = quests.len();
        let completed = quests.iter().filter(|q| q.completed).count();
        let completion_rate = if total == 0 {
            0
        } else {
            ((completed as f64 / total as f64) * 100.0).round() as u32
        };

        let souls = quests
            .iter()
            .map(|q| {
                let base = if q.completed { SOULS_PER_QUEST } else { 0 };
                base + q.completed_subtasks() as u64 * SOULS_PER_SUBTASK
            })
            .sum::<u64>();

        let tz = now.timezone();
        let days: BTreeSet<NaiveDate> = quests
            .iter()
            .filter(|q| q.completed)
            .filter_map(|q| q.completed_at)
            .map(|at| at.with_timezone(&tz).date_naive())
            .collect();
        let (current_streak, longest_streak) = streaks(&days, now.date_naive());

        Self {
            total,
            completed,
            active: total - completed,
            completion_rate,
            souls,
            mastery_level: souls / SOULS_PER_LEVEL,
            current_streak,
            longest_streak,
        }
    }

    pub fn mastery_title(&self) -> &'static str {
        mastery_title(self.mastery_level)
    }
}

/// Rank name for a mastery level.
pub fn mastery_title(level: u64) -> &'static str {
    match level {
        0 => "Hollow Wanderer",
        1..=4 => "Unkindled Ash",
        5..=9 => "Bearer of the Curse",
        10..=19 => "Chosen Undead",
        20..=49 => "Lord of Cinder",
        _ => "Dark Soul",
    }
}

/// Runs of consecutive completion days. The current run counts only if it
/// reaches today or yesterday.
fn streaks(days: &BTreeSet<NaiveDate>, today: NaiveDate) -> (u32, u32) {
    let mut longest = 0;
    let mut run = 0;
    let mut previous: Option<NaiveDate> = None;
    for &day in days {
        run = match previous {
            Some(p) if (day - p).num_days() == 1 => run + 1,
            _ => 1,
        };
        longest = longest.max(run);
        previous = Some(day);
    }

    let current = match previous {
        Some(last) if (today - last).num_days() <= 1 => run,
        _ => 0,
    };
    (current, longest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{QuestCategory, SubTask};
    use chrono::{Duration, Utc};

    fn at(rfc3339: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(rfc3339).unwrap().with_timezone(&Utc)
    }

    fn quest(completed_at: Option<DateTime<Utc>>, subtasks_done: usize) -> Quest {
        Quest {
            id: ulid::Ulid::new().to_string(),
            title: String::new(),
            original_title: "x".into(),
            description: String::new(),
            epic_description: String::new(),
            category: QuestCategory::Main,
            completed: completed_at.is_some(),
            created_at: at("2024-01-01T00:00:00Z"),
            completed_at,
            due_date: None,
            sub_tasks: (0..subtasks_done)
                .map(|i| SubTask { id: i.to_string(), description: String::new(), completed: true })
                .collect(),
            real_life_reward: String::new(),
            visual_reward: None,
        }
    }

    #[test]
    fn empty_log_is_all_zero() {
        assert_eq!(QuestStats::compute(&[], &Utc::now()), QuestStats::default());
    }

    #[test]
    fn souls_and_levels() {
        let now = at("2024-03-10T12:00:00Z");
        let quests = vec![quest(Some(now), 2), quest(None, 1), quest(None, 0)];
        let stats = QuestStats::compute(&quests, &now);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.active, 2);
        assert_eq!(stats.completion_rate, 33);
        assert_eq!(stats.souls, 10 + 10 + 5);
        assert_eq!(stats.mastery_level, 0);
    }

    #[test]
    fn mastery_titles_follow_level_bands() {
        let titles: Vec<_> = [0, 1, 4, 5, 9, 10, 19, 20, 49, 50, 500]
            .into_iter()
            .map(mastery_title)
            .collect();
        assert_eq!(
            titles,
            [
                "Hollow Wanderer",
                "Unkindled Ash",
                "Unkindled Ash",
                "Bearer of the Curse",
                "Bearer of the Curse",
                "Chosen Undead",
                "Chosen Undead",
                "Lord of Cinder",
                "Lord of Cinder",
                "Dark Soul",
                "Dark Soul",
            ]
        );
        assert_eq!(QuestStats::default().mastery_title(), "Hollow Wanderer");
    }

    #[test]
    fn streak_counts_consecutive_days() {
        let now = at("2024-03-10T12:00:00Z");
        let quests = vec![
            quest(Some(now - Duration::days(1)), 0),
            quest(Some(now - Duration::days(2)), 0),
            quest(Some(now - Duration::days(2)), 0),
            quest(Some(now - Duration::days(3)), 0),
            quest(Some(now - Duration::days(7)), 0),
            quest(Some(now - Duration::days(8)), 0),
        ];
        let stats = QuestStats::compute(&quests, &now);
        assert_eq!(stats.current_streak, 3);
        assert_eq!(stats.longest_streak, 3);
    }

    #[test]
    fn stale_streak_is_not_current() {
        let now = at("2024-03-10T12:00:00Z");
        let quests = vec![
            quest(Some(now - Duration::days(5)), 0),
            quest(Some(now - Duration::days(6)), 0),
        ];
        let stats = QuestStats::compute(&quests, &now);
        assert_eq!(stats.current_streak, 0);
        assert_eq!(stats.longest_streak, 2);
    }
}
