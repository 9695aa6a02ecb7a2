use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, TimeZone, Utc};

use crate::types::{Quest, QuestCategory};

/// Where a due date falls relative to the caller's calendar day.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DueStatus {
    NoDueDate,
    Overdue,
    Today,
    ThisWeek,
    Later,
}

impl DueStatus {
    /// Days are counted in `now`'s time zone. "This week" is the six days
    /// after today.
    pub fn classify<Tz: TimeZone>(due: Option<DateTime<Utc>>, now: &DateTime<Tz>) -> Self {
        let Some(due) = due else {
            return Self::NoDueDate;
        };
        let today = now.date_naive();
        let due_day = due.with_timezone(&now.timezone()).date_naive();
        match (due_day - today).num_days() {
            d if d < 0 => Self::Overdue,
            0 => Self::Today,
            1..=6 => Self::ThisWeek,
            _ => Self::Later,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StatusFilter {
    #[default]
    All,
    Active,
    Completed,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DueFilter {
    #[default]
    All,
    Overdue,
    Today,
    Week,
    None,
}

macro_rules! filter_str {
    ($ty:ident { $($variant:ident => $text:literal),* $(,)? }) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(match self { $(Self::$variant => $text),* })
            }
        }

        impl FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($text => Ok(Self::$variant),)*
                    other => Err(format!("unknown {} '{other}'", stringify!($ty))),
                }
            }
        }
    };
}

filter_str!(StatusFilter { All => "all", Active => "active", Completed => "completed" });
filter_str!(DueFilter { All => "all", Overdue => "overdue", Today => "today", Week => "week", None => "none" });

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QuestFilter {
    pub search: String,
    pub category: Option<QuestCategory>,
    pub status: StatusFilter,
    pub due: DueFilter,
}

impl QuestFilter {
    pub fn is_active(&self) -> bool {
        !self.search.trim().is_empty()
            || self.category.is_some()
            || self.status != StatusFilter::All
            || self.due != DueFilter::All
    }

    pub fn matches<Tz: TimeZone>(&self, quest: &Quest, now: &DateTime<Tz>) -> bool {
        self.matches_search(quest)
            && self.category.is_none_or(|c| c == quest.category)
            && match self.status {
                StatusFilter::All => true,
                StatusFilter::Active => !quest.completed,
                StatusFilter::Completed => quest.completed,
            }
            && self.matches_due(quest, now)
    }

    fn matches_search(&self, quest: &Quest) -> bool {
        let needle = self.search.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        [
            &quest.title,
            &quest.original_title,
            &quest.description,
            &quest.epic_description,
        ]
        .iter()
        .any(|field| field.to_lowercase().contains(&needle))
    }

    fn matches_due<Tz: TimeZone>(&self, quest: &Quest, now: &DateTime<Tz>) -> bool {
        let status = DueStatus::classify(quest.due_date, now);
        match self.due {
            DueFilter::All => true,
            DueFilter::Overdue => status == DueStatus::Overdue && !quest.completed,
            DueFilter::Today => status == DueStatus::Today,
            DueFilter::Week => matches!(status, DueStatus::Today | DueStatus::ThisWeek),
            DueFilter::None => status == DueStatus::NoDueDate,
        }
    }

    pub fn apply<'a, Tz: TimeZone>(&self, quests: &'a [Quest], now: &DateTime<Tz>) -> Vec<&'a Quest> {
        quests.iter().filter(|q| self.matches(q, now)).collect()
    }
}
