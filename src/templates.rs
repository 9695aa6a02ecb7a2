use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, MutexGuard};
use tracing::warn;
use ulid::Ulid;

use crate::config::StorageKeys;
use crate::error::{StoreError, StoreResult, TemplateError};
use crate::presentation::QuestDraft;
use crate::storage::kv::KeyValueStore;
use crate::types::{NewTemplate, QuestCategory, QuestTemplate, now};

pub const CUSTOM_PREFIX: &str = "custom-";

fn builtin(
    id: &str,
    name: &str,
    title: &str,
    category: QuestCategory,
    subtasks: &[&str],
    created_at: DateTime<Utc>,
) -> QuestTemplate {
    QuestTemplate {
        id: id.to_string(),
        name: name.to_string(),
        title: title.to_string(),
        category,
        subtasks: subtasks.iter().map(|s| s.to_string()).collect(),
        created_at,
        usage_count: 0,
    }
}

/// The stock templates. They are handed out on every read and never stored.
pub fn builtin_templates(created_at: DateTime<Utc>) -> Vec<QuestTemplate> {
    vec![
        builtin(
            "daily-standup",
            "Daily Standup",
            "Attend daily standup meeting",
            QuestCategory::Main,
            &["Review yesterday's progress", "Share today's plan", "Flag any blockers"],
            created_at,
        ),
        builtin(
            "weekly-review",
            "Weekly Review",
            "Complete weekly review",
            QuestCategory::Main,
            &["Review completed tasks", "Plan next week", "Update goals"],
            created_at,
        ),
        builtin(
            "code-review",
            "Code Review",
            "Review pull request",
            QuestCategory::Main,
            &["Check code quality", "Test functionality", "Leave feedback"],
            created_at,
        ),
        builtin(
            "morning-routine",
            "Morning Routine",
            "Complete morning routine",
            QuestCategory::Optional,
            &["Exercise", "Breakfast", "Plan the day"],
            created_at,
        ),
        builtin(
            "learning-session",
            "Learning Session",
            "Study new topic",
            QuestCategory::Optional,
            &["Read documentation", "Build example project", "Take notes"],
            created_at,
        ),
    ]
}

impl QuestTemplate {
    pub fn draft(&self) -> QuestDraft {
        QuestDraft {
            title: self.title.clone(),
            category: self.category,
            reward: String::new(),
            due_date: None,
            subtasks: self.subtasks.clone(),
        }
    }
}

/// Built-in templates plus user templates kept as one JSON array in the
/// key-value store. Built-in usage is counted under per-template keys.
///
/// Key-value access runs on the blocking pool. With a write queue attached,
/// every read-modify-write holds it, so template writes and quest writes made
/// through the same [`QuestStorage`](crate::QuestStorage) never interleave.
#[derive(Clone)]
pub struct TemplateService {
    kv: Arc<dyn KeyValueStore>,
    keys: StorageKeys,
    builtins: Vec<QuestTemplate>,
    writes: Option<Arc<Mutex<()>>>,
}

impl TemplateService {
    pub fn new(kv: Arc<dyn KeyValueStore>, keys: StorageKeys, builtins: Vec<QuestTemplate>) -> Self {
        Self {
            kv,
            keys,
            builtins,
            writes: None,
        }
    }

    pub fn with_write_queue(mut self, writes: Option<Arc<Mutex<()>>>) -> Self {
        self.writes = writes;
        self
    }

    pub fn is_builtin(&self, template_id: &str) -> bool {
        self.builtins.iter().any(|t| t.id == template_id)
    }

    async fn write_guard(&self) -> Option<MutexGuard<'_, ()>> {
        match &self.writes {
            Some(lock) => Some(lock.lock().await),
            None => None,
        }
    }

    async fn blocking<T, F>(&self, op: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&TemplateService) -> StoreResult<T> + Send + 'static,
    {
        let service = self.clone();
        tokio::task::spawn_blocking(move || op(&service))
            .await
            .map_err(|e| StoreError::Task(format!("spawn_blocking failed: {e}")))?
    }

    fn load_custom(&self) -> StoreResult<Vec<QuestTemplate>> {
        match self.kv.get_item(&self.keys.templates)? {
            Some(raw) if !raw.trim().is_empty() => Ok(serde_json::from_str(&raw)?),
            _ => Ok(Vec::new()),
        }
    }

    fn store_custom(&self, templates: &[QuestTemplate]) -> StoreResult<()> {
        let raw = serde_json::to_string(templates)?;
        self.kv.set_item(&self.keys.templates, &raw)
    }

    fn with_builtins(&self, custom: Vec<QuestTemplate>) -> Vec<QuestTemplate> {
        let mut all = self.builtins.clone();
        all.extend(custom);
        all
    }

    /// Built-ins first, then custom templates. Unreadable custom data leaves
    /// just the built-ins.
    pub async fn load_templates(&self) -> Vec<QuestTemplate> {
        let custom = self
            .blocking(|service| service.load_custom())
            .await
            .unwrap_or_else(|e| {
                warn!(error = %e, "failed to load custom templates");
                Vec::new()
            });
        self.with_builtins(custom)
    }

    pub async fn find(&self, template_id: &str) -> Option<QuestTemplate> {
        self.load_templates()
            .await
            .into_iter()
            .find(|t| t.id == template_id)
    }

    pub async fn save_template(
        &self,
        template: NewTemplate,
    ) -> Result<Vec<QuestTemplate>, TemplateError> {
        let _guard = self.write_guard().await;
        let custom = self
            .blocking(move |service| {
                let mut custom = service.load_custom()?;
                custom.push(QuestTemplate {
                    id: format!("{CUSTOM_PREFIX}{}", Ulid::new()),
                    name: template.name,
                    title: template.title,
                    category: template.category,
                    subtasks: template.subtasks,
                    created_at: now(),
                    usage_count: 0,
                });
                service.store_custom(&custom)?;
                Ok(custom)
            })
            .await?;
        Ok(self.with_builtins(custom))
    }

    pub async fn delete_template(
        &self,
        template_id: &str,
    ) -> Result<Vec<QuestTemplate>, TemplateError> {
        if self.is_builtin(template_id) {
            return Err(TemplateError::BuiltinReadOnly(template_id.to_string()));
        }
        let _guard = self.write_guard().await;
        let template_id = template_id.to_string();
        let custom = self
            .blocking(move |service| {
                let mut custom = service.load_custom()?;
                custom.retain(|t| t.id != template_id);
                service.store_custom(&custom)?;
                Ok(custom)
            })
            .await?;
        Ok(self.with_builtins(custom))
    }

    /// Failures are logged and otherwise ignored; usage counts are advisory.
    pub async fn increment_usage(&self, template_id: &str) {
        let _guard = self.write_guard().await;
        let id = template_id.to_string();
        let result = self
            .blocking(move |service| service.try_increment_usage(&id))
            .await;
        if let Err(e) = result {
            warn!(template = template_id, error = %e, "failed to record template usage");
        }
    }

    fn try_increment_usage(&self, template_id: &str) -> StoreResult<()> {
        if self.is_builtin(template_id) {
            let key = self.keys.template_usage(template_id);
            let next = self.builtin_usage(template_id)? + 1;
            return self.kv.set_item(&key, &next.to_string());
        }

        let mut custom = self.load_custom()?;
        for template in custom.iter_mut().filter(|t| t.id == template_id) {
            template.usage_count += 1;
        }
        self.store_custom(&custom)
    }

    fn builtin_usage(&self, template_id: &str) -> StoreResult<u64> {
        let key = self.keys.template_usage(template_id);
        Ok(self
            .kv
            .get_item(&key)?
            .and_then(|raw| raw.trim().parse().ok())
            .unwrap_or(0))
    }

    /// Usage from the side counter for built-ins, from the record otherwise.
    pub async fn usage_count(&self, template_id: &str) -> Result<u64, TemplateError> {
        let id = template_id.to_string();
        let count = self
            .blocking(move |service| {
                if service.is_builtin(&id) {
                    return service.builtin_usage(&id);
                }
                Ok(service
                    .load_custom()?
                    .iter()
                    .find(|t| t.id == id)
                    .map(|t| t.usage_count)
                    .unwrap_or(0))
            })
            .await?;
        Ok(count)
    }
}
