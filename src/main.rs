mod cli;

mod metadata {
    include!(concat!(env!("OUT_DIR"), "/pkg_info.rs"));
}

use chrono::Local;
use clap::Parser;
use colored::Colorize;
use dialoguer::Confirm;
use quest_ledger::error::{DraftError, QuestStorageError, StoreError, TemplateError};
use quest_ledger::filters::QuestFilter;
use quest_ledger::presentation::QuestDraft;
use quest_ledger::stats::QuestStats;
use quest_ledger::storage::QuestBackend;
use quest_ledger::{NewTemplate, Quest, QuestStorage, QuestTemplate};
use thiserror::Error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{AddArgs, Cli, Command, ListArgs, TemplateCommand};

pub type ServiceResult<T> = core::result::Result<T, ServiceError>;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    FromString(String),
    #[error("{0}")]
    Store(#[from] StoreError),
    #[error("{0}")]
    Storage(#[from] QuestStorageError),
    #[error("{0}")]
    Template(#[from] TemplateError),
    #[error("{0}")]
    Draft(#[from] DraftError),
    #[error("{0}")]
    Prompt(#[from] dialoguer::Error),
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    cli.storage.validate().map_err(ServiceError::FromString)?;

    if let Command::Version = cli.command {
        println!("{} {}", metadata::PKG_NAME, metadata::PKG_VERSION);
        return Ok(());
    }

    let storage = QuestStorage::open(cli.storage.to_config()).map_err(ServiceError::from)?;
    tracing::debug!(data_dir = %storage.config().data_dir.display(), "storage ready");

    let outcome = storage.migrate_if_needed().await;
    tracing::debug!(%outcome, "startup migration check");

    run(&storage, cli.command).await?;
    Ok(())
}

async fn run(storage: &QuestStorage, command: Command) -> ServiceResult<()> {
    match command {
        Command::Status => print_status(storage),
        Command::Migrate => {
            let outcome = storage.migrate_if_needed().await;
            println!("{outcome}");
        }
        Command::List(args) => list(storage, args).await,
        Command::Add(args) => add(storage, args).await?,
        Command::Complete { id } => {
            let quests = storage.toggle_completion(&id).await?;
            report_quest(&quests, &id);
        }
        Command::Subtask {
            quest_id,
            subtask_id,
        } => {
            let quests = storage.toggle_subtask(&quest_id, &subtask_id).await?;
            report_quest(&quests, &quest_id);
        }
        Command::Delete { id, yes } => {
            let confirmed = yes
                || Confirm::new()
                    .with_prompt(format!("Delete quest {id}?"))
                    .default(false)
                    .interact()?;
            if confirmed {
                let quests = storage.delete(&id).await?;
                println!("{} quests remain", quests.len());
            }
        }
        Command::Stats => {
            let stats = QuestStats::compute(&storage.load().await, &Local::now());
            println!("quests:     {} ({} active, {} completed)", stats.total, stats.active, stats.completed);
            println!("completion: {}%", stats.completion_rate);
            println!(
                "souls:      {} (mastery level {}, {})",
                stats.souls,
                stats.mastery_level,
                stats.mastery_title()
            );
            println!("streak:     {} current, {} longest", stats.current_streak, stats.longest_streak);
        }
        Command::Templates(command) => templates(storage, command).await?,
        Command::Version => {}
    }
    Ok(())
}

fn print_status(storage: &QuestStorage) {
    let config = storage.config();
    println!("data dir:        {}", config.data_dir.display());
    println!("legacy store:    {}", config.legacy_path().display());
    match config.record_database_path() {
        Some(path) => println!("record database: {}", path.display()),
        None => println!("record database: {}", "unavailable".yellow()),
    }
    println!("migrated:        {}", storage.migration_complete());
    println!("active backend:  {}", storage.active_backend().name().bold());
}

async fn list(storage: &QuestStorage, args: ListArgs) {
    let filter = QuestFilter {
        search: args.search,
        category: args.category,
        status: args.status,
        due: args.due,
    };
    let quests = storage.load().await;
    let now = Local::now();
    let shown = filter.apply(&quests, &now);
    for quest in &shown {
        print_quest(quest);
    }
    if filter.is_active() {
        println!("{} of {} quests shown", shown.len(), quests.len());
    }
}

async fn add(storage: &QuestStorage, args: AddArgs) -> ServiceResult<()> {
    let templates = storage.templates();
    let mut draft = match &args.template {
        Some(id) => templates
            .find(id)
            .await
            .map(|t| t.draft())
            .ok_or_else(|| ServiceError::FromString(format!("no template with id '{id}'")))?,
        None => QuestDraft::default(),
    };
    if let Some(title) = args.title {
        draft.title = title;
    }
    if let Some(category) = args.category {
        draft.category = category;
    }
    draft.reward = args.reward;
    draft.due_date = args.due;
    draft.subtasks.extend(args.subtasks);

    let quest = draft.into_quest(None)?;
    let id = quest.id.clone();
    let quests = storage.add(quest).await?;
    if let Some(template_id) = &args.template {
        templates.increment_usage(template_id).await;
    }
    report_quest(&quests, &id);
    Ok(())
}

async fn templates(storage: &QuestStorage, command: TemplateCommand) -> ServiceResult<()> {
    let service = storage.templates();
    let shown = match command {
        TemplateCommand::List => service.load_templates().await,
        TemplateCommand::Save {
            name,
            title,
            category,
            subtasks,
        } => {
            service
                .save_template(NewTemplate {
                    name,
                    title,
                    category,
                    subtasks,
                })
                .await?
        }
        TemplateCommand::Delete { id } => service.delete_template(&id).await?,
    };
    for template in &shown {
        print_template(template, service.usage_count(&template.id).await?);
    }
    Ok(())
}

fn report_quest(quests: &[Quest], id: &str) {
    match quests.iter().find(|q| q.id == id) {
        Some(quest) => print_quest(quest),
        None => println!("{} no quest with id {id}", "warning:".yellow()),
    }
}

fn print_quest(quest: &Quest) {
    let mark = if quest.completed {
        "[x]".green()
    } else {
        "[ ]".normal()
    };
    println!(
        "{mark} {} {} ({}) {}",
        quest.id.dimmed(),
        quest.title.bold(),
        quest.category,
        quest.original_title.italic()
    );
    if let Some(due) = quest.due_date {
        println!("      due {}", due.with_timezone(&Local).format("%Y-%m-%d %H:%M"));
    }
    for subtask in &quest.sub_tasks {
        let mark = if subtask.completed { "[x]" } else { "[ ]" };
        println!("      {mark} {} {}", subtask.id.dimmed(), subtask.description);
    }
}

fn print_template(template: &QuestTemplate, usage: u64) {
    println!(
        "{} {} ({}, used {usage}x): {}",
        template.id.dimmed(),
        template.name.bold(),
        template.category,
        template.title
    );
}
