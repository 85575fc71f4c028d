//! CallDesk - farmer outreach call allocation
//!
//! CLI entry point over the task service.

use std::fs;
use std::path::PathBuf;

use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result};
use serde::Serialize;
use tracing::{debug, info};

use calldesk::cli::{Cli, Command, ListArgs, OutputFormat, parse_window};
use calldesk::config::Config;
use calldesk::seed::SeedFile;
use calldesk::{
    AllocationRequest, AllocationResult, BatchResult, CallOutcome, Caller, Page, StateManager, TaskService, TaskStatus,
    TaskView,
};

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Note: Can't log params here since logging isn't initialized yet
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("calldesk")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Determine log level with priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::options()
        .create(true)
        .append(true)
        .open(log_dir.join("calldesk.log"))
        .context("Failed to open log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load log level from config file early (before full config load)
    let config_log_level = Config::load_log_level(cli.config.as_ref());

    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    info!(storage = %config.storage.path.display(), "CallDesk loaded config");

    let state = StateManager::spawn(&config.storage.path).context("Failed to open task store")?;
    let service = TaskService::new(state.clone(), &config);

    let result = run(&cli, &service).await;
    state.shutdown().await.ok();
    result
}

async fn run(cli: &Cli, service: &TaskService) -> Result<()> {
    let format = cli.format;
    debug!(command = ?cli.command, "run: dispatching command");

    if let Command::Seed { file } = &cli.command {
        debug!(file = %file.display(), "run: matched Seed command");
        let summary = SeedFile::load(file)?.apply(service).await?;
        return match format {
            OutputFormat::Json => print_json(&summary),
            OutputFormat::Text => {
                println!(
                    "Seeded {} agents, {} farmers, {} activities, {} tasks",
                    summary.agents,
                    summary.farmers,
                    summary.activities,
                    summary.tasks.len()
                );
                Ok(())
            }
        };
    }

    let caller = resolve_caller(cli, service).await?;
    debug!(caller = %caller.id, role = %caller.role, "run: caller resolved");

    match &cli.command {
        Command::Seed { .. } => Ok(()),
        Command::Allocate {
            language,
            count,
            from,
            to,
        } => {
            let (date_from, date_to) = parse_window(from.as_deref(), to.as_deref())?;
            let request = AllocationRequest {
                language: language.clone(),
                count: *count,
                date_from,
                date_to,
            };
            let result = service.allocate(&caller, request).await?;
            emit(format, &result, print_allocation)
        }
        Command::Next => match service.next_task_for_agent(&caller, &caller.id).await? {
            Some(view) => emit(format, &view, print_task),
            None => match format {
                OutputFormat::Json => print_json(&serde_json::Value::Null),
                OutputFormat::Text => {
                    println!("{}", "No open tasks".dimmed());
                    Ok(())
                }
            },
        },
        Command::Available { agent } => {
            let agent_id = agent.as_deref().unwrap_or(&caller.id);
            let views = service.available_tasks_for_agent(&caller, agent_id).await?;
            emit(format, &views, |views| print_rows(views))
        }
        Command::Load { task } => {
            let view = service.load_task(&caller, task).await?;
            emit(format, &view, print_task)
        }
        Command::Submit {
            task,
            status,
            comments,
            sentiment,
            recalled_activity,
            purchased_product,
            willing_to_purchase,
            duration,
        } => {
            let outcome = CallOutcome {
                call_status: status.clone(),
                recalled_activity: *recalled_activity,
                purchased_product: *purchased_product,
                willing_to_purchase: *willing_to_purchase,
                comments: comments.clone(),
                sentiment: *sentiment,
                call_duration_secs: *duration,
            };
            let view = service.submit_call_outcome(&caller, task, outcome).await?;
            emit(format, &view, print_task)
        }
        Command::Reassign { task, agent } => {
            let view = service.reassign_task(&caller, task, agent).await?;
            emit(format, &view, print_task)
        }
        Command::Override { task, status, notes } => {
            let view = service.override_status(&caller, task, *status, notes.clone()).await?;
            emit(format, &view, print_task)
        }
        Command::BulkReassign { agent, ids } => {
            let report = service.bulk_reassign(&caller, ids, agent).await?;
            emit(format, &report, print_batch)
        }
        Command::BulkOverride { status, ids, notes } => {
            let report = service
                .bulk_override_status(&caller, ids, *status, notes.clone())
                .await?;
            emit(format, &report, print_batch)
        }
        Command::Pending { list } => {
            let page = service.list_pending_tasks(&caller, list.filters()?, list.page()).await?;
            emit(format, &page, print_page)
        }
        Command::Team { lead, list } => {
            let page = service
                .list_team_tasks(&caller, lead, list.filters()?, list.page())
                .await?;
            emit(format, &page, print_page)
        }
        Command::Unassigned { list } => {
            let page = unassigned_page(service, &caller, list).await?;
            emit(format, &page, print_page)
        }
        Command::Show { task } => {
            let view = service.get_task(&caller, task).await?;
            emit(format, &view, print_task)
        }
    }
}

async fn resolve_caller(cli: &Cli, service: &TaskService) -> Result<Caller> {
    let id = cli
        .caller
        .as_deref()
        .ok_or_else(|| eyre::eyre!("This command needs a caller: pass --as <CALLER-ID>"))?;
    Ok(service.resolve_caller(id).await?)
}

async fn unassigned_page(service: &TaskService, caller: &Caller, list: &ListArgs) -> Result<Page<TaskView>> {
    Ok(service
        .list_unassigned_tasks(caller, list.filters()?, list.page())
        .await?)
}

fn emit<T: Serialize>(format: OutputFormat, value: &T, text: impl Fn(&T)) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(value),
        OutputFormat::Text => {
            text(value);
            Ok(())
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn colored_status(status: TaskStatus) -> colored::ColoredString {
    let label = status.as_str();
    match status {
        TaskStatus::Unassigned => label.dimmed(),
        TaskStatus::SampledInQueue => label.cyan(),
        TaskStatus::InProgress => label.yellow(),
        TaskStatus::Completed => label.green(),
        TaskStatus::NotReachable | TaskStatus::InvalidNumber => label.red(),
    }
}

fn print_task(view: &TaskView) {
    let task = &view.task;
    println!("{} {}", task.id.bold(), colored_status(task.status));
    println!("  Agent:     {}", task.assigned_agent.as_deref().unwrap_or("-"));
    println!("  Scheduled: {}", calldesk::domain::format_date(task.scheduled_date));
    println!(
        "  Farmer:    {} ({}, {}) {}",
        view.farmer.name, view.farmer.preferred_language, view.farmer.phone, view.farmer.location
    );
    println!(
        "  Activity:  {} on {} by {} at {}",
        view.activity.kind, view.activity.date, view.activity.officer_name, view.activity.location
    );
    if let (Some(parent), Some(n)) = (&task.parent_task_id, task.callback_number) {
        println!("  Callback:  #{} of {}", n, parent);
    }
    if let Some(ref log) = task.call_log {
        println!("  Call:      {}", log.call_status);
        if let Some(ref comments) = log.comments {
            println!("             {}", comments);
        }
    }
    for entry in &task.interaction_history {
        println!(
            "    - {} {} [{}] {}",
            calldesk::domain::format_date(entry.timestamp),
            entry.status,
            entry.actor.as_deref().unwrap_or("-"),
            entry.notes.as_deref().unwrap_or("")
        );
    }
}

fn print_rows(views: &[TaskView]) {
    if views.is_empty() {
        println!("{}", "No tasks".dimmed());
        return;
    }
    for view in views {
        println!(
            "{:<32} {:<18} {:<12} {:<10} {}",
            view.task.id,
            colored_status(view.task.status),
            view.task.assigned_agent.as_deref().unwrap_or("-"),
            calldesk::domain::format_date(view.task.scheduled_date),
            view.farmer.preferred_language
        );
    }
}

fn print_page(page: &Page<TaskView>) {
    print_rows(&page.items);
    println!(
        "{}",
        format!(
            "Page {}/{} ({} tasks, {} per page)",
            page.page,
            page.total_pages.max(1),
            page.total,
            page.limit
        )
        .dimmed()
    );
}

fn print_allocation(result: &AllocationResult) {
    println!(
        "Allocated {} of {} matched tasks",
        result.allocated.to_string().green().bold(),
        result.matched_tasks
    );
    if !result.agents_used.is_empty() {
        println!("  Agents: {}", result.agents_used.join(", "));
    }
    for (language, skipped) in &result.skipped_by_language {
        println!("  {} {} skipped (no capable agent)", skipped.to_string().yellow(), language);
    }
}

fn print_batch(report: &BatchResult) {
    println!(
        "{} succeeded, {} failed",
        report.successful.to_string().green(),
        report.failed.to_string().red()
    );
    for item in &report.results {
        println!(
            "  {} {} {}",
            item.task_id,
            colored_status(item.status),
            item.assigned_agent.as_deref().unwrap_or("-")
        );
    }
    for error in &report.errors {
        println!("  {} {} {}", error.task_id.red(), error.code, error.message);
    }
}
