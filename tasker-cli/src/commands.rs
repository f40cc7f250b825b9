use crate::cli::{AddArgs, Cli, Command, EditArgs, ListArgs};
use crate::render;
use colored::*;
use dialoguer::{theme::ColorfulTheme, Confirm, Input, Select};
use std::error::Error;
use std::sync::Arc;
use tasker_client::calendar::auth::AuthPrompt;
use tasker_client::{Client, ClientConfig, TaskEvent};
use tasker_core::models::parse_due_date;
use tasker_core::ordering::{sort_by_column, ColumnSortState};
use tasker_core::validation::{ValidationPolicy, PRIORITY_MAX, PRIORITY_MIN};
use tasker_core::{SyncError, TaskDraft, TaskId, TaskerError};

pub type CliResult<T = ()> = Result<T, Box<dyn Error>>;

/// Prints the consent URL; the loopback listener picks up the redirect.
pub struct TerminalPrompt;

impl AuthPrompt for TerminalPrompt {
    fn open(&self, auth_url: &str) {
        println!("{}", "🔐 Google Calendar authorization required".bold().yellow());
        println!("Open this URL in your browser and grant access:");
        println!("{}", auth_url.blue().underline());
    }
}

pub async fn run(cli: Cli) -> CliResult {
    let config = cli.config();
    tracing::debug!("CONFIG: Using database {}", config.database_url());
    if let Command::Init = cli.command {
        return init(&config).await;
    }

    let client = Client::connect(&config, Arc::new(TerminalPrompt)).await?;
    match cli.command {
        Command::Add(args) => add(&client, args).await,
        Command::Edit(args) => edit(&client, args).await,
        Command::Done { id } => done(&client, id).await,
        Command::Delete { id, yes } => delete(&client, id, yes).await,
        Command::Show { id, remote } => show(&client, id, remote).await,
        Command::List(args) => list(&client, args).await,
        Command::Sync { id } => sync(&client, id).await,
        Command::Init => Ok(()),
    }
}

/// Build a draft from flags alone. `None` when no title was given and the
/// user should be prompted instead.
pub fn draft_from_args(args: &AddArgs) -> CliResult<Option<TaskDraft>> {
    let Some(title) = &args.title else {
        return Ok(None);
    };
    let draft = TaskDraft::new(title.clone())
        .with_description(args.description.clone().unwrap_or_default())
        .with_due_date(parse_due_date(args.due.as_deref().unwrap_or(""))?)
        .with_priority(args.priority.unwrap_or(PRIORITY_MIN))
        .with_tags(args.tags.clone().unwrap_or_default());
    Ok(Some(draft))
}

/// Overlay the edit flags on an existing draft.
pub fn apply_edits(mut draft: TaskDraft, args: &EditArgs) -> CliResult<TaskDraft> {
    if let Some(title) = &args.title {
        draft.title = title.clone();
    }
    if let Some(description) = &args.description {
        draft.description = description.clone();
    }
    if let Some(due) = &args.due {
        draft = draft.with_due_date(parse_due_date(due)?);
    }
    if let Some(priority) = args.priority {
        draft.priority = priority;
    }
    if let Some(tags) = &args.tags {
        draft.tags = tags.clone();
    }
    Ok(draft)
}

fn prompt_draft(policy: &ValidationPolicy) -> CliResult<TaskDraft> {
    let theme = ColorfulTheme::default();
    println!("{}", "📝 Create New Task".bold().cyan());
    println!("{}", "─".repeat(40).dimmed());

    let title: String = Input::with_theme(&theme)
        .with_prompt("Task title")
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("Title cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let description: String = Input::with_theme(&theme)
        .with_prompt("Description")
        .default("".to_string())
        .show_default(false)
        .interact_text()?;

    let require_due = policy.require_due_date;
    let due_input: String = Input::with_theme(&theme)
        .with_prompt("Due date (YYYY-MM-DD)")
        .default("".to_string())
        .show_default(false)
        .validate_with(move |input: &String| -> Result<(), String> {
            match parse_due_date(input) {
                Ok(None) if require_due => Err("A due date is required".to_string()),
                Ok(_) => Ok(()),
                Err(e) => Err(e.to_string()),
            }
        })
        .interact_text()?;

    let priority_choices: Vec<String> = (PRIORITY_MIN..=PRIORITY_MAX)
        .map(|p| format!("{} {}", render::priority_icon(p), p))
        .collect();
    let priority_selection = Select::with_theme(&theme)
        .with_prompt("Priority")
        .items(&priority_choices)
        .default(0)
        .interact()?;

    let tags: String = Input::with_theme(&theme)
        .with_prompt("Tags (comma-separated, optional)")
        .default("".to_string())
        .show_default(false)
        .interact_text()?;

    Ok(TaskDraft::new(title)
        .with_description(description)
        .with_due_date(parse_due_date(&due_input)?)
        .with_priority(PRIORITY_MIN + priority_selection as i64)
        .with_tags(tags))
}

async fn add(client: &Client, args: AddArgs) -> CliResult {
    let policy = if args.quick {
        ValidationPolicy::quick_add()
    } else {
        ValidationPolicy::editor()
    };
    let draft = match draft_from_args(&args)? {
        Some(draft) => draft,
        None => prompt_draft(&policy)?,
    };
    draft.validate(&policy)?;

    let task = client.create_task(&draft).await?;
    println!(
        "✅ Task created: {} {}",
        task.id.to_string().green(),
        task.title.bold()
    );

    if args.sync {
        sync(client, task.id).await?;
    }
    Ok(())
}

async fn edit(client: &Client, args: EditArgs) -> CliResult {
    let task = client
        .get_task(args.id)
        .await?
        .ok_or(TaskerError::TaskNotFound(args.id))?;
    let draft = apply_edits(task.draft(), &args)?;
    draft.validate(&ValidationPolicy::editor())?;

    let updated = client.update_task(args.id, &draft, task.completed).await?;
    println!(
        "✏️  Task {} updated: {}",
        updated.id.to_string().green(),
        updated.title.bold()
    );
    Ok(())
}

async fn done(client: &Client, id: TaskId) -> CliResult {
    if client.toggle_completed(id).await? {
        println!("✅ Task {} marked as completed", id.to_string().green());
    } else {
        println!("⏳ Task {} reopened", id.to_string().yellow());
    }
    Ok(())
}

async fn delete(client: &Client, id: TaskId, yes: bool) -> CliResult {
    let Some(task) = client.get_task(id).await? else {
        println!("📭 Task {} does not exist", id);
        return Ok(());
    };

    if !yes
        && !Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(format!("Delete '{}'?", task.title))
            .default(false)
            .interact()?
    {
        println!("Cancelled.");
        return Ok(());
    }

    client.delete_task(id).await?;
    println!("🗑️  Task {} deleted", id.to_string().red());
    Ok(())
}

async fn show(client: &Client, id: TaskId, remote: bool) -> CliResult {
    let task = client
        .get_task(id)
        .await?
        .ok_or(TaskerError::TaskNotFound(id))?;
    let event_id = client.store().mappings().get(id).await?;
    render::print_task_detail(&task, event_id.as_deref());

    if remote && event_id.is_some() {
        match client.remote_event(id).await? {
            Some(event) => {
                println!(
                    "Remote:      {} ({})",
                    event.summary.unwrap_or_default(),
                    event.status.unwrap_or_else(|| "unknown".to_string()).dimmed()
                );
                if let Some(link) = event.html_link {
                    println!("             {}", link.blue().underline());
                }
            }
            None => println!(
                "Remote:      {}",
                "event no longer exists; the next sync creates a new one".yellow()
            ),
        }
    }
    Ok(())
}

async fn list(client: &Client, args: ListArgs) -> CliResult {
    let filter = args.tag.as_deref();
    let mut tasks = if args.default_sort {
        let mut tasks = client.list_default_sorted(filter).await?;
        if args.hide_completed {
            tasks.retain(|t| !t.completed);
        }
        tasks
    } else {
        client
            .list_tasks(filter, !args.hide_completed, args.sort)
            .await?
    };

    if let Some(column) = args.column {
        sort_by_column(&mut tasks, column, args.desc);
    } else if !args.clicks.is_empty() {
        let mut header = ColumnSortState::new();
        for column in &args.clicks {
            header.click(&mut tasks, *column);
        }
    }
    render::print_task_list(&tasks);
    Ok(())
}

async fn sync(client: &Client, id: TaskId) -> CliResult {
    let dispatcher = client.event_dispatcher();
    dispatcher.register_callback(|event| match event {
        TaskEvent::SyncStarted { task_id } => {
            println!("🔄 Syncing task {}...", task_id.to_string().blue())
        }
        TaskEvent::SyncCompleted { task_id, event_id } => println!(
            "✅ Task {} synced to event {}",
            task_id.to_string().green(),
            event_id.green()
        ),
        TaskEvent::SyncFailed {
            credentials: true, ..
        } => println!(
            "{}",
            "🔑 Check the OAuth credentials file, or delete the cached token and retry".yellow()
        ),
        _ => {}
    })?;

    let (tx, rx) = tokio::sync::oneshot::channel();
    let handle = client
        .spawn_sync_task(id, move |_, result| {
            let _ = tx.send(result);
        })
        .await?;
    let joined = handle.await;
    dispatcher.process_events()?;
    joined.map_err(|e| TaskerError::Sync(SyncError::Aborted(e.to_string())))?;

    rx.await
        .map_err(|e| TaskerError::Sync(SyncError::Aborted(e.to_string())))??;
    Ok(())
}

async fn init(config: &ClientConfig) -> CliResult {
    let client = Client::new(config).await?;
    let count = client.store().count().await?;

    println!("{}", "🚀 Tasker".bold().cyan());
    println!("{}", "=========".cyan());
    let location = config
        .database_path
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| ":memory:".to_string());
    println!("📁 Database: {} ({} tasks)", location.green(), count);

    if config.credentials_path.exists() {
        println!(
            "🔑 Credentials: {}",
            config.credentials_path.display().to_string().green()
        );
    } else {
        println!(
            "⚠️  Credentials missing: save an OAuth client JSON to {}",
            config.credentials_path.display().to_string().yellow()
        );
    }

    if config.token_path.exists() {
        println!("🎫 Token cache: {}", config.token_path.display().to_string().green());
    } else {
        println!("🎫 Token cache: {}", "created on first sync".dimmed());
    }
    Ok(())
}
