use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tasker_client::ClientConfig;
use tasker_core::{Column, SortKey, TaskId};

#[derive(Parser, Debug)]
#[command(name = "tasker")]
#[command(about = "Task manager with Google Calendar sync", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// SQLite database file (default: $TASKER_HOME/tasks.db)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// OAuth client secrets JSON
    #[arg(long, global = true)]
    pub credentials: Option<PathBuf>,

    /// Cached OAuth token JSON
    #[arg(long, global = true)]
    pub token: Option<PathBuf>,

    /// Calendar to sync into
    #[arg(long, global = true)]
    pub calendar: Option<String>,

    /// Debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Add a task (prompts for anything not given)
    Add(AddArgs),
    /// Change fields of a task; `--due ""` clears the due date
    Edit(EditArgs),
    /// Toggle completion
    Done { id: TaskId },
    /// Delete a task and its calendar link
    Delete {
        id: TaskId,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Show one task
    Show {
        id: TaskId,
        /// Fetch the linked calendar event too
        #[arg(long)]
        remote: bool,
    },
    /// List tasks
    List(ListArgs),
    /// Push a task to the calendar
    Sync { id: TaskId },
    /// Create the database and check credential files
    Init,
}

#[derive(Args, Debug)]
pub struct AddArgs {
    pub title: Option<String>,
    #[arg(short, long)]
    pub description: Option<String>,
    /// YYYY-MM-DD
    #[arg(long)]
    pub due: Option<String>,
    #[arg(short, long)]
    pub priority: Option<i64>,
    /// Comma-separated
    #[arg(short, long)]
    pub tags: Option<String>,
    /// Quick-add rules: a due date is required
    #[arg(long)]
    pub quick: bool,
    /// Push to the calendar after saving
    #[arg(long)]
    pub sync: bool,
}

#[derive(Args, Debug)]
pub struct EditArgs {
    pub id: TaskId,
    #[arg(long)]
    pub title: Option<String>,
    #[arg(short, long)]
    pub description: Option<String>,
    #[arg(long)]
    pub due: Option<String>,
    #[arg(short, long)]
    pub priority: Option<i64>,
    #[arg(short, long)]
    pub tags: Option<String>,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Substring of the tag field (case-sensitive)
    #[arg(short, long)]
    pub tag: Option<String>,
    #[arg(short, long, default_value_t = SortKey::DueDate)]
    pub sort: SortKey,
    /// Priority, then dated first, then due date, then title
    #[arg(long, conflicts_with = "sort")]
    pub default_sort: bool,
    #[arg(long)]
    pub hide_completed: bool,
    /// Re-sort the result by a table column
    #[arg(long)]
    pub column: Option<Column>,
    /// With --column: sort descending
    #[arg(long, requires = "column")]
    pub desc: bool,
    /// Replay header clicks in order; each click on a column flips its
    /// direction, starting descending
    #[arg(long = "click", value_name = "COLUMN", conflicts_with = "column")]
    pub clicks: Vec<Column>,
}

impl Cli {
    /// Environment defaults overridden by command-line flags.
    pub fn config(&self) -> ClientConfig {
        let mut config = ClientConfig::from_env();
        if let Some(db) = &self.db {
            config.database_path = Some(db.clone());
        }
        if let Some(credentials) = &self.credentials {
            config.credentials_path = credentials.clone();
        }
        if let Some(token) = &self.token {
            config.token_path = token.clone();
        }
        if let Some(calendar) = &self.calendar {
            config.calendar_id = calendar.clone();
        }
        config
    }

    pub fn log_filter(&self) -> &'static str {
        if self.verbose {
            "tasker=debug,tasker_client=debug,tasker_cli=debug"
        } else {
            "warn"
        }
    }
}
