use crate::models::TaskId;
use thiserror::Error;

pub type TaskerResult<T> = Result<T, TaskerError>;

#[derive(Error, Debug)]
pub enum TaskerError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Calendar sync failed: {0}")]
    Sync(#[from] SyncError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Task {0} not found")]
    TaskNotFound(TaskId),

    #[error("Corrupt record for task {id}: {reason}")]
    CorruptRecord { id: TaskId, reason: String },

    #[error("Failed to acquire lock: {0}")]
    LockError(String),

    #[error("Thread safety violation: process_events() must be called on the registration thread")]
    ThreadSafetyViolation,

    #[error("No callbacks registered yet")]
    NoCallbacksRegistered,
}

impl TaskerError {
    /// True when the failure came from acquiring or refreshing calendar credentials.
    pub fn is_credentials(&self) -> bool {
        matches!(self, TaskerError::Sync(e) if e.is_credentials())
    }
}

/// Rejections raised by the presentation layer before anything reaches the store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Task title must not be empty")]
    EmptyTitle,

    #[error("A due date is required")]
    MissingDueDate,

    #[error("Priority {value} is outside the allowed range {min}..={max}")]
    PriorityOutOfRange { value: i64, min: i64, max: i64 },

    #[error("Invalid due date '{0}', expected YYYY-MM-DD")]
    InvalidDueDate(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("Calendar credentials unavailable: {0}")]
    Credentials(String),

    #[error("Calendar API returned HTTP {status}: {message}")]
    Remote { status: u16, message: String },

    #[error("Calendar request failed: {0}")]
    Transport(String),

    #[error("Sync task aborted: {0}")]
    Aborted(String),
}

impl SyncError {
    pub fn is_credentials(&self) -> bool {
        matches!(self, SyncError::Credentials(_))
    }
}
