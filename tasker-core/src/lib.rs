pub mod errors;
pub mod models;
pub mod ordering;
pub mod validation;

pub use errors::{SyncError, TaskerError, TaskerResult, ValidationError};
pub use models::{Column, SortKey, Task, TaskDraft, TaskId};
