//! Tasker - single-user task manager with calendar sync
//!
//! This crate provides a unified API over the task store, the ordering and
//! validation rules, and the calendar sync adapter.
//!
//! # Example
//!
//! ```ignore
//! use tasker::{Client, ClientConfig, TaskDraft};
//!
//! let config = ClientConfig::from_env();
//! let client = Client::new(&config).await?;
//! let task = client.create_task(&TaskDraft::new("Pay rent").with_priority(3)).await?;
//! ```

// Re-export client types
pub use tasker_client::calendar::auth::AuthPrompt;
pub use tasker_client::{
    CalendarApi, CalendarError, CalendarSync, Client, ClientConfig, EventDispatcher, EventType,
    RemoteEvent, SyncMappingStore, TaskEvent, TaskStore,
};

// Re-export core types that front ends need
pub use tasker_core::ordering::{default_order, sort_by_column, ColumnSortState};
pub use tasker_core::validation::ValidationPolicy;
pub use tasker_core::{
    Column, SortKey, SyncError, Task, TaskDraft, TaskId, TaskerError, TaskerResult,
    ValidationError,
};
