pub mod calendar;
pub mod client;
pub mod config;
pub mod database;
pub mod events;
pub mod mapping;
pub mod queries;
pub mod sync;

pub use calendar::{CalendarApi, CalendarError, EventPayload, RemoteEvent};
pub use client::Client;
pub use config::ClientConfig;
pub use database::TaskStore;
pub use events::{EventDispatcher, EventType, TaskEvent};
pub use mapping::SyncMappingStore;
pub use sync::CalendarSync;
