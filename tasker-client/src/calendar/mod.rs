//! Remote calendar collaborator.
//!
//! [`CalendarApi`] is the seam the sync adapter talks to. [`google::GoogleCalendar`]
//! implements it over the Google Calendar v3 REST API, authorised through
//! [`auth::OAuthTokenProvider`].

pub mod auth;
pub mod google;
pub mod payload;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tasker_core::{SyncError, TaskerError};
use thiserror::Error;

pub use payload::{EventPayload, EventTime, PayloadOptions};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CalendarError {
    #[error("credentials unavailable: {0}")]
    Credentials(String),

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("request failed: {0}")]
    Transport(String),

    #[error("unexpected response: {0}")]
    Decode(String),
}

impl CalendarError {
    /// 404 and 410 both mean the event is gone.
    pub fn is_not_found(&self) -> bool {
        matches!(self, CalendarError::Http { status: 404 | 410, .. })
    }
}

impl From<CalendarError> for SyncError {
    fn from(err: CalendarError) -> Self {
        match err {
            CalendarError::Credentials(msg) => SyncError::Credentials(msg),
            CalendarError::Http { status, message } => SyncError::Remote { status, message },
            CalendarError::Transport(msg) => SyncError::Transport(msg),
            CalendarError::Decode(msg) => {
                SyncError::Transport(format!("unexpected response: {}", msg))
            }
        }
    }
}

impl From<CalendarError> for TaskerError {
    fn from(err: CalendarError) -> Self {
        TaskerError::Sync(err.into())
    }
}

/// An event as returned by the calendar service. Only the fields the client reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEvent {
    pub id: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub start: Option<EventTime>,
    #[serde(default)]
    pub end: Option<EventTime>,
    #[serde(rename = "htmlLink", default)]
    pub html_link: Option<String>,
}

/// Operations the sync adapter needs from a calendar service, scoped by calendar id.
#[async_trait]
pub trait CalendarApi: Send + Sync {
    /// Make sure usable credentials exist, running any refresh or
    /// interactive authorisation needed.
    async fn ensure_authorized(&self) -> Result<(), CalendarError>;

    async fn insert_event(
        &self,
        calendar_id: &str,
        payload: &EventPayload,
    ) -> Result<RemoteEvent, CalendarError>;

    async fn patch_event(
        &self,
        calendar_id: &str,
        event_id: &str,
        payload: &EventPayload,
    ) -> Result<RemoteEvent, CalendarError>;

    /// `None` when the event no longer exists.
    async fn get_event(
        &self,
        calendar_id: &str,
        event_id: &str,
    ) -> Result<Option<RemoteEvent>, CalendarError>;
}
