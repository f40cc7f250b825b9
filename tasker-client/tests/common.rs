#![allow(dead_code)]

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use tasker_client::calendar::{CalendarApi, CalendarError, EventPayload, RemoteEvent};
use tasker_client::TaskStore;
use tasker_core::TaskDraft;

pub async fn setup_test_db() -> TaskStore {
    let store = TaskStore::new("sqlite::memory:").await.unwrap();
    store.run_migrations().await.unwrap();
    store
}

pub fn make_draft(title: &str, priority: i64, due: Option<&str>, tags: &str) -> TaskDraft {
    TaskDraft::new(title)
        .with_priority(priority)
        .with_due_date(due.map(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").unwrap()))
        .with_tags(tags)
}

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Authorize,
    Insert(EventPayload),
    Patch(String, EventPayload),
    Get(String),
}

/// In-memory calendar that records every call.
#[derive(Default)]
pub struct FakeCalendar {
    pub calls: Mutex<Vec<Call>>,
    pub fail_patch: AtomicBool,
    pub fail_insert: AtomicBool,
    pub deny_auth: AtomicBool,
    next_id: AtomicUsize,
    events: Mutex<HashMap<String, RemoteEvent>>,
}

impl FakeCalendar {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn remote_calls(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| *c != Call::Authorize)
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn store_event(&self, id: String, payload: &EventPayload) -> RemoteEvent {
        let event = RemoteEvent {
            id: id.clone(),
            summary: Some(payload.summary.clone()),
            description: Some(payload.description.clone()),
            status: Some("confirmed".into()),
            start: Some(payload.start.clone()),
            end: Some(payload.end.clone()),
            html_link: None,
        };
        self.events.lock().unwrap().insert(id, event.clone());
        event
    }
}

#[async_trait]
impl CalendarApi for FakeCalendar {
    async fn ensure_authorized(&self) -> Result<(), CalendarError> {
        self.record(Call::Authorize);
        if self.deny_auth.load(Ordering::SeqCst) {
            return Err(CalendarError::Credentials("token revoked".into()));
        }
        Ok(())
    }

    async fn insert_event(
        &self,
        _calendar_id: &str,
        payload: &EventPayload,
    ) -> Result<RemoteEvent, CalendarError> {
        self.record(Call::Insert(payload.clone()));
        if self.fail_insert.load(Ordering::SeqCst) {
            return Err(CalendarError::Http {
                status: 503,
                message: "Backend Error".into(),
            });
        }
        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(self.store_event(format!("evt-{}", n), payload))
    }

    async fn patch_event(
        &self,
        _calendar_id: &str,
        event_id: &str,
        payload: &EventPayload,
    ) -> Result<RemoteEvent, CalendarError> {
        self.record(Call::Patch(event_id.to_string(), payload.clone()));
        if self.fail_patch.load(Ordering::SeqCst) {
            return Err(CalendarError::Http {
                status: 404,
                message: "Not Found".into(),
            });
        }
        Ok(self.store_event(event_id.to_string(), payload))
    }

    async fn get_event(
        &self,
        _calendar_id: &str,
        event_id: &str,
    ) -> Result<Option<RemoteEvent>, CalendarError> {
        self.record(Call::Get(event_id.to_string()));
        Ok(self.events.lock().unwrap().get(event_id).cloned())
    }
}
