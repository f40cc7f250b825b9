use crate::calendar::auth::AuthPrompt;
use crate::calendar::google::GoogleCalendar;
use crate::calendar::{CalendarApi, RemoteEvent};
use crate::config::ClientConfig;
use crate::database::TaskStore;
use crate::events::EventDispatcher;
use crate::sync::CalendarSync;
use std::sync::Arc;
use tasker_core::{SortKey, Task, TaskDraft, TaskId, TaskerError, TaskerResult};
use tokio::task::JoinHandle;

/// Entry point for front ends: the task store, optional calendar sync, and
/// an event dispatcher that reports both.
pub struct Client {
    store: TaskStore,
    calendar: Option<CalendarSync>,
    event_dispatcher: Arc<EventDispatcher>,
}

impl Client {
    /// Open (and migrate) the configured store. Calendar sync stays off until
    /// [`with_calendar`](Self::with_calendar) is called.
    pub async fn new(config: &ClientConfig) -> TaskerResult<Self> {
        let store = TaskStore::open(config).await?;
        Ok(Self {
            store,
            calendar: None,
            event_dispatcher: Arc::new(EventDispatcher::new()),
        })
    }

    /// Open the store and attach Google Calendar with OAuth from the configured files.
    pub async fn connect(
        config: &ClientConfig,
        prompt: Arc<dyn AuthPrompt>,
    ) -> TaskerResult<Self> {
        let api = Arc::new(GoogleCalendar::from_config(config, prompt));
        Ok(Self::new(config).await?.with_calendar(api, config))
    }

    pub fn with_calendar(mut self, api: Arc<dyn CalendarApi>, config: &ClientConfig) -> Self {
        self.calendar = Some(CalendarSync::new(api, self.store.mappings(), config));
        self
    }

    pub fn event_dispatcher(&self) -> Arc<EventDispatcher> {
        self.event_dispatcher.clone()
    }

    pub fn store(&self) -> &TaskStore {
        &self.store
    }

    fn calendar(&self) -> TaskerResult<&CalendarSync> {
        self.calendar
            .as_ref()
            .ok_or_else(|| TaskerError::Config("calendar sync is not configured".into()))
    }

    async fn require_task(&self, id: TaskId) -> TaskerResult<Task> {
        self.store
            .get(id)
            .await?
            .ok_or(TaskerError::TaskNotFound(id))
    }

    pub async fn create_task(&self, draft: &TaskDraft) -> TaskerResult<Task> {
        let id = self.store.create(draft).await?;
        let task = self.require_task(id).await?;
        self.event_dispatcher.emit_task_created(id, &task.title);
        Ok(task)
    }

    /// Replace the task's fields. Unlike the store, a missing id is an error here.
    pub async fn update_task(
        &self,
        id: TaskId,
        draft: &TaskDraft,
        completed: bool,
    ) -> TaskerResult<Task> {
        if self.store.update(id, draft, completed).await? == 0 {
            return Err(TaskerError::TaskNotFound(id));
        }
        let task = self.require_task(id).await?;
        self.event_dispatcher.emit_task_updated(id, &task.title);
        Ok(task)
    }

    pub async fn toggle_completed(&self, id: TaskId) -> TaskerResult<bool> {
        let completed = self
            .store
            .toggle_completed(id)
            .await?
            .ok_or(TaskerError::TaskNotFound(id))?;
        if let Some(task) = self.store.get(id).await? {
            self.event_dispatcher.emit_task_updated(id, &task.title);
        }
        Ok(completed)
    }

    pub async fn delete_task(&self, id: TaskId) -> TaskerResult<()> {
        self.store.delete(id).await?;
        self.event_dispatcher.emit_task_deleted(id);
        Ok(())
    }

    pub async fn get_task(&self, id: TaskId) -> TaskerResult<Option<Task>> {
        self.store.get(id).await
    }

    pub async fn list_tasks(
        &self,
        filter_tag: Option<&str>,
        show_completed: bool,
        sort_by: SortKey,
    ) -> TaskerResult<Vec<Task>> {
        self.store.list(filter_tag, show_completed, sort_by).await
    }

    pub async fn list_default_sorted(&self, filter_tag: Option<&str>) -> TaskerResult<Vec<Task>> {
        self.store.list_default_sorted(filter_tag).await
    }

    /// Push task `id` to the calendar and wait for the result.
    pub async fn sync_task(&self, id: TaskId) -> TaskerResult<String> {
        let calendar = self.calendar()?;
        let task = self.require_task(id).await?;

        self.event_dispatcher.emit_sync_started(id);
        let result = calendar.sync(&task).await;
        report_sync(&self.event_dispatcher, id, &result);
        result
    }

    /// Push task `id` in the background. `on_complete` runs on a runtime
    /// worker once the remote calls finish; events are queued for the
    /// dispatcher as well.
    pub async fn spawn_sync_task<F>(
        &self,
        id: TaskId,
        on_complete: F,
    ) -> TaskerResult<JoinHandle<()>>
    where
        F: FnOnce(TaskId, TaskerResult<String>) + Send + 'static,
    {
        let calendar = self.calendar()?;
        let task = self.require_task(id).await?;

        self.event_dispatcher.emit_sync_started(id);
        let dispatcher = self.event_dispatcher.clone();
        Ok(calendar.spawn_sync(task, move |task_id, result| {
            report_sync(&dispatcher, task_id, &result);
            on_complete(task_id, result);
        }))
    }

    pub async fn remote_event(&self, id: TaskId) -> TaskerResult<Option<RemoteEvent>> {
        self.calendar()?.remote_event(id).await
    }
}

fn report_sync(dispatcher: &EventDispatcher, id: TaskId, result: &TaskerResult<String>) {
    match result {
        Ok(event_id) => dispatcher.emit_sync_completed(id, event_id),
        Err(e) => dispatcher.emit_sync_failed(id, e),
    }
}
