use crate::calendar::{CalendarApi, EventPayload, PayloadOptions, RemoteEvent};
use crate::config::ClientConfig;
use crate::mapping::SyncMappingStore;
use chrono::{DateTime, Local};
use std::sync::Arc;
use tasker_core::{Task, TaskId, TaskerResult};
use tokio::task::JoinHandle;

/// Pushes tasks to a remote calendar and remembers which event each task became.
#[derive(Clone)]
pub struct CalendarSync {
    api: Arc<dyn CalendarApi>,
    mappings: SyncMappingStore,
    calendar_id: String,
    options: PayloadOptions,
}

impl CalendarSync {
    pub fn new(
        api: Arc<dyn CalendarApi>,
        mappings: SyncMappingStore,
        config: &ClientConfig,
    ) -> Self {
        Self {
            api,
            mappings,
            calendar_id: config.calendar_id.clone(),
            options: PayloadOptions::from(config),
        }
    }

    pub fn calendar_id(&self) -> &str {
        &self.calendar_id
    }

    pub fn payload_for(&self, task: &Task, now: DateTime<Local>) -> EventPayload {
        EventPayload::for_task(task, &self.options, now)
    }

    /// Create or update the remote event for `task` and return its id.
    pub async fn sync(&self, task: &Task) -> TaskerResult<String> {
        self.sync_at(task, Local::now()).await
    }

    /// [`sync`](Self::sync) with an explicit clock for undated tasks.
    ///
    /// A mapped task is patched; any patch failure falls back to creating a
    /// fresh event. The mapping is written only after a remote call succeeds.
    pub async fn sync_at(&self, task: &Task, now: DateTime<Local>) -> TaskerResult<String> {
        self.api.ensure_authorized().await?;

        let payload = self.payload_for(task, now);
        let event = match self.mappings.get(task.id).await? {
            Some(event_id) => {
                match self
                    .api
                    .patch_event(&self.calendar_id, &event_id, &payload)
                    .await
                {
                    Ok(event) => event,
                    Err(e) => {
                        tracing::warn!(
                            "SYNC: Patch of event {} for task {} failed ({}), creating a new event",
                            event_id,
                            task.id,
                            e
                        );
                        self.api.insert_event(&self.calendar_id, &payload).await?
                    }
                }
            }
            None => self.api.insert_event(&self.calendar_id, &payload).await?,
        };

        self.mappings.set(task.id, &event.id).await?;
        tracing::info!("SYNC: Task {} synced to event {}", task.id, event.id);
        Ok(event.id)
    }

    /// Run [`sync`](Self::sync) on the tokio runtime and hand the outcome to
    /// `on_complete`. Concurrent syncs of one task are not serialised; the
    /// last to finish owns the mapping.
    pub fn spawn_sync<F>(&self, task: Task, on_complete: F) -> JoinHandle<()>
    where
        F: FnOnce(TaskId, TaskerResult<String>) + Send + 'static,
    {
        let sync = self.clone();
        tokio::spawn(async move {
            let result = sync.sync(&task).await;
            if let Err(e) = &result {
                tracing::error!("SYNC: Task {} failed to sync: {}", task.id, e);
            }
            on_complete(task.id, result);
        })
    }

    /// The remote event currently mapped to `task_id`, if both exist.
    pub async fn remote_event(&self, task_id: TaskId) -> TaskerResult<Option<RemoteEvent>> {
        let Some(event_id) = self.mappings.get(task_id).await? else {
            return Ok(None);
        };
        self.api.ensure_authorized().await?;
        Ok(self.api.get_event(&self.calendar_id, &event_id).await?)
    }
}
