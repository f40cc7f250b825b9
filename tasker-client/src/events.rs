//! Event callbacks for task and sync activity
//!
//! Events can be emitted from any thread, including tokio worker threads that
//! finish a calendar sync, but callbacks run only when [`EventDispatcher::process_events`]
//! is called, and only on the thread that registered the first callback.
//!
//! 1. `emit_*` pushes onto an mpsc queue and never blocks on callbacks
//! 2. The owning thread drains the queue with `process_events()`
//! 3. Calling `process_events()` from another thread is an error

use std::sync::{mpsc, Mutex};
use std::thread::{self, ThreadId};
use tasker_core::{TaskId, TaskerError, TaskerResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    TaskCreated,
    TaskUpdated,
    TaskDeleted,
    SyncStarted,
    SyncCompleted,
    SyncFailed,
}

/// Notification delivered to registered callbacks.
///
/// ```rust,no_run
/// use tasker_client::events::{EventDispatcher, TaskEvent};
///
/// let dispatcher = EventDispatcher::new();
/// dispatcher.register_callback(|event| match event {
///     TaskEvent::SyncFailed { task_id, credentials: true, .. } => {
///         eprintln!("Task {}: calendar credentials need attention", task_id);
///     }
///     other => println!("{:?}", other),
/// }).unwrap();
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskEvent {
    TaskCreated { task_id: TaskId, title: String },
    TaskUpdated { task_id: TaskId, title: String },
    TaskDeleted { task_id: TaskId },
    SyncStarted { task_id: TaskId },
    SyncCompleted { task_id: TaskId, event_id: String },
    SyncFailed {
        task_id: TaskId,
        message: String,
        /// Credentials were missing or rejected, as opposed to a remote failure.
        credentials: bool,
    },
}

impl TaskEvent {
    pub fn event_type(&self) -> EventType {
        match self {
            TaskEvent::TaskCreated { .. } => EventType::TaskCreated,
            TaskEvent::TaskUpdated { .. } => EventType::TaskUpdated,
            TaskEvent::TaskDeleted { .. } => EventType::TaskDeleted,
            TaskEvent::SyncStarted { .. } => EventType::SyncStarted,
            TaskEvent::SyncCompleted { .. } => EventType::SyncCompleted,
            TaskEvent::SyncFailed { .. } => EventType::SyncFailed,
        }
    }

    pub fn task_id(&self) -> TaskId {
        match self {
            TaskEvent::TaskCreated { task_id, .. }
            | TaskEvent::TaskUpdated { task_id, .. }
            | TaskEvent::TaskDeleted { task_id }
            | TaskEvent::SyncStarted { task_id }
            | TaskEvent::SyncCompleted { task_id, .. }
            | TaskEvent::SyncFailed { task_id, .. } => *task_id,
        }
    }
}

struct CallbackEntry {
    callback: Box<dyn Fn(TaskEvent) + Send>,
    event_filter: Option<EventType>,
}

pub struct EventDispatcher {
    callbacks: Mutex<Vec<CallbackEntry>>,
    event_queue: Mutex<mpsc::Receiver<TaskEvent>>,
    event_sender: Mutex<mpsc::Sender<TaskEvent>>,
    callback_thread_id: Mutex<Option<ThreadId>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            callbacks: Mutex::new(Vec::new()),
            event_queue: Mutex::new(receiver),
            event_sender: Mutex::new(sender),
            callback_thread_id: Mutex::new(None),
        }
    }

    fn ensure_callback_thread(&self) -> TaskerResult<()> {
        let mut thread_id = self
            .callback_thread_id
            .lock()
            .map_err(|_| TaskerError::LockError("thread ID".into()))?;
        if thread_id.is_none() {
            *thread_id = Some(thread::current().id());
            tracing::debug!(
                "EVENTS: Callbacks will be processed on thread {:?}",
                thread::current().id()
            );
        }
        Ok(())
    }

    /// Register a callback for every event. The first registration pins the
    /// callback thread.
    pub fn register_callback<F>(&self, callback: F) -> TaskerResult<()>
    where
        F: Fn(TaskEvent) + Send + 'static,
    {
        self.push_callback(Box::new(callback), None)
    }

    /// Register a callback that only sees events of `event_filter`.
    pub fn register_callback_filtered<F>(
        &self,
        callback: F,
        event_filter: EventType,
    ) -> TaskerResult<()>
    where
        F: Fn(TaskEvent) + Send + 'static,
    {
        self.push_callback(Box::new(callback), Some(event_filter))
    }

    fn push_callback(
        &self,
        callback: Box<dyn Fn(TaskEvent) + Send>,
        event_filter: Option<EventType>,
    ) -> TaskerResult<()> {
        self.ensure_callback_thread()?;

        let mut callbacks = self
            .callbacks
            .lock()
            .map_err(|_| TaskerError::LockError("callbacks".into()))?;
        callbacks.push(CallbackEntry {
            callback,
            event_filter,
        });
        Ok(())
    }

    /// Queue an event. Safe from any thread; dropped silently if the queue is gone.
    pub fn emit(&self, event: TaskEvent) {
        match self.event_sender.lock() {
            Ok(sender) => {
                if sender.send(event).is_err() {
                    tracing::warn!("EVENTS: Event queue closed, dropping event");
                }
            }
            Err(_) => tracing::warn!("EVENTS: Event sender lock poisoned, dropping event"),
        }
    }

    pub fn emit_task_created(&self, task_id: TaskId, title: &str) {
        self.emit(TaskEvent::TaskCreated {
            task_id,
            title: title.to_string(),
        });
    }

    pub fn emit_task_updated(&self, task_id: TaskId, title: &str) {
        self.emit(TaskEvent::TaskUpdated {
            task_id,
            title: title.to_string(),
        });
    }

    pub fn emit_task_deleted(&self, task_id: TaskId) {
        self.emit(TaskEvent::TaskDeleted { task_id });
    }

    pub fn emit_sync_started(&self, task_id: TaskId) {
        self.emit(TaskEvent::SyncStarted { task_id });
    }

    pub fn emit_sync_completed(&self, task_id: TaskId, event_id: &str) {
        self.emit(TaskEvent::SyncCompleted {
            task_id,
            event_id: event_id.to_string(),
        });
    }

    pub fn emit_sync_failed(&self, task_id: TaskId, error: &TaskerError) {
        self.emit(TaskEvent::SyncFailed {
            task_id,
            message: error.to_string(),
            credentials: error.is_credentials(),
        });
    }

    /// Drain the queue into the registered callbacks. Must be called on the
    /// thread that registered them. Returns the number of events drained.
    pub fn process_events(&self) -> TaskerResult<usize> {
        {
            let thread_id = self
                .callback_thread_id
                .lock()
                .map_err(|_| TaskerError::LockError("thread ID".into()))?;
            match *thread_id {
                Some(expected) if thread::current().id() != expected => {
                    return Err(TaskerError::ThreadSafetyViolation);
                }
                Some(_) => {}
                None => return Err(TaskerError::NoCallbacksRegistered),
            }
        }

        let callbacks = self
            .callbacks
            .lock()
            .map_err(|_| TaskerError::LockError("callbacks".into()))?;
        let receiver = self
            .event_queue
            .lock()
            .map_err(|_| TaskerError::LockError("event queue".into()))?;

        let mut processed_count = 0;
        while let Ok(event) = receiver.try_recv() {
            let event_type = event.event_type();
            for entry in callbacks.iter() {
                if entry.event_filter.is_some_and(|filter| filter != event_type) {
                    continue;
                }
                (entry.callback)(event.clone());
            }
            processed_count += 1;
        }

        Ok(processed_count)
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_process_without_callbacks() {
        let dispatcher = EventDispatcher::new();
        dispatcher.emit_task_deleted(1);
        assert!(matches!(
            dispatcher.process_events(),
            Err(TaskerError::NoCallbacksRegistered)
        ));
    }

    #[test]
    fn test_callbacks_receive_events_in_order() {
        let dispatcher = EventDispatcher::new();
        let seen = Arc::new(Mutex::new(Vec::<String>::new()));
        let seen_clone = seen.clone();

        dispatcher
            .register_callback(move |event| {
                let desc = match &event {
                    TaskEvent::TaskCreated { title, .. } => format!("created:{}", title),
                    TaskEvent::SyncCompleted { event_id, .. } => format!("synced:{}", event_id),
                    other => format!("other:{:?}", other.event_type()),
                };
                seen_clone.lock().unwrap().push(desc);
            })
            .unwrap();

        dispatcher.emit_task_created(7, "Buy milk");
        dispatcher.emit_sync_started(7);
        dispatcher.emit_sync_completed(7, "evt123");

        assert_eq!(dispatcher.process_events().unwrap(), 3);
        assert_eq!(
            *seen.lock().unwrap(),
            vec!["created:Buy milk", "other:SyncStarted", "synced:evt123"]
        );
        assert_eq!(dispatcher.process_events().unwrap(), 0);
    }

    #[test]
    fn test_filtered_callback() {
        let dispatcher = EventDispatcher::new();
        let failures = Arc::new(AtomicUsize::new(0));
        let failures_clone = failures.clone();

        dispatcher
            .register_callback_filtered(
                move |event| {
                    assert_eq!(event.event_type(), EventType::SyncFailed);
                    failures_clone.fetch_add(1, Ordering::SeqCst);
                },
                EventType::SyncFailed,
            )
            .unwrap();

        let err = TaskerError::Sync(tasker_core::SyncError::Credentials("no token".into()));
        dispatcher.emit_task_updated(3, "Call mum");
        dispatcher.emit_sync_failed(3, &err);

        assert_eq!(dispatcher.process_events().unwrap(), 2);
        assert_eq!(failures.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_emit_from_other_thread_process_on_owner() {
        let dispatcher = Arc::new(EventDispatcher::new());
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        dispatcher
            .register_callback(move |_| {
                count_clone.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        let remote = dispatcher.clone();
        std::thread::spawn(move || {
            remote.emit_task_deleted(9);
            assert!(matches!(
                remote.process_events(),
                Err(TaskerError::ThreadSafetyViolation)
            ));
        })
        .join()
        .unwrap();

        assert_eq!(dispatcher.process_events().unwrap(), 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
