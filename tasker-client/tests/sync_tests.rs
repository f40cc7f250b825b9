mod common;

use chrono::{Local, TimeZone, Timelike};
use common::{make_draft, setup_test_db, Call, FakeCalendar};
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use tasker_client::{CalendarSync, Client, ClientConfig, EventType, TaskEvent, TaskStore};
use tasker_core::{SyncError, TaskerError};

async fn setup_sync() -> (TaskStore, Arc<FakeCalendar>, CalendarSync) {
    let store = setup_test_db().await;
    let fake = Arc::new(FakeCalendar::default());
    let sync = CalendarSync::new(fake.clone(), store.mappings(), &ClientConfig::in_memory());
    (store, fake, sync)
}

#[tokio::test]
async fn test_first_sync_creates_then_second_patches() {
    let (store, fake, sync) = setup_sync().await;
    let id = store
        .create(&make_draft("Dentist", 2, Some("2024-03-10"), "health"))
        .await
        .unwrap();
    let task = store.get(id).await.unwrap().unwrap();

    let event_id = sync.sync(&task).await.unwrap();
    assert_eq!(event_id, "evt-1");
    assert_eq!(store.mappings().get(id).await.unwrap().as_deref(), Some("evt-1"));

    let again = sync.sync(&task).await.unwrap();
    assert_eq!(again, "evt-1");

    let calls = fake.remote_calls();
    assert_eq!(calls.len(), 2);
    assert!(matches!(&calls[0], Call::Insert(_)));
    match &calls[1] {
        Call::Patch(target, payload) => {
            assert_eq!(target, "evt-1");
            assert_eq!(payload.summary, "[Task] Dentist");
            assert_eq!(payload.start.date.as_deref(), Some("2024-03-10"));
            assert_eq!(payload.end.date.as_deref(), Some("2024-03-11"));
        }
        other => panic!("expected a patch, got {:?}", other),
    }
}

#[tokio::test]
async fn test_failed_patch_falls_back_to_create_and_overwrites_mapping() {
    let (store, fake, sync) = setup_sync().await;
    let id = store.create(&make_draft("Renew lease", 4, None, "")).await.unwrap();
    let task = store.get(id).await.unwrap().unwrap();

    store.mappings().set(id, "evt-deleted-remotely").await.unwrap();
    fake.fail_patch.store(true, Ordering::SeqCst);

    let event_id = sync.sync(&task).await.unwrap();
    assert_eq!(event_id, "evt-1");
    assert_eq!(store.mappings().get(id).await.unwrap().as_deref(), Some("evt-1"));

    let calls = fake.remote_calls();
    assert!(matches!(&calls[0], Call::Patch(target, _) if target == "evt-deleted-remotely"));
    assert!(matches!(&calls[1], Call::Insert(_)));
}

#[tokio::test]
async fn test_credential_failure_is_distinct_and_touches_nothing() {
    let (store, fake, sync) = setup_sync().await;
    let id = store.create(&make_draft("Gym", 1, None, "")).await.unwrap();
    let task = store.get(id).await.unwrap().unwrap();
    fake.deny_auth.store(true, Ordering::SeqCst);

    let err = sync.sync(&task).await.unwrap_err();
    assert!(err.is_credentials());
    assert!(fake.remote_calls().is_empty());
    assert_eq!(store.mappings().get(id).await.unwrap(), None);
}

#[tokio::test]
async fn test_create_failure_after_patch_failure_propagates() {
    let (store, fake, sync) = setup_sync().await;
    let id = store.create(&make_draft("Taxes", 5, Some("2024-04-15"), "")).await.unwrap();
    let task = store.get(id).await.unwrap().unwrap();
    store.mappings().set(id, "evt-old").await.unwrap();
    fake.fail_patch.store(true, Ordering::SeqCst);
    fake.fail_insert.store(true, Ordering::SeqCst);

    let err = sync.sync(&task).await.unwrap_err();
    assert!(matches!(
        err,
        TaskerError::Sync(SyncError::Remote { status: 503, .. })
    ));
    assert!(!err.is_credentials());
    // Mapping only changes after a successful remote call
    assert_eq!(store.mappings().get(id).await.unwrap().as_deref(), Some("evt-old"));
}

#[tokio::test]
async fn test_undated_task_gets_evening_event() {
    let (store, fake, sync) = setup_sync().await;
    let id = store.create(&make_draft("Call mum", 0, None, "family")).await.unwrap();
    let task = store.get(id).await.unwrap().unwrap();

    let now = Local.with_ymd_and_hms(2024, 10, 2, 8, 0, 0).unwrap();
    sync.sync_at(&task, now).await.unwrap();

    let calls = fake.remote_calls();
    let Call::Insert(payload) = &calls[0] else {
        panic!("expected an insert, got {:?}", calls[0]);
    };
    assert_eq!(payload.description, "\n\nTags: family");
    let start = chrono::DateTime::parse_from_rfc3339(payload.start.date_time.as_deref().unwrap())
        .unwrap()
        .with_timezone(&Local);
    assert_eq!(start.date_naive(), now.date_naive());
    assert_eq!(start.hour(), 18);
}

#[tokio::test]
async fn test_spawn_sync_delivers_result_to_handler() {
    let (store, _fake, sync) = setup_sync().await;
    let id = store.create(&make_draft("Water plants", 1, None, "")).await.unwrap();
    let task = store.get(id).await.unwrap().unwrap();

    let (tx, rx) = tokio::sync::oneshot::channel();
    let handle = sync.spawn_sync(task, move |task_id, result| {
        let _ = tx.send((task_id, result));
    });
    handle.await.unwrap();

    let (task_id, result) = rx.await.unwrap();
    assert_eq!(task_id, id);
    assert_eq!(result.unwrap(), "evt-1");
}

#[tokio::test]
async fn test_remote_event_lookup() {
    let (store, _fake, sync) = setup_sync().await;
    let id = store.create(&make_draft("Lunch", 0, Some("2024-02-02"), "")).await.unwrap();
    let task = store.get(id).await.unwrap().unwrap();

    assert!(sync.remote_event(id).await.unwrap().is_none());

    sync.sync(&task).await.unwrap();
    let event = sync.remote_event(id).await.unwrap().unwrap();
    assert_eq!(event.id, "evt-1");
    assert_eq!(event.summary.as_deref(), Some("[Task] Lunch"));
}

#[tokio::test]
async fn test_client_reports_events_on_owner_thread() {
    let fake = Arc::new(FakeCalendar::default());
    let config = ClientConfig::in_memory();
    let client = Client::new(&config).await.unwrap().with_calendar(fake.clone(), &config);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = seen.clone();
    client
        .event_dispatcher()
        .register_callback(move |event| seen_clone.lock().unwrap().push(event))
        .unwrap();

    let task = client
        .create_task(&make_draft("Pick up parcel", 3, Some("2024-08-08"), ""))
        .await
        .unwrap();
    let event_id = client.sync_task(task.id).await.unwrap();
    fake.deny_auth.store(true, Ordering::SeqCst);
    assert!(client.sync_task(task.id).await.unwrap_err().is_credentials());

    assert_eq!(client.event_dispatcher().process_events().unwrap(), 5);
    let seen = seen.lock().unwrap();
    let types: Vec<EventType> = seen.iter().map(TaskEvent::event_type).collect();
    assert_eq!(
        types,
        vec![
            EventType::TaskCreated,
            EventType::SyncStarted,
            EventType::SyncCompleted,
            EventType::SyncStarted,
            EventType::SyncFailed,
        ]
    );
    assert_eq!(
        seen[2],
        TaskEvent::SyncCompleted {
            task_id: task.id,
            event_id
        }
    );
    assert!(matches!(
        seen[4],
        TaskEvent::SyncFailed {
            credentials: true,
            ..
        }
    ));
}

#[tokio::test]
async fn test_client_edge_cases() {
    let config = ClientConfig::in_memory();
    let client = Client::new(&config).await.unwrap();

    assert!(matches!(
        client.update_task(404, &make_draft("x", 0, None, ""), false).await,
        Err(TaskerError::TaskNotFound(404))
    ));
    assert!(matches!(
        client.toggle_completed(404).await,
        Err(TaskerError::TaskNotFound(404))
    ));

    let task = client.create_task(&make_draft("No calendar", 0, None, "")).await.unwrap();
    assert!(matches!(
        client.sync_task(task.id).await,
        Err(TaskerError::Config(_))
    ));

    let (tx, rx) = tokio::sync::oneshot::channel();
    let client = client.with_calendar(Arc::new(FakeCalendar::default()), &config);
    let handle = client
        .spawn_sync_task(task.id, move |_, result| {
            let _ = tx.send(result);
        })
        .await
        .unwrap();
    handle.await.unwrap();
    assert_eq!(rx.await.unwrap().unwrap(), "evt-1");
    assert!(client.remote_event(task.id).await.unwrap().is_some());
}
