//! Message store behaviour across every persistence strategy.

use chatlog_store::{
    AdapterState, BlobAdapter, Durability, Emotion, FileKeyValueStore, IndexedAdapter,
    KeyValueStore, Message, MessageAdapter, MessageStore, ObjectStoreAdapter, StoreError,
    StoreEvent,
};
use chatlog_test_utils::{AdapterCall, ScriptedAdapter, at, sample_message};
use pretty_assertions::assert_eq;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

/// Builds a fresh adapter over the same on-disk location, as a new session would.
type Reopen = Box<dyn Fn() -> Arc<dyn MessageAdapter>>;

fn strategies(root: &Path) -> Vec<(&'static str, Reopen)> {
    let sqlite = root.join("object").join("messages.sqlite");
    let indexed = root.join("indexed");
    let blob = root.join("blob");
    vec![
        (
            "object_store",
            Box::new(move || Arc::new(ObjectStoreAdapter::new(&sqlite)) as Arc<dyn MessageAdapter>),
        ),
        (
            "indexed",
            Box::new(move || {
                Arc::new(IndexedAdapter::new(
                    Arc::new(FileKeyValueStore::new(&indexed)),
                    "messages",
                )) as Arc<dyn MessageAdapter>
            }),
        ),
        (
            "blob",
            Box::new(move || {
                Arc::new(BlobAdapter::new(
                    Arc::new(FileKeyValueStore::new(&blob)),
                    "messages",
                )) as Arc<dyn MessageAdapter>
            }),
        ),
    ]
}

fn full_message() -> Message {
    Message {
        id: 42,
        text: "voice note".to_string(),
        source: "user".to_string(),
        audio: Some(vec![1, 2, 3, 255]),
        emotions: Some(vec![Emotion::new("surprise", "&#128558;")]),
        timestamp: at("2024-03-10T08:15:30.250Z"),
        is_error: Some(false),
    }
}

#[tokio::test]
async fn appended_message_round_trips_through_a_new_session() {
    let temp = tempdir().expect("tempdir");
    for (name, reopen) in strategies(temp.path()) {
        let store = MessageStore::new(reopen());
        store.append(full_message()).await.expect(name);

        let fresh = MessageStore::new(reopen());
        assert_eq!(fresh.adapter_state(), AdapterState::Unopened, "{name}");
        let report = fresh.load().await.expect(name);
        assert_eq!(report.loaded, 1, "{name}");
        assert_eq!(fresh.messages(), vec![full_message()], "{name}");
        assert_eq!(fresh.adapter_state(), AdapterState::Open, "{name}");
    }
}

#[tokio::test]
async fn annotate_is_idempotent_in_storage() {
    let temp = tempdir().expect("tempdir");
    for (name, reopen) in strategies(temp.path()) {
        let store = MessageStore::new(reopen());
        store.append(sample_message(1));
        let emotions = vec![Emotion::new("joy", "😊")];
        store
            .annotate(1, emotions.clone())
            .expect("present")
            .await
            .expect(name);
        let once = reopen().fetch_all().await.expect(name).records;

        store
            .annotate(1, emotions)
            .expect("present")
            .await
            .expect(name);
        let twice = reopen().fetch_all().await.expect(name).records;
        assert_eq!(once, twice, "{name}");
    }
}

#[tokio::test]
async fn removal_is_terminal_and_repeatable() {
    let temp = tempdir().expect("tempdir");
    for (name, reopen) in strategies(temp.path()) {
        let store = MessageStore::new(reopen());
        store.append(sample_message(1));
        store.append(sample_message(2));
        store.remove_by_id(1).await.expect(name);
        store.remove_by_id(1).await.expect(name);

        let fresh = MessageStore::new(reopen());
        fresh.load().await.expect(name);
        let ids: Vec<i64> = fresh.messages().iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![2], "{name}");
    }
}

#[tokio::test]
async fn clear_empties_storage_and_mirror() {
    let temp = tempdir().expect("tempdir");
    for (name, reopen) in strategies(temp.path()) {
        let store = MessageStore::new(reopen());
        for id in 1..=3 {
            store.append(sample_message(id));
        }
        store.clear().await.expect(name);
        assert_eq!(store.len(), 0, "{name}");
        assert!(reopen().fetch_all().await.expect(name).records.is_empty(), "{name}");

        let fresh = MessageStore::new(reopen());
        fresh.load().await.expect(name);
        assert!(fresh.is_empty(), "{name}");
    }
}

#[tokio::test]
async fn append_then_annotate_keeps_text() {
    let store = MessageStore::new(Arc::new(ScriptedAdapter::new()));
    store.append(Message::text(1, "user", "hi", at("2024-01-01T00:00:00Z")));
    store.annotate(1, vec![Emotion::new("joy", "😊")]);

    let message = store.get(1).expect("message");
    assert_eq!(message.emotions, Some(vec![Emotion::new("joy", "😊")]));
    assert_eq!(message.text, "hi");
}

#[tokio::test]
async fn unknown_ids_leave_an_empty_store_unchanged() {
    let adapter = Arc::new(ScriptedAdapter::new());
    let store = MessageStore::new(adapter.clone());
    assert!(store.annotate(999, vec![Emotion::new("joy", "😊")]).is_none());
    store.remove_by_id(999).await.expect("remove");

    assert!(store.is_empty());
    assert!(adapter.fetch_all().await.expect("fetch").records.is_empty());
    assert_eq!(adapter.calls(), vec![AdapterCall::Delete(999), AdapterCall::FetchAll]);
}

#[tokio::test]
async fn malformed_records_are_skipped_on_load() {
    let temp = tempdir().expect("tempdir");
    let kv = Arc::new(FileKeyValueStore::new(temp.path()));
    let store = MessageStore::new(Arc::new(IndexedAdapter::new(kv.clone(), "messages")));
    for id in 1..=3 {
        store.append(sample_message(id));
    }
    store.flush().await.expect("flush");
    kv.set("messages_2", "{\"id\":2,\"text\":").expect("corrupt");

    let fresh = MessageStore::new(Arc::new(IndexedAdapter::new(kv, "messages")));
    let report = fresh.load().await.expect("load");
    let ids: Vec<i64> = fresh.messages().iter().map(|m| m.id).collect();
    assert_eq!(ids, vec![1, 3]);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].key, "messages_2");
}

#[tokio::test]
async fn mirror_survives_storage_outage() {
    let adapter = Arc::new(ScriptedAdapter::new());
    let store = MessageStore::new(adapter.clone());
    let mut events = store.subscribe();
    adapter.set_unavailable(true);

    let err = store.append(sample_message(1)).await.expect_err("outage");
    assert!(matches!(err, StoreError::StorageUnavailable(_)));
    assert_eq!(store.messages(), vec![sample_message(1)]);
    assert!(matches!(store.durability(), Durability::Degraded { .. }));

    let err = store.load().await.expect_err("outage");
    assert!(err.is_unavailable());
    assert_eq!(store.len(), 1);

    adapter.set_unavailable(false);
    store.append(sample_message(2)).await.expect("recovered");
    assert_eq!(store.durability(), Durability::Durable);

    let report = store.load().await.expect("load");
    assert_eq!(report.loaded, 1);
    assert_eq!(report.retained, 1);
    let ids: Vec<i64> = store.messages().iter().map(|m| m.id).collect();
    assert_eq!(ids, vec![2, 1]);

    let mut saw_failure = false;
    let mut saw_recovery = false;
    while let Ok(event) = events.try_recv() {
        match event {
            StoreEvent::PersistFailed { .. } => saw_failure = true,
            StoreEvent::DurabilityChanged(Durability::Durable) => saw_recovery = true,
            _ => {}
        }
    }
    assert!(saw_failure);
    assert!(saw_recovery);
}

fn ids(store: &MessageStore) -> Vec<i64> {
    store.messages().iter().map(|m| m.id).collect()
}

#[tokio::test]
async fn failed_annotation_survives_reload() {
    let adapter = Arc::new(ScriptedAdapter::new());
    let store = MessageStore::new(adapter.clone());
    store.append(sample_message(1)).await.expect("append");
    adapter.set_unavailable(true);
    let joy = vec![Emotion::new("joy", "😊")];
    store
        .annotate(1, joy.clone())
        .expect("known id")
        .await
        .expect_err("outage");
    adapter.set_unavailable(false);

    let report = store.load().await.expect("load");
    assert_eq!(report.resynced, 1);
    assert_eq!(store.get(1).expect("message").emotions, Some(joy.clone()));

    store.flush().await.expect("flush");
    let next = MessageStore::new(adapter.clone());
    let report = next.load().await.expect("load");
    assert_eq!(report.resynced, 0);
    assert_eq!(next.get(1).expect("message").emotions, Some(joy));
}

#[tokio::test]
async fn failed_removal_stays_removed_after_reload() {
    let adapter = Arc::new(ScriptedAdapter::new());
    let store = MessageStore::new(adapter.clone());
    store.append(sample_message(1));
    store.append(sample_message(2)).await.expect("append");
    adapter.set_unavailable(true);
    store.remove_by_id(1).await.expect_err("outage");
    adapter.set_unavailable(false);

    let report = store.load().await.expect("load");
    assert_eq!(report.resynced, 1);
    assert_eq!(ids(&store), vec![2]);

    store.flush().await.expect("flush");
    assert_eq!(adapter.calls().last(), Some(&AdapterCall::Delete(1)));
    let next = MessageStore::new(adapter.clone());
    next.load().await.expect("load");
    assert_eq!(ids(&next), vec![2]);
}

#[tokio::test]
async fn failed_clear_stays_cleared_after_reload() {
    let adapter = Arc::new(ScriptedAdapter::new());
    let store = MessageStore::new(adapter.clone());
    store.append(sample_message(1));
    store.append(sample_message(2)).await.expect("append");
    adapter.set_unavailable(true);
    store.clear().await.expect_err("outage");
    adapter.set_unavailable(false);
    store.append(sample_message(3)).await.expect("append");

    let report = store.load().await.expect("load");
    assert_eq!(report.loaded, 0);
    assert_eq!(report.retained, 1);
    assert_eq!(report.resynced, 2);
    assert_eq!(ids(&store), vec![3]);

    store.flush().await.expect("flush");
    let next = MessageStore::new(adapter.clone());
    next.load().await.expect("load");
    assert_eq!(ids(&next), vec![3]);
}

#[tokio::test]
async fn durable_operations_complete_in_issue_order() {
    let adapter = Arc::new(ScriptedAdapter::new());
    adapter.delay_persist(1, Duration::from_millis(50));
    let store = MessageStore::new(adapter.clone());

    let first = store.append(sample_message(1));
    let second = store.append(sample_message(2));
    let annotate = store.annotate(1, vec![Emotion::new("calm", "😌")]).expect("present");
    let remove = store.remove_by_id(2);
    second.await.expect("second");
    first.await.expect("first");
    annotate.await.expect("annotate");
    remove.await.expect("remove");

    assert_eq!(
        adapter.calls(),
        vec![
            AdapterCall::Persist(1),
            AdapterCall::Persist(2),
            AdapterCall::Persist(1),
            AdapterCall::Delete(2),
        ]
    );
}

#[tokio::test]
async fn duplicate_records_in_storage_collapse_on_load() {
    let temp = tempdir().expect("tempdir");
    let kv = Arc::new(FileKeyValueStore::new(temp.path()));
    let first = sample_message(1);
    let mut second = sample_message(1);
    second.text = "newer".to_string();
    let blob = serde_json::to_string(&vec![first, sample_message(2), second.clone()])
        .expect("encode");
    kv.set("messages", &blob).expect("seed");

    let store = MessageStore::new(Arc::new(BlobAdapter::new(kv, "messages")));
    let report = store.load().await.expect("load");
    assert_eq!(report.duplicates, 1);
    assert_eq!(store.messages(), vec![second, sample_message(2)]);
}
