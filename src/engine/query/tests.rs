use serde_json::json;

use super::*;
use crate::engine::CoreError;
use crate::storage::MemoryTreeStore;

fn engine(store: Arc<MemoryTreeStore>) -> QueryEngine {
    QueryEngine::new(store, EventPaths::new("events"), PartitionRouter::monthly())
}

fn record(user_id: &str, action: &str, ts: &str) -> Value {
    json!({
        "user_id": user_id,
        "action": action,
        "client_id": "c1",
        "timestamp": ts,
        "usage_count": 1
    })
}

fn partition(name: &str) -> PartitionId {
    PartitionId::from(name.to_string())
}

async fn seeded() -> Arc<MemoryTreeStore> {
    let store = Arc::new(MemoryTreeStore::new());
    for (partition, user, action) in [
        ("2024-03", "u1", "click"),
        ("2024-03", "u2", "click"),
        ("2024-03", "u1", "view"),
        ("2024-04", "u1", "click"),
        ("2024-05", "u3", "share"),
    ] {
        store
            .push(
                &format!("events/{}", partition),
                record(user, action, &format!("{}-10T00:00:00Z", partition)),
            )
            .await
            .unwrap();
    }
    store
}

#[tokio::test]
async fn test_query_by_action_filters_within_partition() {
    let engine = engine(seeded().await);
    let records = engine
        .query_by_action(&partition("2024-03"), "click")
        .await
        .unwrap();
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.action == "click"));
}

#[tokio::test]
async fn test_query_by_action_absent_partition_is_empty() {
    let engine = engine(seeded().await);
    let records = engine
        .query_by_action(&partition("1999-01"), "click")
        .await
        .unwrap();
    assert!(records.is_empty());

    let none = engine
        .query_by_action(&partition("2024-03"), "purchase")
        .await
        .unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn test_query_by_action_in_period() {
    let engine = engine(seeded().await);
    let records = engine
        .query_by_action_in_period(Some("2024-04"), "click")
        .await
        .unwrap();
    assert_eq!(records.len(), 1);

    let bad = engine.query_by_action_in_period(Some("April"), "click").await;
    assert!(matches!(bad, Err(CoreError::Validation(_))));
}

#[tokio::test]
async fn test_query_by_action_in_current_period_by_default() {
    let store = Arc::new(MemoryTreeStore::new());
    let current = PartitionRouter::monthly().current();
    store
        .push(
            &format!("events/{}", current),
            record("u1", "click", &crate::engine::now_rfc3339()),
        )
        .await
        .unwrap();

    let records = engine(store)
        .query_by_action_in_period(None, "click")
        .await
        .unwrap();
    if PartitionRouter::monthly().current() == current {
        assert_eq!(records.len(), 1);
    }
}

#[tokio::test]
async fn test_query_all_is_repeatable() {
    let engine = engine(seeded().await);
    let first = engine.query_all(&partition("2024-03")).await.unwrap();
    let second = engine.query_all(&partition("2024-03")).await.unwrap();
    assert_eq!(first.len(), 3);
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_query_all_rejects_non_object_partition() {
    let store = Arc::new(MemoryTreeStore::new());
    store.set("events/2024-03", json!("flat")).await.unwrap();
    let result = engine(store).query_all(&partition("2024-03")).await;
    assert!(matches!(result, Err(CoreError::Upstream(_))));
}

#[tokio::test]
async fn test_query_all_skips_undecodable_records() {
    let store = seeded().await;
    store
        .push("events/2024-03", json!({"unexpected": "shape"}))
        .await
        .unwrap();
    let records = engine(store).query_all(&partition("2024-03")).await.unwrap();
    assert_eq!(records.len(), 3);
}

#[tokio::test]
async fn test_across_partitions_without_filter_is_union() {
    let engine = engine(seeded().await);
    let records = engine.query_across_all_partitions(None).await.unwrap();
    assert_eq!(records.len(), 5);

    // Grouped by ascending partition name.
    let months: Vec<&str> = records.iter().map(|r| &r.timestamp[..7]).collect();
    let mut sorted = months.clone();
    sorted.sort();
    assert_eq!(months, sorted);
}

#[tokio::test]
async fn test_across_partitions_with_filter() {
    let engine = engine(seeded().await);
    let records = engine
        .query_across_all_partitions(Some("click"))
        .await
        .unwrap();
    assert_eq!(records.len(), 3);
    assert!(records.iter().all(|r| r.action == "click"));
}

#[tokio::test]
async fn test_across_partitions_on_empty_store() {
    let engine = engine(Arc::new(MemoryTreeStore::new()));
    let records = engine.query_across_all_partitions(None).await.unwrap();
    assert!(records.is_empty());
}

#[tokio::test]
async fn test_across_partitions_tolerates_unreadable_partition() {
    let store = seeded().await;
    let engine = engine(store.clone());
    store.fail_reads_under("events/2024-04").await;

    // `child_keys` on the memory store reads the root node, which is not under
    // the failing prefix; only the per-partition read of 2024-04 fails.
    let records = engine.query_across_all_partitions(None).await.unwrap();
    assert_eq!(records.len(), 4);
    assert!(records.iter().all(|r| !r.timestamp.starts_with("2024-04")));
}

#[tokio::test]
async fn test_across_partitions_listing_failure_is_fatal() {
    let store = seeded().await;
    store.fail_reads_under("events").await;
    let result = engine(store).query_across_all_partitions(None).await;
    assert!(matches!(result, Err(CoreError::Upstream(_))));
}
