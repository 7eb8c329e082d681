//! TreeStore interface tests.
//!
//! These tests verify the contract of the TreeStore trait.
//! Every function writes below its own `base` path so the suite can share a
//! database with other runs.

use serde_json::{json, Map, Value};

use actiontally::storage::path::join;
use actiontally::storage::TreeStore;

fn event(user_id: &str, action: &str) -> Value {
    json!({
        "user_id": user_id,
        "action": action,
        "client_id": "c1",
        "timestamp": "2024-03-05T10:00:00Z",
        "usage_count": 1
    })
}

// =============================================================================
// get / set
// =============================================================================

pub async fn test_get_absent<S: TreeStore + ?Sized>(store: &S, base: &str) {
    let value = store
        .get(&join(&[base, "absent"]))
        .await
        .expect("get should succeed");
    assert!(value.is_none(), "absent node should be None");
}

pub async fn test_set_then_get<S: TreeStore + ?Sized>(store: &S, base: &str) {
    let path = join(&[base, "set_then_get", "k1"]);
    store
        .set(&path, event("u1", "click"))
        .await
        .expect("set should succeed");

    let value = store.get(&path).await.expect("get should succeed");
    assert_eq!(value, Some(event("u1", "click")));
}

pub async fn test_set_overwrites<S: TreeStore + ?Sized>(store: &S, base: &str) {
    let path = join(&[base, "set_overwrites", "k1"]);
    store.set(&path, json!({"a": 1, "b": 2})).await.unwrap();
    store.set(&path, json!({"a": 3})).await.unwrap();

    let value = store.get(&path).await.unwrap();
    assert_eq!(value, Some(json!({"a": 3})), "set must replace, not merge");
}

pub async fn test_set_null_removes<S: TreeStore + ?Sized>(store: &S, base: &str) {
    let path = join(&[base, "set_null", "k1"]);
    store.set(&path, json!({"a": 1})).await.unwrap();
    store.set(&path, Value::Null).await.unwrap();

    assert!(store.get(&path).await.unwrap().is_none());
}

// =============================================================================
// update
// =============================================================================

pub async fn test_update_merges_fields<S: TreeStore + ?Sized>(store: &S, base: &str) {
    let path = join(&[base, "update", "u1"]);
    store
        .set(&path, json!({"name": "Ada", "email": "old@example.com"}))
        .await
        .unwrap();

    let mut partial = Map::new();
    partial.insert("email".to_string(), json!("new@example.com"));
    store.update(&path, partial).await.expect("update should succeed");

    let value = store.get(&path).await.unwrap().unwrap();
    assert_eq!(value["name"], "Ada");
    assert_eq!(value["email"], "new@example.com");
}

// =============================================================================
// push
// =============================================================================

pub async fn test_push_assigns_unique_ordered_keys<S: TreeStore + ?Sized>(store: &S, base: &str) {
    let partition = join(&[base, "push"]);
    let first = store.push(&partition, event("u1", "click")).await.unwrap();
    let second = store.push(&partition, event("u2", "click")).await.unwrap();

    assert_ne!(first, second);
    assert!(first < second, "push keys should be time-ordered");

    let keys = store.child_keys(&partition).await.unwrap();
    assert_eq!(keys, vec![first.clone(), second]);

    let stored = store.get(&join(&[&partition, &first])).await.unwrap();
    assert_eq!(stored, Some(event("u1", "click")));
}

// =============================================================================
// query_child_equal_to
// =============================================================================

pub async fn test_query_child_equal_to<S: TreeStore + ?Sized>(store: &S, base: &str) {
    let partition = join(&[base, "query"]);
    store.push(&partition, event("u1", "click")).await.unwrap();
    store.push(&partition, event("u2", "click")).await.unwrap();
    store.push(&partition, event("u1", "view")).await.unwrap();

    let matches = store
        .query_child_equal_to(&partition, "user_id", &json!("u1"))
        .await
        .expect("query should succeed");
    assert_eq!(matches.len(), 2);
    assert!(matches.iter().all(|(_, v)| v["user_id"] == "u1"));
    assert_eq!(matches[0].1["action"], "click", "enumeration order is push order");

    let none = store
        .query_child_equal_to(&partition, "user_id", &json!("nobody"))
        .await
        .unwrap();
    assert!(none.is_empty());
}

pub async fn test_query_absent_base_is_empty<S: TreeStore + ?Sized>(store: &S, base: &str) {
    let matches = store
        .query_child_equal_to(&join(&[base, "no_such_partition"]), "action", &json!("x"))
        .await
        .expect("query on absent node should succeed");
    assert!(matches.is_empty());
}

// =============================================================================
// child_keys
// =============================================================================

pub async fn test_child_keys<S: TreeStore + ?Sized>(store: &S, base: &str) {
    let root = join(&[base, "children"]);
    store.set(&join(&[&root, "2024-03", "k"]), json!(1)).await.unwrap();
    store.set(&join(&[&root, "2024-04", "k"]), json!(1)).await.unwrap();

    let mut keys = store.child_keys(&root).await.unwrap();
    keys.sort();
    assert_eq!(keys, vec!["2024-03".to_string(), "2024-04".to_string()]);

    let absent = store.child_keys(&join(&[base, "no_children"])).await.unwrap();
    assert!(absent.is_empty());
}

// =============================================================================
// Test runner macro
// =============================================================================

/// Run all TreeStore interface tests against a store implementation.
#[macro_export]
macro_rules! run_tree_store_tests {
    ($store:expr, $base:expr) => {
        use $crate::backend::tree_store_tests::*;

        test_get_absent($store, $base).await;
        println!("  test_get_absent: PASSED");

        test_set_then_get($store, $base).await;
        println!("  test_set_then_get: PASSED");

        test_set_overwrites($store, $base).await;
        println!("  test_set_overwrites: PASSED");

        test_set_null_removes($store, $base).await;
        println!("  test_set_null_removes: PASSED");

        test_update_merges_fields($store, $base).await;
        println!("  test_update_merges_fields: PASSED");

        test_push_assigns_unique_ordered_keys($store, $base).await;
        println!("  test_push_assigns_unique_ordered_keys: PASSED");

        test_query_child_equal_to($store, $base).await;
        println!("  test_query_child_equal_to: PASSED");

        test_query_absent_base_is_empty($store, $base).await;
        println!("  test_query_absent_base_is_empty: PASSED");

        test_child_keys($store, $base).await;
        println!("  test_child_keys: PASSED");
    };
}
