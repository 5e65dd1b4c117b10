//! Collection contract tests
//!
//! Write and read behaviour of a collection backed by an on-disk engine.

use aerostore::collection::{Collection, CollectionError, OpContext};
use aerostore::document::Document;
use aerostore::engine::{Engine, EngineOptions};
use aerostore::selector::{Expr, Fields};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tempfile::TempDir;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct User {
    #[serde(rename = "_id")]
    id: String,
    name: String,
    age: u32,
}

impl Document for User {
    fn id(&self) -> Option<&str> {
        Some(&self.id)
    }
}

fn user(id: &str, name: &str, age: u32) -> User {
    User {
        id: id.to_string(),
        name: name.to_string(),
        age,
    }
}

fn open(temp_dir: &TempDir) -> Collection {
    let engine = Engine::open(temp_dir.path(), EngineOptions::default()).unwrap();
    Collection::new("users", engine)
}

fn ids(cursor_docs: &[Value]) -> Vec<&str> {
    cursor_docs.iter().filter_map(|d| d["_id"].as_str()).collect()
}

#[test]
fn test_typed_round_trip() {
    let temp_dir = TempDir::new().unwrap();
    let coll = open(&temp_dir);
    let ctx = OpContext::background();

    let alice = user("user:1", "Alice", 31);
    let result = coll.create(&ctx, &alice).unwrap();
    assert_eq!(result.id, "user:1");

    let loaded: User = coll.get(&ctx, "user:1").unwrap();
    assert_eq!(loaded, alice);
}

#[test]
fn test_create_twice_overwrites() {
    let temp_dir = TempDir::new().unwrap();
    let coll = open(&temp_dir);
    let ctx = OpContext::background();

    coll.create(&ctx, &user("user:1", "Alice", 31)).unwrap();
    coll.create(&ctx, &user("user:1", "Alicia", 32)).unwrap();

    let loaded: User = coll.get(&ctx, "user:1").unwrap();
    assert_eq!(loaded.name, "Alicia");
    assert_eq!(coll.count(&ctx).unwrap(), 1);
}

#[test]
fn test_delete_is_idempotent_and_get_reports_not_found() {
    let temp_dir = TempDir::new().unwrap();
    let coll = open(&temp_dir);
    let ctx = OpContext::background();

    coll.create(&ctx, &user("user:1", "Alice", 31)).unwrap();
    coll.delete(&ctx, "user:1").unwrap();
    coll.delete(&ctx, "user:1").unwrap();

    match coll.get::<User>(&ctx, "user:1") {
        Err(CollectionError::NotFound { id }) => assert_eq!(id, "user:1"),
        other => panic!("expected NotFound, got {:?}", other),
    }
}

#[test]
fn test_bulk_update_with_invalid_document_writes_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let coll = open(&temp_dir);
    let ctx = OpContext::background();

    coll.create(&ctx, &json!({"_id": "keep", "v": 0})).unwrap();

    let docs = vec![
        json!({"_id": "a", "v": 1}),
        json!({"_id": "", "v": 2}),
        json!({"_id": "c", "v": 3}),
    ];
    let err = coll.bulk_update(&ctx, &docs).unwrap_err();
    assert_eq!(err.code(), "AERO_INVALID_IDENTITY");

    assert_eq!(coll.count(&ctx).unwrap(), 1);
    assert!(matches!(
        coll.get::<Value>(&ctx, "a"),
        Err(CollectionError::NotFound { .. })
    ));
    assert!(matches!(
        coll.get::<Value>(&ctx, "c"),
        Err(CollectionError::NotFound { .. })
    ));
}

#[test]
fn test_bulk_update_overwrites_and_inserts() {
    let temp_dir = TempDir::new().unwrap();
    let coll = open(&temp_dir);
    let ctx = OpContext::background();

    coll.create(&ctx, &user("u1", "old", 1)).unwrap();
    let docs = vec![user("u1", "new", 2), user("u2", "Bob", 40)];
    coll.bulk_update(&ctx, &docs).unwrap();

    let u1: User = coll.get(&ctx, "u1").unwrap();
    assert_eq!(u1.name, "new");
    assert_eq!(coll.count(&ctx).unwrap(), 2);
}

#[test]
fn test_prefix_selection_and_full_ordering() {
    let temp_dir = TempDir::new().unwrap();
    let coll = open(&temp_dir);
    let ctx = OpContext::background();

    for id in ["user:2", "order:9", "user:10", "admin", "user:1", "users"] {
        coll.create(&ctx, &json!({ "_id": id })).unwrap();
    }

    let mut cursor = coll
        .select(&ctx, &Expr::prefix("_id", "user:"), &Fields::all())
        .unwrap();
    let selected: Vec<Value> = cursor.collect_all().unwrap();
    cursor.close().unwrap();
    assert_eq!(ids(&selected), vec!["user:1", "user:10", "user:2"]);

    let mut cursor = coll.all(&ctx).unwrap();
    let everything: Vec<Value> = cursor.collect_all().unwrap();
    cursor.close().unwrap();
    assert_eq!(
        ids(&everything),
        vec!["admin", "order:9", "user:1", "user:10", "user:2", "users"]
    );
}

#[test]
fn test_non_prefix_operator_scans_everything() {
    let temp_dir = TempDir::new().unwrap();
    let coll = open(&temp_dir);
    let ctx = OpContext::background();

    coll.create(&ctx, &json!({"_id": "a"})).unwrap();
    coll.create(&ctx, &json!({"_id": "b"})).unwrap();

    let mut cursor = coll
        .select(&ctx, &Expr::eq("_id", "a"), &Fields::new(["_id"]))
        .unwrap();
    assert!(cursor.prefix().is_none());
    let docs: Vec<Value> = cursor.collect_all().unwrap();
    assert_eq!(docs.len(), 2);
}

#[test]
fn test_count_after_writes_and_deletes() {
    let temp_dir = TempDir::new().unwrap();
    let coll = open(&temp_dir);
    let ctx = OpContext::background();

    for i in 0..10 {
        coll.create(&ctx, &json!({ "_id": format!("doc:{:02}", i) }))
            .unwrap();
    }
    for i in [1, 4, 7] {
        coll.delete(&ctx, &format!("doc:{:02}", i)).unwrap();
    }

    assert_eq!(coll.count(&ctx).unwrap(), 7);
}

#[test]
fn test_selector_from_json() {
    let temp_dir = TempDir::new().unwrap();
    let coll = open(&temp_dir);
    let ctx = OpContext::background();

    coll.create(&ctx, &json!({"_id": "user:1"})).unwrap();
    coll.create(&ctx, &json!({"_id": "zz"})).unwrap();

    let expr = Expr::from_json(&json!({"_id": {"$prefix": "user:"}})).unwrap();
    let mut cursor = coll.select(&ctx, &expr, &Fields::all()).unwrap();
    let docs: Vec<Value> = cursor.collect_all().unwrap();
    assert_eq!(ids(&docs), vec!["user:1"]);
}
