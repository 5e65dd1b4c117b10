//! Readers and writers sharing one collection across threads.

use std::sync::{Arc, Barrier};
use std::thread;

use aerostore::collection::{Collection, OpContext};
use aerostore::engine::{Engine, EngineOptions};
use serde_json::{json, Value};
use tempfile::TempDir;

fn on_disk(temp_dir: &TempDir) -> Collection {
    let options = EngineOptions::default().with_sync_writes(false);
    let engine = Engine::open(temp_dir.path(), options).unwrap();
    Collection::new("docs", engine).with_prefetch_size(7)
}

fn seed(coll: &Collection, n: usize) {
    let docs: Vec<Value> = (0..n)
        .map(|i| json!({ "_id": format!("doc:{:03}", i), "v": 0 }))
        .collect();
    coll.bulk_update(&OpContext::background(), &docs).unwrap();
}

#[test]
fn test_cursor_scan_isolated_from_concurrent_writer() {
    let temp_dir = TempDir::new().unwrap();
    let coll = on_disk(&temp_dir);
    seed(&coll, 500);

    let ready = Arc::new(Barrier::new(2));

    let reader = {
        let coll = coll.clone();
        let ready = ready.clone();
        thread::spawn(move || {
            let ctx = OpContext::background();
            let mut cursor = coll.all(&ctx).unwrap();
            ready.wait();

            let mut seen = Vec::new();
            while cursor.advance().unwrap() {
                let doc: Value = cursor.decode_current().unwrap();
                assert_eq!(doc["v"], 0);
                seen.push(doc["_id"].as_str().unwrap().to_string());
                thread::yield_now();
            }
            cursor.close().unwrap();
            seen
        })
    };

    let writer = {
        let coll = coll.clone();
        let ready = ready.clone();
        thread::spawn(move || {
            let ctx = OpContext::background();
            ready.wait();
            for i in 0..500 {
                let id = format!("doc:{:03}", i);
                if i % 2 == 0 {
                    coll.delete(&ctx, &id).unwrap();
                } else {
                    coll.update(&ctx, &json!({ "_id": id, "v": 1 })).unwrap();
                }
            }
            coll.create(&ctx, &json!({"_id": "doc:999", "v": 1})).unwrap();
        })
    };

    writer.join().unwrap();
    let seen = reader.join().unwrap();

    let expected: Vec<String> = (0..500).map(|i| format!("doc:{:03}", i)).collect();
    assert_eq!(seen, expected);

    let ctx = OpContext::background();
    let mut cursor = coll.all(&ctx).unwrap();
    let now: Vec<Value> = cursor.collect_all().unwrap();
    cursor.close().unwrap();
    assert_eq!(now.len(), 251);
    assert!(now.iter().all(|doc| doc["v"] == 1));
    assert_eq!(coll.engine().pinned_readers(), 0);
}

#[test]
fn test_parallel_writers_then_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let coll = on_disk(&temp_dir);

    let writers: Vec<_> = (0..4)
        .map(|w| {
            let coll = coll.clone();
            thread::spawn(move || {
                let ctx = OpContext::background();
                for i in 0..100 {
                    let doc = json!({ "_id": format!("w{}:{:03}", w, i), "writer": w });
                    coll.create(&ctx, &doc).unwrap();
                }
            })
        })
        .collect();

    let counter = {
        let coll = coll.clone();
        thread::spawn(move || {
            let ctx = OpContext::background();
            let mut last = 0;
            for _ in 0..50 {
                let count = coll.count(&ctx).unwrap();
                assert!(count >= last, "count went back from {} to {}", last, count);
                last = count;
            }
        })
    };

    for writer in writers {
        writer.join().unwrap();
    }
    counter.join().unwrap();

    let ctx = OpContext::background();
    assert_eq!(coll.count(&ctx).unwrap(), 400);
    coll.engine().close().unwrap();

    let reopened = on_disk(&temp_dir);
    assert_eq!(reopened.count(&ctx).unwrap(), 400);
    let doc: Value = reopened.get(&ctx, "w3:099").unwrap();
    assert_eq!(doc["writer"], 3);
}

#[test]
fn test_handles_share_committed_writes() {
    let temp_dir = TempDir::new().unwrap();
    let coll = on_disk(&temp_dir);
    let other = coll.clone();

    thread::spawn(move || {
        other
            .create(&OpContext::background(), &json!({"_id": "x"}))
            .unwrap();
    })
    .join()
    .unwrap();

    let doc: Value = coll.get(&OpContext::background(), "x").unwrap();
    assert_eq!(doc["_id"], "x");
}

#[test]
fn test_writes_under_open_cursor_do_not_copy_keyspace() {
    let coll = Collection::new("docs", Engine::in_memory());
    seed(&coll, 500);
    let ctx = OpContext::background();

    let mut cursor = coll.all(&ctx).unwrap();
    for i in 0..10 {
        coll.update(&ctx, &json!({ "_id": format!("doc:{:03}", i), "v": 1 }))
            .unwrap();
    }
    assert_eq!(coll.engine().version_count(), 510);

    cursor.close().unwrap();
    coll.create(&ctx, &json!({"_id": "doc:500", "v": 1})).unwrap();
    assert_eq!(coll.engine().version_count(), 501);
}
