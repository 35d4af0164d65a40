//! End-to-end and property tests for the batched world-update protocol.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use mazurka::storage::MemoryStore;
use mazurka::updates::update_random_worlds;
use mazurka::{TestApp, World, WorldStore};

fn w(id: i32, random_number: i32) -> World {
    World { id, random_number }
}

#[tokio::test]
async fn updates_endpoint_persists_returned_values() {
    let app = TestApp::new().await;
    let res = app.client.get(&app.url("/updates?queries=3")).await;

    assert_eq!(res.status, 200);
    let body = res.json();
    let worlds = body.as_array().expect("array body");
    assert_eq!(worlds.len(), 3);

    // If random selection picked the same id twice, the later element of
    // the response is the one that won in storage.
    let mut expected = HashMap::new();
    for world in worlds {
        let id = world["id"].as_i64().expect("id") as i32;
        let rn = world["randomNumber"].as_i64().expect("randomNumber") as i32;
        expected.insert(id, rn);
    }

    for (id, rn) in expected {
        let stored = app.store.find_world(id).await.expect("updated row");
        assert_eq!(
            stored.random_number, rn,
            "world {id} does not hold the value returned by /updates"
        );
    }
}

#[tokio::test]
async fn updates_parameter_clamps_and_defaults() {
    let app = TestApp::new().await;

    let cases = [
        ("/updates", 1),
        ("/updates?queries=0", 1),
        ("/updates?queries=abc", 1),
        ("/updates?queries=501", 500),
    ];
    for (path, expected_len) in cases {
        let res = app.client.get(&app.url(path)).await;
        assert_eq!(res.status, 200, "{path}");
        let len = res.json().as_array().expect("array body").len();
        assert_eq!(len, expected_len, "{path}");
    }
}

#[tokio::test]
async fn update_then_point_read_sees_the_new_value() {
    let app = TestApp::new().await;
    let res = app.client.get(&app.url("/updates?queries=1")).await;
    let body = res.json();
    let world = &body.as_array().expect("array body")[0];
    let id = world["id"].as_i64().expect("id") as i32;
    let rn = world["randomNumber"].as_i64().expect("randomNumber") as i32;

    let read_back = app.store.find_world(id).await.expect("row");
    assert_eq!(read_back.random_number, rn);
}

// P1: applying a batch and any permutation of the same batch (each sorted
// before submission, as the orchestrator does) produces identical state.
#[tokio::test]
async fn permuted_batches_produce_identical_state() {
    let batch = [w(5, 55), w(3, 33), w(1, 11), w(9, 99)];
    let mut permuted = batch;
    permuted.reverse();

    let store_a = MemoryStore::new();
    let store_b = MemoryStore::new();

    let mut sorted_a = batch.to_vec();
    sorted_a.sort_by_key(|x| x.id);
    let mut sorted_b = permuted.to_vec();
    sorted_b.sort_by_key(|x| x.id);

    store_a.update_worlds(&sorted_a).await.expect("batch a");
    store_b.update_worlds(&sorted_b).await.expect("batch b");

    for id in [1, 3, 5, 9] {
        let a = store_a.find_world(id).await.expect("row a");
        let b = store_b.find_world(id).await.expect("row b");
        assert_eq!(a, b);
    }
}

// P2: a concurrent reader never observes a batch partially applied. Once
// any row of the batch reads as the new value, every subsequent read of
// any batch row must also be the new value.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn readers_never_observe_a_partial_batch() {
    let store = Arc::new(MemoryStore::new());
    let ids: Vec<i32> = (1..=500).collect();

    let pre: Vec<World> = ids.iter().map(|&id| w(id, 1111)).collect();
    store.update_worlds(&pre).await.expect("pre batch");

    let writer = {
        let store = store.clone();
        let post: Vec<World> = ids.iter().map(|&id| w(id, 2222)).collect();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            store.update_worlds(&post).await.expect("post batch");
        })
    };

    let reader = {
        let store = store.clone();
        tokio::spawn(async move {
            let mut seen_new = false;
            for i in 0..20_000u32 {
                let id = (i % 500 + 1) as i32;
                let value = store.find_world(id).await.expect("row").random_number;
                match value {
                    2222 => seen_new = true,
                    1111 => assert!(
                        !seen_new,
                        "read pre-update value for world {id} after the batch was visible"
                    ),
                    other => panic!("world {id} holds {other}, not a pre/post value"),
                }
            }
        })
    };

    writer.await.expect("writer task");
    reader.await.expect("reader task");

    let final_read = store.find_world(42).await.expect("row");
    assert_eq!(final_read.random_number, 2222);
}

// P5: concurrent batches with overlapping ids selected in different orders
// complete within a bounded timeout because both sort before applying.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn overlapping_concurrent_batches_complete() {
    let store = Arc::new(MemoryStore::new());

    let mut tasks = Vec::new();
    for task_id in 0..8 {
        let store = store.clone();
        tasks.push(tokio::spawn(async move {
            for _ in 0..20 {
                // Selection order differs per task; the orchestrator's sort
                // imposes the single global application order.
                update_random_worlds(store.as_ref(), 100)
                    .await
                    .expect("batch update");
            }
            task_id
        }));
    }

    let all = futures_util::future::join_all(tasks);
    let results = tokio::time::timeout(Duration::from_secs(30), all)
        .await
        .expect("concurrent batches deadlocked or stalled");
    for r in results {
        r.expect("update task panicked");
    }
}

// P6: a batch containing the same id twice updates that row to the value
// of the last occurrence in ascending-sorted order.
#[tokio::test]
async fn duplicate_id_in_batch_last_occurrence_wins() {
    let store = MemoryStore::new();
    let batch = [w(7, 100), w(7, 200), w(8, 300)];
    store.update_worlds(&batch).await.expect("batch");

    assert_eq!(store.find_world(7).await.expect("row").random_number, 200);
    assert_eq!(store.find_world(8).await.expect("row").random_number, 300);
}
