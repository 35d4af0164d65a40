//! The concurrent batched world-update protocol behind `GET /updates`,
//! plus the random selection shared with `/db` and `/queries`.
//!
//! One request is one task: select N random worlds concurrently, assign
//! fresh random values, sort a copy ascending by id, hand it to the
//! store's batch updater, and respond with the rows in their original
//! selection order. Stateless and retry-free — the first failure at any
//! step fails the whole request.

use futures_util::future::try_join_all;

use crate::error::MazurkaError;
use crate::models::{MAX_QUERIES, World, random_world_id, random_world_value};
use crate::storage::WorldStore;

/// Parse the `queries` parameter: clamp to [1, 500], default 1.
///
/// An unparseable value is not an error — it falls back to the default,
/// mirroring the benchmark rules' clamp-on-parse-failure policy.
pub fn parse_queries(raw: Option<&str>) -> usize {
    raw.and_then(|s| s.parse::<i64>().ok())
        .map(|n| n.clamp(1, MAX_QUERIES as i64) as usize)
        .unwrap_or(1)
}

/// Fetch `n` worlds by independent uniformly random point lookups.
///
/// All `n` lookups are issued concurrently and pipelined by the backend;
/// the task suspends until every one completes. The first failure
/// short-circuits the join and aborts the selection — no partial result.
/// Completion order is not selection order; only the returned sequence
/// order (and its length, exactly `n`) is meaningful.
pub async fn select_random_worlds(
    store: &dyn WorldStore,
    n: usize,
) -> Result<Vec<World>, MazurkaError> {
    try_join_all((0..n).map(|_| store.find_world(random_world_id()))).await
}

/// The update orchestrator: select, mutate, sort, persist.
///
/// The returned rows keep the Selector's order — only the copy handed to
/// the batch updater is sorted ascending by id (the deadlock-avoidance
/// lock order). The sort is stable, so when random selection picks the
/// same id twice, the later selection wins in storage (see the duplicate
/// tests in `tests/updates_tests.rs`).
pub async fn update_random_worlds(
    store: &dyn WorldStore,
    n: usize,
) -> Result<Vec<World>, MazurkaError> {
    let worlds = select_random_worlds(store, n).await?;

    let updated: Vec<World> = worlds
        .iter()
        .map(|w| World {
            id: w.id,
            random_number: random_world_value(),
        })
        .collect();

    let mut batch = updated.clone();
    batch.sort_by_key(|w| w.id);
    store.update_worlds(&batch).await?;

    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::WORLD_TABLE_SIZE;
    use crate::storage::MemoryStore;

    #[test]
    fn parse_queries_defaults_to_one() {
        assert_eq!(parse_queries(None), 1);
        assert_eq!(parse_queries(Some("")), 1);
        assert_eq!(parse_queries(Some("abc")), 1);
        assert_eq!(parse_queries(Some("12.5")), 1);
    }

    #[test]
    fn parse_queries_clamps_to_bounds() {
        assert_eq!(parse_queries(Some("0")), 1);
        assert_eq!(parse_queries(Some("-3")), 1);
        assert_eq!(parse_queries(Some("1")), 1);
        assert_eq!(parse_queries(Some("500")), 500);
        assert_eq!(parse_queries(Some("501")), 500);
        assert_eq!(parse_queries(Some("99999999999")), 500);
    }

    #[tokio::test]
    async fn selector_returns_exactly_n_rows_in_range() {
        let store = MemoryStore::new();
        for n in [1, 20, 500] {
            let worlds = select_random_worlds(&store, n).await.expect("selection");
            assert_eq!(worlds.len(), n);
            for w in &worlds {
                assert!((1..=WORLD_TABLE_SIZE).contains(&w.id));
                assert!((1..=WORLD_TABLE_SIZE).contains(&w.random_number));
            }
        }
    }

    #[tokio::test]
    async fn orchestrator_returns_n_rows_and_persists_them() {
        let store = MemoryStore::new();
        let updated = update_random_worlds(&store, 25).await.expect("update");
        assert_eq!(updated.len(), 25);

        // The response order is selection order, not sorted order, so read
        // back through the store to check what was actually persisted.
        // Duplicate selections are possible; the later write must have won.
        let mut last_value = std::collections::HashMap::new();
        for w in &updated {
            last_value.insert(w.id, w.random_number);
        }
        for (id, value) in last_value {
            let stored = store.find_world(id).await.expect("updated row");
            assert_eq!(stored.random_number, value);
        }
    }
}
