//! In-process backend: the `world` table as a `Vec<i32>` behind an
//! async `RwLock`.
//!
//! Used by [`crate::testing::TestApp`] and for running the server without
//! a database. Batch updates take the write lock, so a concurrent reader
//! observes the whole batch or none of it — the same observable the SQL
//! backends provide through statements and transactions.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::RwLock;

use crate::error::MazurkaError;
use crate::models::{Fortune, WORLD_TABLE_SIZE, World};
use crate::storage::WorldStore;

use async_trait::async_trait;

pub struct MemoryStore {
    /// `randomnumber` values indexed by `id - 1`.
    worlds: RwLock<Vec<i32>>,
    fortunes: Vec<Fortune>,
}

fn seed_fortunes() -> Vec<Fortune> {
    let messages = [
        "fortune: No such file or directory",
        "A computer scientist is someone who fixes things that aren't broken.",
        "After enough decimal places, nobody gives a damn.",
        "A bad random number generator: 1, 1, 1, 1, 1, 4.33e+67, 1, 1, 1",
        "A computer program does what you tell it to do, not what you want it to do.",
        "Emacs is a nice operating system, but I prefer UNIX. — Tom Christaensen",
        "Any program that runs right is obsolete.",
        "A list is only as strong as its weakest link. — Donald Knuth",
        "Feature: A bug with seniority.",
        "Computers make very fast, very accurate mistakes.",
        "<script>alert(\"This should not be displayed in a browser alert box.\");</script>",
        "フレームワークのベンチマーク",
    ];
    messages
        .iter()
        .enumerate()
        .map(|(i, m)| Fortune {
            id: i as i32 + 1,
            message: (*m).to_string(),
        })
        .collect()
}

impl MemoryStore {
    /// A fully seeded table: 10,000 rows with values in [1, 10000].
    ///
    /// The seed is fixed so test runs are reproducible.
    pub fn new() -> Self {
        let mut rng = StdRng::seed_from_u64(0);
        let worlds = (0..WORLD_TABLE_SIZE)
            .map(|_| rng.gen_range(1..=WORLD_TABLE_SIZE))
            .collect();
        MemoryStore {
            worlds: RwLock::new(worlds),
            fortunes: seed_fortunes(),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WorldStore for MemoryStore {
    async fn find_world(&self, id: i32) -> Result<World, MazurkaError> {
        let worlds = self.worlds.read().await;
        if id < 1 || id as usize > worlds.len() {
            return Err(MazurkaError::lookup_failed(id, "row not found"));
        }
        Ok(World {
            id,
            random_number: worlds[(id - 1) as usize],
        })
    }

    async fn update_worlds(&self, rows: &[World]) -> Result<(), MazurkaError> {
        let mut worlds = self.worlds.write().await;
        // Validate every id before mutating anything, so a bad row cannot
        // leave the batch half-applied.
        for w in rows {
            let in_range = w.id >= 1 && (w.id as usize) <= worlds.len();
            if !in_range {
                return Err(MazurkaError::batch_update(format!(
                    "world id {} out of range",
                    w.id
                )));
            }
        }
        // Applied in order, so the last occurrence of a duplicate id wins.
        for w in rows {
            worlds[(w.id - 1) as usize] = w.random_number;
        }
        Ok(())
    }

    async fn list_fortunes(&self) -> Result<Vec<Fortune>, MazurkaError> {
        Ok(self.fortunes.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn seeded_values_are_in_range() {
        let store = MemoryStore::new();
        for id in [1, 500, 10_000] {
            let w = store.find_world(id).await.expect("seeded row");
            assert!((1..=WORLD_TABLE_SIZE).contains(&w.random_number));
        }
    }

    #[tokio::test]
    async fn find_world_rejects_out_of_range_ids() {
        let store = MemoryStore::new();
        assert!(store.find_world(0).await.is_err());
        assert!(store.find_world(10_001).await.is_err());
        assert!(store.find_world(-5).await.is_err());
    }

    #[tokio::test]
    async fn bad_row_fails_batch_without_mutating() {
        let store = MemoryStore::new();
        let before = store.find_world(10).await.expect("row 10");
        let rows = [
            World {
                id: 10,
                random_number: 9999,
            },
            World {
                id: 10_001,
                random_number: 1,
            },
        ];
        assert!(store.update_worlds(&rows).await.is_err());
        let after = store.find_world(10).await.expect("row 10");
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn fortunes_include_the_script_injection_row() {
        let store = MemoryStore::new();
        let fortunes = store.list_fortunes().await.expect("fortunes");
        assert_eq!(fortunes.len(), 12);
        assert!(fortunes.iter().any(|f| f.message.contains("<script>")));
    }
}
