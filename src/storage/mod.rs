//! Storage backends for the benchmark tables.
//!
//! The Selector and Updater talk to storage through the [`WorldStore`]
//! capability trait. Each backend is a variant of the same contract —
//! a raw driver, a pooled driver, or an in-process table — selected once
//! at process startup from [`Config`], never at call time.

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::Config;
use crate::error::MazurkaError;
use crate::models::{Fortune, World};

pub mod memory;
pub mod pooled;
pub mod raw;

pub use memory::MemoryStore;
pub use pooled::PooledPgStore;
pub use raw::RawPgStore;

pub(crate) const SELECT_WORLD_SQL: &str = "SELECT id, randomnumber FROM world WHERE id = $1";
pub(crate) const UPDATE_WORLD_SQL: &str = "UPDATE world SET randomnumber = $1 WHERE id = $2";
pub(crate) const SELECT_FORTUNE_SQL: &str = "SELECT id, message FROM fortune";

/// Capability interface over the `world` and `fortune` tables.
#[async_trait]
pub trait WorldStore: Send + Sync {
    /// Point lookup by primary key. A missing row or driver failure aborts
    /// with [`MazurkaError::LookupFailed`] carrying the id.
    async fn find_world(&self, id: i32) -> Result<World, MazurkaError>;

    /// Apply a batch of world mutations as one logical operation.
    ///
    /// `rows` arrive sorted ascending by id — that is the global
    /// lock-acquisition order that keeps concurrent overlapping batches
    /// from deadlocking. Duplicate ids are permitted; the last occurrence
    /// wins. A concurrent reader must never observe the batch partially
    /// applied: backends use either a single aggregated statement or an
    /// explicit commit-or-rollback transaction.
    async fn update_worlds(&self, rows: &[World]) -> Result<(), MazurkaError>;

    /// All rows of the `fortune` table, unordered.
    async fn list_fortunes(&self) -> Result<Vec<Fortune>, MazurkaError>;
}

/// Connect the backend named by `config.storage_backend`.
pub async fn connect(config: &Config) -> Result<Arc<dyn WorldStore>, MazurkaError> {
    match config.storage_backend.as_str() {
        "raw" => {
            let store = RawPgStore::connect(&config.database_url).await?;
            tracing::info!("storage backend: raw (single pipelined connection)");
            Ok(Arc::new(store))
        }
        "pooled" => {
            let store = PooledPgStore::connect(&config.database_url, config.max_pool_size).await?;
            tracing::info!(
                max_pool_size = config.max_pool_size,
                "storage backend: pooled"
            );
            Ok(Arc::new(store))
        }
        "memory" => {
            tracing::info!("storage backend: memory (no database)");
            Ok(Arc::new(MemoryStore::new()))
        }
        other => Err(MazurkaError::Config(format!(
            "unknown storage backend `{other}` (expected raw, pooled, or memory)"
        ))),
    }
}
