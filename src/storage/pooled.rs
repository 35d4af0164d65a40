//! Pooled backend: an sqlx `PgPool`.
//!
//! Point lookups check a connection out of the pool per query; batch
//! updates run as an explicit transaction of per-row statements issued in
//! the caller's ascending-id order, committed at the end. Any failure
//! mid-batch rolls the transaction back, so a concurrent reader never
//! observes a partial batch. sqlx caches prepared statements per
//! connection, so the per-row statement is planned once.

use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use crate::error::MazurkaError;
use crate::models::{Fortune, World};
use crate::storage::{SELECT_FORTUNE_SQL, SELECT_WORLD_SQL, UPDATE_WORLD_SQL, WorldStore};

pub struct PooledPgStore {
    pool: PgPool,
}

impl PooledPgStore {
    pub async fn connect(url: &str, max_pool_size: u32) -> Result<Self, MazurkaError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_pool_size)
            .connect(url)
            .await?;
        Ok(PooledPgStore { pool })
    }
}

#[async_trait]
impl WorldStore for PooledPgStore {
    async fn find_world(&self, id: i32) -> Result<World, MazurkaError> {
        sqlx::query_as::<_, World>(SELECT_WORLD_SQL)
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| MazurkaError::lookup_failed(id, e))
    }

    async fn update_worlds(&self, rows: &[World]) -> Result<(), MazurkaError> {
        if rows.is_empty() {
            return Ok(());
        }
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| MazurkaError::batch_update(e))?;

        // Rows are pre-sorted ascending, so row locks are acquired in the
        // global order. On error the transaction rolls back when dropped.
        for w in rows {
            sqlx::query(UPDATE_WORLD_SQL)
                .bind(w.random_number)
                .bind(w.id)
                .execute(&mut *tx)
                .await
                .map_err(|e| MazurkaError::batch_update(e))?;
        }

        tx.commit().await.map_err(|e| MazurkaError::batch_update(e))
    }

    async fn list_fortunes(&self) -> Result<Vec<Fortune>, MazurkaError> {
        Ok(sqlx::query_as::<_, Fortune>(SELECT_FORTUNE_SQL)
            .fetch_all(&self.pool)
            .await?)
    }
}
