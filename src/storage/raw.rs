//! Raw driver backend: one multiplexed `tokio-postgres` connection.
//!
//! The connection task is spawned once at startup and all queries are
//! pipelined over it — N concurrent point lookups become N in-flight
//! portals on a single socket, the same strategy the fastest TechEmpower
//! entries use instead of a pool.
//!
//! Batch updates are a single aggregated statement:
//!
//! ```sql
//! UPDATE world SET randomnumber = v.randomnumber
//! FROM (VALUES ($1::int4, $2::int4), ...) AS v (id, randomnumber)
//! WHERE world.id = v.id
//! ```
//!
//! One round trip regardless of batch size, atomic by construction, and a
//! prepared-statement cache keyed by batch size (a bounded set — sizes
//! 1..=500) avoids re-planning.

use std::collections::HashMap;
use std::fmt::Write as _;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, NoTls, Statement};

use crate::error::MazurkaError;
use crate::models::{Fortune, World};
use crate::storage::{SELECT_FORTUNE_SQL, SELECT_WORLD_SQL, WorldStore};

pub struct RawPgStore {
    client: Client,
    select_world: Statement,
    select_fortunes: Statement,
    /// Prepared aggregated-update statements, keyed by batch size.
    update_cache: RwLock<HashMap<usize, Statement>>,
}

/// Build the aggregated batch-update statement for `n` rows.
///
/// Placeholders are interleaved `(id, randomnumber)` pairs, so the
/// parameter list for row `i` is `($2i+1, $2i+2)`.
pub fn batch_update_sql(n: usize) -> String {
    let mut sql = String::with_capacity(80 + n * 24);
    sql.push_str("UPDATE world SET randomnumber = v.randomnumber FROM (VALUES ");
    for i in 0..n {
        if i > 0 {
            sql.push_str(", ");
        }
        let _ = write!(sql, "(${}::int4, ${}::int4)", 2 * i + 1, 2 * i + 2);
    }
    sql.push_str(") AS v (id, randomnumber) WHERE world.id = v.id");
    sql
}

/// Collapse duplicate ids in an ascending-sorted batch, keeping the last
/// occurrence of each id.
///
/// Postgres rejects (or picks an arbitrary row for) an `UPDATE ... FROM`
/// whose join matches the same target row twice, so the aggregated
/// statement must see each id once. The input sort is stable, so "last
/// occurrence" here is the last occurrence in selection order as well.
pub fn dedup_last_occurrence(sorted: &[World]) -> Vec<World> {
    let mut out: Vec<World> = Vec::with_capacity(sorted.len());
    for w in sorted {
        if let Some(last) = out.last_mut() {
            if last.id == w.id {
                *last = *w;
                continue;
            }
        }
        out.push(*w);
    }
    out
}

impl RawPgStore {
    /// Connect and prepare the fixed statements.
    pub async fn connect(url: &str) -> Result<Self, MazurkaError> {
        let (client, connection) = tokio_postgres::connect(url, NoTls).await?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!("postgres connection error: {e}");
            }
        });

        let select_world = client.prepare(SELECT_WORLD_SQL).await?;
        let select_fortunes = client.prepare(SELECT_FORTUNE_SQL).await?;

        Ok(RawPgStore {
            client,
            select_world,
            select_fortunes,
            update_cache: RwLock::new(HashMap::new()),
        })
    }

    async fn update_statement(&self, n: usize) -> Result<Statement, tokio_postgres::Error> {
        if let Some(stmt) = self.update_cache.read().await.get(&n) {
            return Ok(stmt.clone());
        }
        let stmt = self.client.prepare(&batch_update_sql(n)).await?;
        self.update_cache
            .write()
            .await
            .entry(n)
            .or_insert_with(|| stmt.clone());
        Ok(stmt)
    }
}

#[async_trait]
impl WorldStore for RawPgStore {
    async fn find_world(&self, id: i32) -> Result<World, MazurkaError> {
        let row = self
            .client
            .query_one(&self.select_world, &[&id])
            .await
            .map_err(|e| MazurkaError::lookup_failed(id, e))?;
        Ok(World {
            id: row.get(0),
            random_number: row.get(1),
        })
    }

    async fn update_worlds(&self, rows: &[World]) -> Result<(), MazurkaError> {
        if rows.is_empty() {
            return Ok(());
        }
        let rows = dedup_last_occurrence(rows);
        let stmt = self
            .update_statement(rows.len())
            .await
            .map_err(|e| MazurkaError::batch_update(e))?;

        let mut params: Vec<&(dyn ToSql + Sync)> = Vec::with_capacity(rows.len() * 2);
        for w in &rows {
            params.push(&w.id);
            params.push(&w.random_number);
        }

        self.client
            .execute(&stmt, &params)
            .await
            .map_err(|e| MazurkaError::batch_update(e))?;
        Ok(())
    }

    async fn list_fortunes(&self) -> Result<Vec<Fortune>, MazurkaError> {
        let rows = self.client.query(&self.select_fortunes, &[]).await?;
        Ok(rows
            .iter()
            .map(|row| Fortune {
                id: row.get(0),
                message: row.get(1),
            })
            .collect())
    }
}
