use rand::Rng;
use serde::Serialize;

/// Number of pre-populated rows in the `world` table, ids 1..=10000.
pub const WORLD_TABLE_SIZE: i32 = 10_000;

/// Maximum number of queries allowed per request.
pub const MAX_QUERIES: usize = 500;

/// A row of the fixed-cardinality `world` table.
///
/// Rows are never created or destroyed at runtime; `random_number` is
/// mutated only through [`crate::storage::WorldStore::update_worlds`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct World {
    pub id: i32,
    #[serde(rename = "randomNumber")]
    #[sqlx(rename = "randomnumber")]
    pub random_number: i32,
}

/// A row of the `fortune` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Fortune {
    pub id: i32,
    pub message: String,
}

/// A uniformly random world id in [1, 10000].
///
/// Uses the thread-local generator — per-task state, never a process-wide
/// lock that would serialize concurrent requests.
#[inline]
pub fn random_world_id() -> i32 {
    rand::thread_rng().gen_range(1..=WORLD_TABLE_SIZE)
}

/// A fresh random value for a world's `randomNumber` field.
///
/// Same distribution as the ids.
#[inline]
pub fn random_world_value() -> i32 {
    rand::thread_rng().gen_range(1..=WORLD_TABLE_SIZE)
}
