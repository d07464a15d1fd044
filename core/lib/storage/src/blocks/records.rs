// External imports
use chrono::NaiveDateTime;
use sqlx::FromRow;
// Workspace imports
// Local imports

/// Persisted `hive_blocks` row.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct StorageBlockHeader {
    pub num: i32,
    pub hash: String,
    pub prev: String,
    pub txs: i32,
    pub ops: i32,
    pub created_at: NaiveDateTime,
}

/// Header staged for the next flush of the block store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewBlockHeader {
    pub num: u32,
    pub hash: String,
    pub prev: String,
    pub txs: i32,
    pub ops: i32,
    pub created_at: NaiveDateTime,
}
