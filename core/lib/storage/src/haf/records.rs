// External imports
use serde_json::Value;
use sqlx::FromRow;
// Workspace imports
// Local imports

/// One block's worth of virtual operations, as returned by the range fetch.
#[derive(Debug, FromRow)]
pub struct VirtualOpsRow {
    pub block_num: i32,
    pub ops: Value,
}
