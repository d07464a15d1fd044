//! Error taxonomy of the ingestion core.
//!
//! Database failures are considered transient: the batch aborts, nothing
//! is committed, and the outer loop decides whether to retry or stop.
//! Everything else is a fatal condition the operator must resolve.

use hivemind_types::{BlockIdError, BlockNumber};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("database error: {0}")]
    Db(#[from] anyhow::Error),

    #[error("failure while processing block {num}: {source}")]
    Block {
        num: BlockNumber,
        #[source]
        source: anyhow::Error,
    },

    #[error("malformed block id: {0}")]
    BlockId(#[from] BlockIdError),

    #[error("fork too deep: local head {head} still diverges at {cursor}")]
    ForkTooDeep { head: BlockNumber, cursor: BlockNumber },

    #[error(
        "not proceeding until head is irreversible: \
         divergence point {cursor} is above last irreversible {last_irreversible}"
    )]
    NotIrreversible {
        cursor: BlockNumber,
        last_irreversible: BlockNumber,
    },

    #[error("can only pop the head block: tried {num}, head is {head}")]
    PopNonHead { num: BlockNumber, head: BlockNumber },

    #[error("`hive_blocks` table failed the consistency check")]
    InconsistentBlocks,

    #[error("log_explain_queries requires a SUPERUSER database connection")]
    NotSuperuser,
}

impl SyncError {
    /// Fatal errors abort the process; the rest abort only the current
    /// batch.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ForkTooDeep { .. }
                | Self::NotIrreversible { .. }
                | Self::PopNonHead { .. }
                | Self::InconsistentBlocks
                | Self::NotSuperuser
        )
    }
}
