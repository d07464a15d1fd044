//! Signed block as served by the HAF block log.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{operation::RawOperation, BlockNumber};

#[derive(Debug, Error, PartialEq)]
pub enum BlockIdError {
    #[error("block id `{0}` is too short")]
    TooShort(String),
    #[error("block id `{0}` does not start with a hex-encoded height")]
    NotHex(String),
}

/// One transaction of a signed block. Only the operation list is relevant
/// to the indexer; signatures and expirations are dropped at decode time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub operations: Vec<RawOperation>,
}

/// A signed chain record: an ordered list of transactions plus the
/// producer timestamp. `block_id` and `previous` are hex digest strings;
/// the first four bytes of a digest are the big-endian block height.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedBlock {
    pub block_id: String,
    pub previous: String,
    pub timestamp: NaiveDateTime,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
}

impl SignedBlock {
    /// Derives the block height from the id digest.
    pub fn num(&self) -> Result<BlockNumber, BlockIdError> {
        num_from_hash(&self.block_id)
    }

    /// Total operation count over all transactions.
    pub fn ops_count(&self) -> usize {
        self.transactions.iter().map(|tx| tx.operations.len()).sum()
    }
}

/// Big-endian height encoded in the first 8 hex characters of a block id.
pub fn num_from_hash(block_id: &str) -> Result<BlockNumber, BlockIdError> {
    let prefix = block_id
        .get(..8)
        .ok_or_else(|| BlockIdError::TooShort(block_id.to_string()))?;
    u32::from_str_radix(prefix, 16)
        .map(BlockNumber)
        .map_err(|_| BlockIdError::NotHex(block_id.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn num_is_derived_from_id_prefix() {
        assert_eq!(num_from_hash("000000010a42b6f2"), Ok(BlockNumber(1)));
        assert_eq!(num_from_hash("004c4b40deadbeef"), Ok(BlockNumber(5_000_000)));
    }

    #[test]
    fn malformed_ids_are_rejected() {
        assert_eq!(
            num_from_hash("0001"),
            Err(BlockIdError::TooShort("0001".into()))
        );
        assert_eq!(
            num_from_hash("zzzzzzzz00"),
            Err(BlockIdError::NotHex("zzzzzzzz00".into()))
        );
    }

    #[test]
    fn block_decodes_from_haf_json() {
        let block: SignedBlock = serde_json::from_str(
            r#"{
                "block_id": "000000010a42b6f2",
                "previous": "0000000000000000",
                "timestamp": "2016-03-24T16:05:00",
                "transactions": [
                    {"operations": [{"type": "vote_operation", "value": {
                        "voter": "alice", "author": "bob", "permlink": "p", "weight": 10000
                    }}]}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(block.num().unwrap(), BlockNumber(1));
        assert_eq!(block.ops_count(), 1);
    }
}
