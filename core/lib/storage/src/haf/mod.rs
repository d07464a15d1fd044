//! Access to the HAF facility: the application context primitives that
//! gate the indexer's visibility of new blocks, and the block / virtual
//! operation fetches against the HAF views.
//!
//! A context is a named cursor over the chain's block table; detaching it
//! suspends index and trigger maintenance for the bulk-ingestion mode.

// Built-in deps
use std::time::Instant;
// External imports
use serde_json::Value;
// Workspace imports
use hivemind_types::{BlockNumber, RawOperation, SignedBlock};
// Local imports
use self::records::VirtualOpsRow;
use crate::{QueryResult, StorageProcessor};

pub mod records;

/// Name of the application context and schema this indexer registers
/// with the HAF facility.
pub const APP_CONTEXT: &str = "hivemind_app";

#[derive(Debug)]
pub struct HafSchema<'a, 'c>(pub &'a mut StorageProcessor<'c>);

impl<'a, 'c> HafSchema<'a, 'c> {
    pub async fn context_exists(&mut self) -> QueryResult<bool> {
        let exists: bool = sqlx::query_scalar("SELECT hive.app_context_exists($1)")
            .bind(APP_CONTEXT)
            .fetch_one(self.0.conn())
            .await?;
        Ok(exists)
    }

    pub async fn create_context(&mut self) -> QueryResult<()> {
        sqlx::query("SELECT hive.app_create_context($1)")
            .bind(APP_CONTEXT)
            .execute(self.0.conn())
            .await?;
        Ok(())
    }

    pub async fn context_is_attached(&mut self) -> QueryResult<bool> {
        let attached: bool = sqlx::query_scalar("SELECT hive.app_context_is_attached($1)")
            .bind(APP_CONTEXT)
            .fetch_one(self.0.conn())
            .await?;
        Ok(attached)
    }

    /// Detaches the context. Raises upstream when already detached; the
    /// caller is expected to pre-check with [`Self::context_is_attached`].
    pub async fn context_detach(&mut self) -> QueryResult<()> {
        sqlx::query("SELECT hive.app_context_detach($1)")
            .bind(APP_CONTEXT)
            .execute(self.0.conn())
            .await?;
        Ok(())
    }

    /// Attaches the context pointing it at `num`. Raises upstream when
    /// already attached.
    pub async fn context_attach(&mut self, num: BlockNumber) -> QueryResult<()> {
        sqlx::query("SELECT hive.app_context_attach($1, $2)")
            .bind(APP_CONTEXT)
            .bind(*num as i32)
            .execute(self.0.conn())
            .await?;
        Ok(())
    }

    /// The inclusive range of unprocessed blocks currently advertised for
    /// this context, queried under its own short transaction.
    pub async fn next_block(&mut self) -> QueryResult<Option<(BlockNumber, BlockNumber)>> {
        let start = Instant::now();
        let mut transaction = self.0.start_transaction().await?;

        let range: (Option<i32>, Option<i32>) =
            sqlx::query_as("SELECT * FROM hive.app_next_block($1)")
                .bind(APP_CONTEXT)
                .fetch_one(transaction.conn())
                .await?;

        transaction.commit().await?;
        metrics::histogram!("sql.haf.next_block", start.elapsed());

        Ok(match range {
            (Some(lbound), Some(ubound)) => {
                Some((BlockNumber(lbound as u32), BlockNumber(ubound as u32)))
            }
            _ => None,
        })
    }

    /// Height past which the chain cannot reorganise.
    pub async fn last_irreversible_block(&mut self) -> QueryResult<BlockNumber> {
        let num: i32 = sqlx::query_scalar("SELECT hive.app_get_irreversible_block()")
            .fetch_one(self.0.conn())
            .await?;
        Ok(BlockNumber(num as u32))
    }

    /// Fetches one full signed block, `None` past the end of the block log.
    pub async fn get_block(&mut self, num: BlockNumber) -> QueryResult<Option<SignedBlock>> {
        let start = Instant::now();
        let raw: Option<Value> = sqlx::query_scalar("SELECT hive.get_block_json($1)")
            .bind(*num as i32)
            .fetch_one(self.0.conn())
            .await?;

        metrics::histogram!("sql.haf.get_block", start.elapsed());
        match raw {
            Some(value) if !value.is_null() => Ok(Some(serde_json::from_value(value)?)),
            _ => Ok(None),
        }
    }

    /// Fetches the inclusive `[lbound, ubound]` range of signed blocks,
    /// ascending.
    pub async fn get_block_range(
        &mut self,
        lbound: BlockNumber,
        ubound: BlockNumber,
    ) -> QueryResult<Vec<SignedBlock>> {
        let start = Instant::now();
        let rows: Vec<Value> =
            sqlx::query_scalar("SELECT * FROM hive.get_block_range_json($1, $2)")
                .bind(*lbound as i32)
                .bind(*ubound as i32)
                .fetch_all(self.0.conn())
                .await?;

        let blocks = rows
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<SignedBlock>, _>>()?;

        metrics::histogram!("sql.haf.get_block_range", start.elapsed());
        Ok(blocks)
    }

    /// Raw virtual operations emitted for one block.
    pub async fn get_virtual_ops(&mut self, num: BlockNumber) -> QueryResult<Vec<RawOperation>> {
        let start = Instant::now();
        let raw: Option<Value> = sqlx::query_scalar("SELECT hive.get_virtual_operations_json($1)")
            .bind(*num as i32)
            .fetch_one(self.0.conn())
            .await?;

        metrics::histogram!("sql.haf.get_virtual_ops", start.elapsed());
        match raw {
            Some(value) if !value.is_null() => Ok(serde_json::from_value(value)?),
            _ => Ok(Vec::new()),
        }
    }

    /// Raw virtual operations for every block of the inclusive range,
    /// keyed by height. Heights with no vops are absent.
    pub async fn get_virtual_ops_range(
        &mut self,
        lbound: BlockNumber,
        ubound: BlockNumber,
    ) -> QueryResult<Vec<(BlockNumber, Vec<RawOperation>)>> {
        let start = Instant::now();
        let rows = sqlx::query_as::<_, VirtualOpsRow>(
            "SELECT block_num, ops FROM hive.get_virtual_operations_range_json($1, $2) \
                 AS r(block_num, ops) \
             ORDER BY block_num",
        )
        .bind(*lbound as i32)
        .bind(*ubound as i32)
        .fetch_all(self.0.conn())
        .await?;

        let mut result = Vec::with_capacity(rows.len());
        for row in rows {
            let ops: Vec<RawOperation> = serde_json::from_value(row.ops)?;
            result.push((BlockNumber(row.block_num as u32), ops));
        }

        metrics::histogram!("sql.haf.get_virtual_ops_range", start.elapsed());
        Ok(result)
    }
}
