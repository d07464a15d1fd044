//! Block processor and batch driver.
//!
//! The hot path of the indexer: strictly single-threaded, runs entirely
//! inside one database transaction per batch, and owns the three pieces
//! of volatile state the pipeline needs between blocks: the cached head
//! date, the staged block headers, and the advisory ops-stats counters.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::time::Instant;

use chrono::NaiveDateTime;

use hivemind_storage::blocks::records::NewBlockHeader;
use hivemind_storage::{ConnectionPool, QueryResult, StorageProcessor};
use hivemind_types::{BlockNumber, Operation, SignedBlock};

use crate::domain::Domains;
use crate::error::SyncError;
use crate::provider::BlockProvider;

use self::vops::{prepare_vops, VopAggregates};

pub mod router;
pub mod vops;

#[cfg(test)]
mod tests;

/// Where a block's virtual operations come from.
///
/// Massive sync preloads them alongside the block batches; live sync
/// requests them per block.
pub enum VopsSupply<'a> {
    Preloaded(&'a HashMap<u32, VopAggregates>),
    Live(&'a dyn BlockProvider),
}

#[derive(Debug)]
pub struct BlockProcessor {
    /// Operations of the block being processed are tagged with the date
    /// of the *previous* block, matching how the node itself applies
    /// them. `None` until the first block of this process.
    head_block_date: Option<NaiveDateTime>,
    /// Headers staged for the next block-store flush.
    blocks_to_flush: Vec<NewBlockHeader>,
    /// Advisory per-type counters, process-lifetime scoped.
    ops_stats: BTreeMap<String, u64>,
}

impl BlockProcessor {
    pub fn new(head_block_date: Option<NaiveDateTime>) -> Self {
        Self {
            head_block_date,
            blocks_to_flush: Vec::new(),
            ops_stats: BTreeMap::new(),
        }
    }

    /// Seeds the head-date cache from the persisted head.
    pub async fn restore(storage: &mut StorageProcessor<'_>) -> QueryResult<Self> {
        let head_date = storage.blocks_schema().head_date().await?;
        Ok(Self::new(head_date))
    }

    pub fn ops_stats(&self) -> &BTreeMap<String, u64> {
        &self.ops_stats
    }

    pub fn head_block_date(&self) -> Option<NaiveDateTime> {
        self.head_block_date
    }

    pub fn merge_ops_stats(target: &mut BTreeMap<String, u64>, other: &BTreeMap<String, u64>) {
        for (tag, count) in other {
            *target.entry(tag.clone()).or_insert(0) += count;
        }
    }

    /// Processes a single block; must be called inside an open
    /// transaction. Returns the block's height.
    pub async fn process(
        &mut self,
        domains: &mut Domains,
        block: &SignedBlock,
        vops: &VopsSupply<'_>,
        is_initial_sync: bool,
    ) -> anyhow::Result<BlockNumber> {
        let num = block.num()?;

        self.blocks_to_flush.push(NewBlockHeader {
            num: *num,
            hash: block.block_id.clone(),
            prev: block.previous.clone(),
            txs: block.transactions.len() as i32,
            ops: block.ops_count() as i32,
            created_at: block.timestamp,
        });

        // The very first block bootstraps the date with its own timestamp.
        if self.head_block_date.is_none() {
            self.head_block_date = Some(block.timestamp);
        }
        let date = self.head_block_date.unwrap_or(block.timestamp);

        let txs = block
            .transactions
            .iter()
            .map(|tx| {
                tx.operations
                    .iter()
                    .map(Operation::decode)
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect::<Result<Vec<_>, _>>()?;

        // Pass 1 must finish before any dispatch: later operations of
        // this block may reference accounts it introduces.
        let new_accounts = router::discover_accounts(&txs);
        domains.accounts.register(new_accounts, date);

        let json_ops = router::dispatch_block(
            &txs,
            num,
            date,
            is_initial_sync,
            domains,
            &mut self.ops_stats,
        )?;
        if !json_ops.is_empty() {
            let custom_stats = domains.custom_json_batch(&json_ops, num, date);
            Self::merge_ops_stats(&mut self.ops_stats, &custom_stats);
        }

        let aggregates = match vops {
            VopsSupply::Preloaded(map) => map.get(&*num).cloned().unwrap_or_default(),
            VopsSupply::Live(provider) => prepare_vops(&provider.get_virtual_ops(num).await?),
        };

        for vote in aggregates.effective_votes.values() {
            domains.effective_vote(vote, date);
        }
        if !aggregates.comment_payouts.is_empty() {
            let payout_stats = domains.comment_payouts(&aggregates.comment_payouts, date)?;
            Self::merge_ops_stats(&mut self.ops_stats, &payout_stats);
        }

        self.head_block_date = Some(block.timestamp);

        Ok(num)
    }

    /// Processes a batch of blocks in one transaction.
    ///
    /// Nothing of a failed batch survives: the transaction rolls back,
    /// staged domain writes are discarded, and the processor's volatile
    /// state is restored to its pre-batch snapshot.
    pub async fn process_multi(
        &mut self,
        pool: &ConnectionPool,
        domains: &mut Domains,
        blocks: &[SignedBlock],
        vops: &VopsSupply<'_>,
        is_initial_sync: bool,
    ) -> Result<(), SyncError> {
        if blocks.is_empty() {
            return Ok(());
        }
        let start = Instant::now();

        let head_date_snapshot = self.head_block_date;
        let stats_snapshot = self.ops_stats.clone();

        let result = self
            .run_batch(pool, domains, blocks, vops, is_initial_sync)
            .await;
        if result.is_err() {
            self.head_block_date = head_date_snapshot;
            self.ops_stats = stats_snapshot;
            self.blocks_to_flush.clear();
            domains.clear();
            return result;
        }

        log::info!(
            "[PROCESS MULTI] {} blocks in {:.4}s",
            blocks.len(),
            start.elapsed().as_secs_f64()
        );
        Ok(())
    }

    async fn run_batch(
        &mut self,
        pool: &ConnectionPool,
        domains: &mut Domains,
        blocks: &[SignedBlock],
        vops: &VopsSupply<'_>,
        is_initial_sync: bool,
    ) -> Result<(), SyncError> {
        let mut storage = pool.access_storage().await?;
        let mut transaction = storage.start_transaction().await?;

        for block in blocks {
            // Derived up front so a failure can report the offending height.
            let num = block.num().map_err(SyncError::BlockId)?;
            if let Err(source) = self.process(domains, block, vops, is_initial_sync).await {
                log::error!("exception encountered block {}", num);
                return Err(SyncError::Block { num, source });
            }
        }

        // Fixed flush order: domain side-tables first, the block headers
        // last, so the head cursor only advances when everything else
        // already succeeded.
        domains.flush_batch(&mut transaction).await?;
        transaction
            .blocks_schema()
            .save_blocks(&self.blocks_to_flush)
            .await?;
        self.blocks_to_flush.clear();

        // Follow flush runs on its own connection, outside the batch
        // transaction; see `Domains::flush_follows`.
        if domains.has_follows() {
            let mut follow_storage = pool.access_storage().await?;
            domains.flush_follows(&mut follow_storage).await?;
        }

        transaction.commit().await?;
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn staged_headers(&self) -> &[NewBlockHeader] {
        &self.blocks_to_flush
    }
}
