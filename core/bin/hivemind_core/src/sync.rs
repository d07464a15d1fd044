//! Sync manager: the outer loop that keeps the local head moving in
//! lock-step with the upstream block log.
//!
//! Two modes. Massive sync detaches the application context, prefetches
//! large batches on a producer task and drains them through the batch
//! driver; it is entered whenever the upstream advertises a backlog.
//! Single sync tracks the live head one block at a time with the context
//! attached, interleaving the periodic maintenance actions.

use std::sync::Arc;
use std::time::Duration;

use hivemind_config::SyncConfig;
use hivemind_storage::ConnectionPool;
use hivemind_types::{BlockNumber, SignedBlock};

use crate::domain::Domains;
use crate::error::SyncError;
use crate::fork;
use crate::processor::{BlockProcessor, VopsSupply};
use crate::provider::{spawn_block_fetcher, BlockProvider};
use crate::signal::ShutdownFlag;

/// Ranges longer than this are worth the context detach/attach cost.
const MASSIVE_SYNC_THRESHOLD: u32 = 100;
/// Upper bound on the number of blocks per transaction while draining a
/// prefetched batch.
const BLOCKS_PER_TRANSACTION: usize = 1000;
/// Community ranks are refreshed every this many blocks (~10 min).
const COMMUNITY_RANK_INTERVAL: u32 = 200;
/// Payout stats and mentions are regenerated every this many blocks (~1 h).
const HOURLY_STATS_INTERVAL: u32 = 1200;
/// Idle wait when the upstream has nothing new.
const IDLE_WAIT: Duration = Duration::from_secs(1);

/// One iteration's processing plan, derived from the advertised range and
/// the test-mode clamps.
#[derive(Debug, PartialEq, Eq)]
struct RangePlan {
    lbound: u32,
    ubound: u32,
    massive: bool,
    /// The planned range extends past the database's known blocks into
    /// mock data.
    mocks_tail: bool,
}

fn plan_range(
    head: u32,
    next: Option<(u32, u32)>,
    test_max_block: Option<u32>,
    last_block_for_massive: Option<u32>,
) -> Option<RangePlan> {
    let mut allow_massive = true;
    let mut mocks_tail = false;
    let (mut lbound, mut ubound) = match next {
        Some((lbound, ubound)) => (Some(lbound), Some(ubound)),
        None => (None, None),
    };

    if let (Some(boundary), Some(lo)) = (last_block_for_massive, lbound) {
        if lo < boundary {
            ubound = ubound.map(|up| up.min(boundary));
        }
        if lo > boundary {
            allow_massive = false;
        }
    }

    if let Some(cap) = test_max_block {
        if let Some(up) = ubound {
            ubound = Some(up.min(cap));
        } else {
            // All blocks of the database processed; the remaining trail
            // up to the cap can only come from mock data.
            lbound = Some(head + 1);
            ubound = Some(cap);
            mocks_tail = true;
        }
    }

    let (lbound, ubound) = match (lbound, ubound) {
        (Some(lo), Some(up)) if lo <= up => (lo, up),
        _ => return None,
    };

    Some(RangePlan {
        lbound,
        ubound,
        massive: ubound - lbound > MASSIVE_SYNC_THRESHOLD && allow_massive,
        mocks_tail,
    })
}

pub struct SyncManager<P: BlockProvider + 'static> {
    config: SyncConfig,
    pool: ConnectionPool,
    provider: Arc<P>,
    shutdown: ShutdownFlag,
    domains: Domains,
    processor: BlockProcessor,
    were_mocks_after_db_blocks: bool,
}

impl<P: BlockProvider + 'static> SyncManager<P> {
    /// Startup protocol: consistency check, context registration, account
    /// prefetch, initial rank refresh.
    pub async fn new(
        config: SyncConfig,
        pool: ConnectionPool,
        provider: Arc<P>,
        shutdown: ShutdownFlag,
    ) -> Result<Self, SyncError> {
        let mut storage = pool.access_storage().await?;

        if !storage.blocks_schema().is_consistent().await? {
            return Err(SyncError::InconsistentBlocks);
        }
        if config.log_explain_queries && !storage.maintenance_schema().is_superuser().await? {
            return Err(SyncError::NotSuperuser);
        }

        if !storage.haf_schema().context_exists().await? {
            log::info!("No application context present. Attempting to create one...");
            storage.haf_schema().create_context().await?;
            log::info!("Application context creation done.");
        }

        let mut domains = Domains::new();
        let names = storage.chain_schema().load_account_names().await?;
        log::info!("Prefetched {} account names", names.len());
        domains.accounts.load(names);

        storage
            .maintenance_schema()
            .update_communities_posts_and_rank(BlockNumber(config.community_start_block))
            .await?;

        let processor = BlockProcessor::restore(&mut storage).await?;
        drop(storage);

        Ok(Self {
            config,
            pool,
            provider,
            shutdown,
            domains,
            processor,
            were_mocks_after_db_blocks: false,
        })
    }

    pub fn ops_stats(&self) -> &std::collections::BTreeMap<String, u64> {
        self.processor.ops_stats()
    }

    /// Runs fork recovery and then the main loop, until the shutdown
    /// latch is raised or the test cap is reached.
    pub async fn run(&mut self) -> Result<(), SyncError> {
        fork::verify_head(&self.pool, &*self.provider).await?;

        loop {
            if self.shutdown.is_raised() {
                break;
            }

            let head = {
                let mut storage = self.pool.access_storage().await?;
                storage.blocks_schema().head_num().await?
            };
            log::info!("Last imported block is: {}", head);

            if let Some(cap) = self.config.test_max_block {
                if *head >= cap {
                    log::info!("REACHED test_max_block of {}", cap);
                    break;
                }
            }

            let next = self.provider.next_block_range().await?;
            let plan = match plan_range(
                *head,
                next.map(|(lo, up)| (*lo, *up)),
                self.config.test_max_block,
                self.config.test_last_block_for_massive,
            ) {
                Some(plan) => plan,
                None => {
                    tokio::time::sleep(IDLE_WAIT).await;
                    continue;
                }
            };
            if plan.mocks_tail {
                self.were_mocks_after_db_blocks = true;
            }

            if plan.massive {
                log::info!("[MASSIVE] *** MASSIVE blocks processing ***");
                log::info!("[MASSIVE] target range: <{}:{}>", plan.lbound, plan.ubound);
                self.massive_sync(BlockNumber(plan.lbound), BlockNumber(plan.ubound))
                    .await?;
            } else {
                log::info!("[SINGLE] *** SINGLE block processing ***");
                self.single_sync(BlockNumber(plan.lbound)).await?;
            }
        }

        self.finalize().await
    }

    /// Bulk ingestion with a detached context: one producer task
    /// prefetching, the manager task consuming. Either side's failure is
    /// re-raised here after both have settled.
    async fn massive_sync(
        &mut self,
        lbound: BlockNumber,
        ubound: BlockNumber,
    ) -> Result<(), SyncError> {
        self.context_detach().await?;

        let (mut rx, producer) = spawn_block_fetcher(
            self.provider.clone(),
            lbound,
            ubound,
            self.config.max_batch,
            self.shutdown.clone(),
        );

        let mut consumer_result: Result<(), SyncError> = Ok(());
        'consume: while let Some(batch) = rx.recv().await {
            for chunk in batch.blocks.chunks(BLOCKS_PER_TRANSACTION) {
                if self.shutdown.is_raised() {
                    break 'consume;
                }

                let supply = VopsSupply::Preloaded(&batch.vops);
                if let Err(err) = self
                    .processor
                    .process_multi(&self.pool, &mut self.domains, chunk, &supply, true)
                    .await
                {
                    consumer_result = Err(err);
                    break 'consume;
                }

                if let Some(last) = chunk.last() {
                    log::info!(
                        "[MASSIVE] Got block {} @ {}",
                        last.num().map(|num| *num).unwrap_or_default(),
                        last.timestamp
                    );
                }
            }
        }
        drop(rx);

        let producer_result = producer.await;
        consumer_result?;
        match producer_result {
            Ok(Ok(())) => {}
            Ok(Err(err)) => return Err(SyncError::Db(err)),
            Err(join_err) => {
                return Err(SyncError::Db(anyhow::anyhow!(
                    "block fetcher task failed: {}",
                    join_err
                )))
            }
        }

        self.context_attach().await
    }

    /// Live-head tracking with an attached context.
    async fn single_sync(&mut self, lbound: BlockNumber) -> Result<(), SyncError> {
        let block = match self.provider.get_block(lbound).await? {
            Some(block) => block,
            None => {
                tokio::time::sleep(IDLE_WAIT).await;
                return Ok(());
            }
        };
        let num = block.num().map_err(SyncError::BlockId)?;

        let supply = VopsSupply::Live(&*self.provider);
        self.processor
            .process_multi(
                &self.pool,
                &mut self.domains,
                std::slice::from_ref(&block),
                &supply,
                false,
            )
            .await?;

        self.periodic_actions(num, &block).await
    }

    /// Maintenance interleaved with live blocks, scheduled off the block
    /// height.
    async fn periodic_actions(
        &mut self,
        num: BlockNumber,
        block: &SignedBlock,
    ) -> Result<(), SyncError> {
        if *num % HOURLY_STATS_INTERVAL == 0 {
            log::warn!("head block {} @ {}", num, block.timestamp);
            log::info!("[SINGLE] hourly stats");

            let payout_pool = self.pool.clone();
            let payout_task = tokio::spawn(async move {
                let mut storage = payout_pool.access_storage().await?;
                storage.maintenance_schema().generate_payout_stats().await
            });
            let mentions_pool = self.pool.clone();
            let mentions_task = tokio::spawn(async move {
                let mut storage = mentions_pool.access_storage().await?;
                storage.maintenance_schema().refresh_mentions().await
            });

            let (payout_result, mentions_result) = tokio::join!(payout_task, mentions_task);
            for (name, result) in vec![
                ("payout stats", payout_result),
                ("mentions", mentions_result),
            ] {
                match result {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => log::error!("{} regeneration failed: {:#}", name, err),
                    Err(err) => log::error!("{} task failed: {}", name, err),
                }
            }
        } else if *num % COMMUNITY_RANK_INTERVAL == 0 {
            log::info!("[SINGLE] updating communities posts and rank");
            let mut storage = self.pool.access_storage().await?;
            storage
                .maintenance_schema()
                .update_communities_posts_and_rank(BlockNumber(self.config.community_start_block))
                .await?;
        }

        Ok(())
    }

    async fn context_detach(&self) -> Result<(), SyncError> {
        let mut storage = self.pool.access_storage().await?;
        if storage.haf_schema().context_is_attached().await? {
            log::info!("Trying to detach app context...");
            storage.haf_schema().context_detach().await?;
            log::info!("App context detaching done.");
        } else {
            log::info!("No attached context - detach skipped.");
        }
        Ok(())
    }

    async fn context_attach(&self) -> Result<(), SyncError> {
        let mut storage = self.pool.access_storage().await?;
        let head = storage.blocks_schema().head_num().await?;
        log::info!("Trying to attach app context with block number: {}", head);
        storage.haf_schema().context_attach(head).await?;
        log::info!("App context attaching done.");
        Ok(())
    }

    /// Shutdown protocol: leave the context attached at the current head,
    /// unless mock blocks extended past the database's known range, and
    /// refresh the payout stats a final time.
    async fn finalize(&mut self) -> Result<(), SyncError> {
        if !self.were_mocks_after_db_blocks {
            self.context_detach().await?;
            self.context_attach().await?;
        }

        let mut storage = self.pool.access_storage().await?;
        storage.maintenance_schema().generate_payout_stats().await?;

        log::info!("Exiting synchronization");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backlogs_enter_massive_mode() {
        let plan = plan_range(0, Some((1, 500)), None, None).unwrap();
        assert_eq!(
            plan,
            RangePlan {
                lbound: 1,
                ubound: 500,
                massive: true,
                mocks_tail: false
            }
        );
    }

    #[test]
    fn short_ranges_stay_in_single_mode() {
        let plan = plan_range(899, Some((900, 1000)), None, None).unwrap();
        assert!(!plan.massive);

        // Strictly more than the threshold is required.
        let boundary = plan_range(0, Some((1, 101)), None, None).unwrap();
        assert!(!boundary.massive);
        let past = plan_range(0, Some((1, 102)), None, None).unwrap();
        assert!(past.massive);
    }

    #[test]
    fn no_advertised_range_means_idle() {
        assert_eq!(plan_range(1000, None, None, None), None);
    }

    #[test]
    fn massive_boundary_clamps_and_then_forces_single() {
        // Below the boundary: the massive run is cut at it.
        let plan = plan_range(0, Some((1, 9000)), None, Some(5000)).unwrap();
        assert_eq!(plan.ubound, 5000);
        assert!(plan.massive);

        // Past the boundary: massive is not allowed regardless of backlog.
        let plan = plan_range(5000, Some((5001, 9000)), None, Some(5000)).unwrap();
        assert_eq!(plan.ubound, 9000);
        assert!(!plan.massive);
    }

    #[test]
    fn test_cap_clamps_the_upper_bound() {
        let plan = plan_range(0, Some((1, 9000)), Some(300), None).unwrap();
        assert_eq!(plan.ubound, 300);
        assert!(!plan.mocks_tail);
    }

    #[test]
    fn exhausted_database_extends_into_mocks() {
        let plan = plan_range(120, None, Some(150), None).unwrap();
        assert_eq!(
            plan,
            RangePlan {
                lbound: 121,
                ubound: 150,
                massive: false,
                mocks_tail: true
            }
        );
    }

    #[test]
    fn cap_below_head_plans_nothing() {
        assert_eq!(plan_range(150, None, Some(150), None), None);
    }
}
