//! Upstream block provider.
//!
//! The core consumes blocks through the [`BlockProvider`] seam; the real
//! implementation reads the HAF views and falls back to mock data for
//! heights past the database. During massive sync a producer task
//! prefetches batches into a bounded channel, which is what throttles the
//! fetch side when the consumer falls behind.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use hivemind_storage::ConnectionPool;
use hivemind_types::{BlockNumber, SignedBlock, VirtualOperation};

use crate::mocks::MockChainData;
use crate::processor::vops::{prepare_vops, VopAggregates};
use crate::signal::ShutdownFlag;

/// Number of prefetched batches the producer may run ahead.
const PREFETCH_BATCHES: usize = 2;

#[async_trait]
pub trait BlockProvider: Send + Sync {
    /// Inclusive range of unprocessed blocks advertised for this
    /// indexer's context, `None` when fully caught up.
    async fn next_block_range(&self) -> anyhow::Result<Option<(BlockNumber, BlockNumber)>>;

    async fn get_block(&self, num: BlockNumber) -> anyhow::Result<Option<SignedBlock>>;

    async fn get_block_range(
        &self,
        lbound: BlockNumber,
        ubound: BlockNumber,
    ) -> anyhow::Result<Vec<SignedBlock>>;

    async fn get_virtual_ops(&self, num: BlockNumber) -> anyhow::Result<Vec<VirtualOperation>>;

    async fn get_virtual_ops_range(
        &self,
        lbound: BlockNumber,
        ubound: BlockNumber,
    ) -> anyhow::Result<HashMap<u32, Vec<VirtualOperation>>>;

    async fn last_irreversible(&self) -> anyhow::Result<BlockNumber>;
}

/// Provider backed by the HAF database, with a mock-data overlay for
/// heights the block log does not know.
pub struct HafBlockProvider {
    pool: ConnectionPool,
    mocks: MockChainData,
}

impl HafBlockProvider {
    pub fn new(pool: ConnectionPool, mocks: MockChainData) -> Self {
        Self { pool, mocks }
    }

    fn decode_vops(raw: &[hivemind_types::RawOperation]) -> anyhow::Result<Vec<VirtualOperation>> {
        raw.iter()
            .map(|op| VirtualOperation::decode(op).map_err(Into::into))
            .collect()
    }
}

#[async_trait]
impl BlockProvider for HafBlockProvider {
    async fn next_block_range(&self) -> anyhow::Result<Option<(BlockNumber, BlockNumber)>> {
        let mut storage = self.pool.access_storage().await?;
        storage.haf_schema().next_block().await
    }

    async fn get_block(&self, num: BlockNumber) -> anyhow::Result<Option<SignedBlock>> {
        let mut storage = self.pool.access_storage().await?;
        if let Some(block) = storage.haf_schema().get_block(num).await? {
            return Ok(Some(block));
        }
        Ok(self.mocks.get_block(num).cloned())
    }

    async fn get_block_range(
        &self,
        lbound: BlockNumber,
        ubound: BlockNumber,
    ) -> anyhow::Result<Vec<SignedBlock>> {
        let mut storage = self.pool.access_storage().await?;
        let mut blocks = storage.haf_schema().get_block_range(lbound, ubound).await?;

        // Extend past the block log with mock data, while contiguous.
        let mut next = match blocks.last() {
            Some(block) => *block.num()? + 1,
            None => *lbound,
        };
        while next <= *ubound {
            match self.mocks.get_block(BlockNumber(next)) {
                Some(block) => blocks.push(block.clone()),
                None => break,
            }
            next += 1;
        }

        Ok(blocks)
    }

    async fn get_virtual_ops(&self, num: BlockNumber) -> anyhow::Result<Vec<VirtualOperation>> {
        let mut storage = self.pool.access_storage().await?;
        let mut raw = storage.haf_schema().get_virtual_ops(num).await?;
        raw.extend(self.mocks.vops_for(num).iter().cloned());
        Self::decode_vops(&raw)
    }

    async fn get_virtual_ops_range(
        &self,
        lbound: BlockNumber,
        ubound: BlockNumber,
    ) -> anyhow::Result<HashMap<u32, Vec<VirtualOperation>>> {
        let mut storage = self.pool.access_storage().await?;
        let rows = storage
            .haf_schema()
            .get_virtual_ops_range(lbound, ubound)
            .await?;

        let mut vops: HashMap<u32, Vec<VirtualOperation>> = HashMap::new();
        for (num, raw) in rows {
            vops.insert(*num, Self::decode_vops(&raw)?);
        }
        for num in *lbound..=*ubound {
            let raw = self.mocks.vops_for(BlockNumber(num));
            if !raw.is_empty() {
                vops.entry(num)
                    .or_default()
                    .extend(Self::decode_vops(raw)?);
            }
        }

        Ok(vops)
    }

    async fn last_irreversible(&self) -> anyhow::Result<BlockNumber> {
        let mut storage = self.pool.access_storage().await?;
        storage.haf_schema().last_irreversible_block().await
    }
}

/// One producer batch: blocks plus their prepared vop aggregates.
#[derive(Debug)]
pub struct BlockBatch {
    pub blocks: Vec<SignedBlock>,
    pub vops: HashMap<u32, VopAggregates>,
}

/// Spawns the producer side of massive sync: fetches `[lbound, ubound]`
/// in `max_batch`-sized chunks into a bounded channel. The producer stops
/// cleanly when the shutdown latch is raised or the consumer goes away.
pub fn spawn_block_fetcher<P>(
    provider: Arc<P>,
    lbound: BlockNumber,
    ubound: BlockNumber,
    max_batch: usize,
    shutdown: ShutdownFlag,
) -> (mpsc::Receiver<BlockBatch>, JoinHandle<anyhow::Result<()>>)
where
    P: BlockProvider + 'static,
{
    let (tx, rx) = mpsc::channel(PREFETCH_BATCHES);

    let handle = tokio::spawn(async move {
        let mut from = *lbound;
        while from <= *ubound {
            if shutdown.is_raised() {
                break;
            }

            let to = (from + max_batch as u32 - 1).min(*ubound);
            let blocks = provider
                .get_block_range(BlockNumber(from), BlockNumber(to))
                .await?;
            if blocks.is_empty() {
                anyhow::bail!("provider returned no blocks for range <{}:{}>", from, to);
            }
            let vops = provider
                .get_virtual_ops_range(BlockNumber(from), BlockNumber(to))
                .await?
                .into_iter()
                .map(|(num, list)| (num, prepare_vops(&list)))
                .collect();

            let batch = BlockBatch { blocks, vops };
            if tx.send(batch).await.is_err() {
                // Consumer dropped the channel; its own error is reported
                // by the sync manager.
                break;
            }

            from = to + 1;
        }
        Ok(())
    });

    (rx, handle)
}

#[cfg(test)]
pub(crate) mod test_utils {
    use super::*;
    use tokio::sync::RwLock;

    #[derive(Default)]
    pub struct FakeChainData {
        pub blocks: HashMap<u32, SignedBlock>,
        pub vops: HashMap<u32, Vec<VirtualOperation>>,
        pub next_range: Option<(u32, u32)>,
        pub last_irreversible: u32,
    }

    /// In-memory provider mirroring the shape of the HAF one.
    #[derive(Clone, Default)]
    pub struct FakeBlockProvider {
        pub inner: Arc<RwLock<FakeChainData>>,
    }

    impl FakeBlockProvider {
        pub async fn add_block(&self, block: SignedBlock) {
            let num = block.num().unwrap();
            self.inner.write().await.blocks.insert(*num, block);
        }

        pub async fn add_vops(&self, num: u32, vops: Vec<VirtualOperation>) {
            self.inner.write().await.vops.insert(num, vops);
        }
    }

    #[async_trait]
    impl BlockProvider for FakeBlockProvider {
        async fn next_block_range(&self) -> anyhow::Result<Option<(BlockNumber, BlockNumber)>> {
            Ok(self
                .inner
                .read()
                .await
                .next_range
                .map(|(lo, hi)| (BlockNumber(lo), BlockNumber(hi))))
        }

        async fn get_block(&self, num: BlockNumber) -> anyhow::Result<Option<SignedBlock>> {
            Ok(self.inner.read().await.blocks.get(&*num).cloned())
        }

        async fn get_block_range(
            &self,
            lbound: BlockNumber,
            ubound: BlockNumber,
        ) -> anyhow::Result<Vec<SignedBlock>> {
            let inner = self.inner.read().await;
            Ok((*lbound..=*ubound)
                .filter_map(|num| inner.blocks.get(&num).cloned())
                .collect())
        }

        async fn get_virtual_ops(&self, num: BlockNumber) -> anyhow::Result<Vec<VirtualOperation>> {
            Ok(self.inner.read().await.vops.get(&*num).cloned().unwrap_or_default())
        }

        async fn get_virtual_ops_range(
            &self,
            lbound: BlockNumber,
            ubound: BlockNumber,
        ) -> anyhow::Result<HashMap<u32, Vec<VirtualOperation>>> {
            let inner = self.inner.read().await;
            Ok((*lbound..=*ubound)
                .filter_map(|num| inner.vops.get(&num).map(|vops| (num, vops.clone())))
                .collect())
        }

        async fn last_irreversible(&self) -> anyhow::Result<BlockNumber> {
            Ok(BlockNumber(self.inner.read().await.last_irreversible))
        }
    }
}
