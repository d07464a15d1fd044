//! Fork recovery.
//!
//! Runs once at startup, before the main loop. Walks back from the local
//! head until the local and upstream hashes agree, then pops the
//! divergent blocks head-first in a single transaction. Without an undo
//! log only a bounded window can be recovered; deeper divergence is fatal
//! and so is popping anything the upstream could still reorganise.

use hivemind_storage::blocks::records::StorageBlockHeader;
use hivemind_storage::ConnectionPool;
use hivemind_types::BlockNumber;

use crate::error::SyncError;
use crate::provider::BlockProvider;

/// Divergence at this depth or beyond aborts startup.
pub const MAX_FORK_DEPTH: u32 = 25;

pub async fn verify_head(
    pool: &ConnectionPool,
    provider: &dyn BlockProvider,
) -> Result<(), SyncError> {
    let mut storage = pool.access_storage().await?;

    let head = storage.blocks_schema().head_num().await?;
    if *head == 0 {
        return Ok(());
    }

    // Move backwards from head until the chains agree.
    let mut to_pop: Vec<StorageBlockHeader> = Vec::new();
    let mut cursor = head;
    loop {
        if *head - *cursor >= MAX_FORK_DEPTH {
            return Err(SyncError::ForkTooDeep { head, cursor });
        }

        let local = storage
            .blocks_schema()
            .get_block(cursor)
            .await?
            .ok_or_else(|| anyhow::anyhow!("local block {} is missing", cursor))?;
        let upstream_hash = provider
            .get_block(cursor)
            .await?
            .ok_or_else(|| anyhow::anyhow!("upstream block {} is missing", cursor))?
            .block_id;

        let matches = local.hash == upstream_hash;
        log::info!(
            "[INIT] fork check. block {}: {} vs {} --- {}",
            local.num,
            local.hash,
            upstream_hash,
            if matches { "ok" } else { "invalid" }
        );
        if matches {
            break;
        }
        to_pop.push(local);
        cursor = cursor - 1;
    }

    if to_pop.is_empty() {
        return Ok(()); // no fork!
    }

    log::error!(
        "[FORK] depth is {}; popping blocks {} - {}",
        *head - *cursor,
        *cursor + 1,
        head
    );

    // Recovery is refused until the divergence point is irreversible
    // upstream; otherwise the trail could move under us while popping.
    let last_irreversible = provider.last_irreversible().await?;
    if *cursor >= *last_irreversible {
        return Err(SyncError::NotIrreversible {
            cursor,
            last_irreversible,
        });
    }

    pop_blocks(&mut storage, &to_pop).await?;
    Ok(())
}

/// Pops the given headers, descending by num, in one transaction.
/// Head-only popping is asserted before each delete.
async fn pop_blocks(
    storage: &mut hivemind_storage::StorageProcessor<'_>,
    to_pop: &[StorageBlockHeader],
) -> Result<(), SyncError> {
    let mut transaction = storage.start_transaction().await?;

    for header in to_pop {
        let current_head = transaction.blocks_schema().head_num().await?;
        let num = BlockNumber(header.num as u32);
        if num != current_head {
            return Err(SyncError::PopNonHead {
                num,
                head: current_head,
            });
        }

        log::warn!("[FORK] popping block {} @ {}", header.num, header.created_at);
        transaction.blocks_schema().pop_block(header).await?;
    }

    transaction.commit().await?;
    log::warn!("[FORK] recovery complete");
    Ok(())
}
