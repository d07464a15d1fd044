//! Domain sub-processors and their flush pipeline.
//!
//! The ingestion core does not own the domain semantics; it owns the
//! contracts: what gets staged while a block is scanned, and the order in
//! which the staging buffers reach the database at batch end.

use std::collections::BTreeMap;

use bigdecimal::BigDecimal;
use chrono::NaiveDateTime;
use num::BigInt;

use hivemind_storage::{QueryResult, StorageProcessor};
use hivemind_types::operation::{CommentOp, CommentOptionsOp, CustomJsonOp, DeleteCommentOp, TransferOp};
use hivemind_types::vops::EffectiveCommentVoteVop;
use hivemind_types::{Asset, BlockNumber};

use crate::processor::vops::PayoutEvent;

pub mod accounts;
pub mod custom;
pub mod follow;
pub mod payments;
pub mod post_data;
pub mod posts;
pub mod tags;
pub mod votes;

pub use self::accounts::{Accounts, DirtyLevel};
pub use self::follow::Follows;
pub use self::payments::Payments;
pub use self::post_data::PostDataCache;
pub use self::posts::Posts;
pub use self::tags::Tags;
pub use self::votes::Votes;

/// Converts an NAI amount into the numeric the tables store.
pub(crate) fn asset_to_decimal(asset: &Asset) -> anyhow::Result<BigDecimal> {
    let digits: BigInt = asset
        .amount
        .parse()
        .map_err(|err| anyhow::anyhow!("bad asset amount `{}`: {}", asset.amount, err))?;
    Ok(BigDecimal::new(digits, asset.precision as i64))
}

/// The set of domain sub-processors commanded by the block processor.
#[derive(Debug, Default)]
pub struct Domains {
    pub accounts: Accounts,
    pub posts: Posts,
    pub post_data: PostDataCache,
    pub tags: Tags,
    pub votes: Votes,
    pub payments: Payments,
    pub follows: Follows,
}

impl Domains {
    pub fn new() -> Self {
        Self::default()
    }

    /// A comment feeds three processors: the post header, the body cache
    /// and the tag index.
    pub fn comment_op(&mut self, op: &CommentOp, date: NaiveDateTime) {
        self.posts.comment_op(op, date);
        self.post_data.comment_op(op);
        self.tags.comment_op(&op.author, &op.permlink, &op.json_metadata);
    }

    pub fn delete_op(&mut self, op: &DeleteCommentOp) {
        self.posts.delete_op(op);
        self.post_data.delete_op(&op.author, &op.permlink);
    }

    pub fn comment_options_op(&mut self, op: &CommentOptionsOp) -> anyhow::Result<()> {
        self.posts.comment_options_op(op)
    }

    pub fn effective_vote(&mut self, vop: &EffectiveCommentVoteVop, date: NaiveDateTime) {
        self.votes.effective_comment_vote_op(vop, date);
    }

    pub fn comment_payouts(
        &mut self,
        payouts: &BTreeMap<String, Vec<PayoutEvent>>,
        date: NaiveDateTime,
    ) -> anyhow::Result<BTreeMap<String, u64>> {
        self.posts.comment_payout_op(payouts, date)
    }

    pub fn transfer(
        &mut self,
        op: &TransferOp,
        tx_idx: usize,
        num: BlockNumber,
        date: NaiveDateTime,
    ) -> anyhow::Result<()> {
        self.payments.op_transfer(op, tx_idx, num, date)
    }

    pub fn custom_json_batch(
        &mut self,
        ops: &[CustomJsonOp],
        num: BlockNumber,
        date: NaiveDateTime,
    ) -> BTreeMap<String, u64> {
        custom::process_ops(ops, num, date, &mut self.follows)
    }

    /// Runs the transactional flushers in their fixed order. Post rows
    /// must exist before the body cache, tags and votes reference them;
    /// the caller flushes the block store afterwards so the head only
    /// advances when every side table succeeded.
    pub async fn flush_batch(&mut self, storage: &mut StorageProcessor<'_>) -> QueryResult<()> {
        self.accounts.flush(storage).await?;
        self.posts.flush(storage).await?;
        self.post_data.flush(storage).await?;
        self.tags.flush(storage).await?;
        self.votes.flush(storage).await?;
        self.payments.flush(storage).await?;
        Ok(())
    }

    /// Follow flush; runs on its own connection, outside the batch
    /// transaction (the recounts are too expensive to hold locks for).
    pub async fn flush_follows(&mut self, storage: &mut StorageProcessor<'_>) -> QueryResult<()> {
        self.follows.flush(storage).await
    }

    pub fn has_follows(&self) -> bool {
        !self.follows.is_empty()
    }

    /// Discards everything staged by a failed batch.
    pub fn clear(&mut self) {
        self.accounts.clear();
        self.posts.clear();
        self.post_data.clear();
        self.tags.clear();
        self.votes.clear();
        self.payments.clear();
        self.follows.clear();
    }
}
