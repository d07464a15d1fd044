//! Post bookkeeping.
//!
//! Actions are replayed at flush time in the order they were staged: a
//! post can be created, edited and deleted between two flushes, and the
//! final table state must reflect the chain order.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use hivemind_storage::chain::records::{NewPost, PostOptionsUpdate, PostPayoutUpdate};
use hivemind_storage::{QueryResult, StorageProcessor};
use hivemind_types::operation::{CommentOp, CommentOptionsOp, DeleteCommentOp};

use crate::domain::asset_to_decimal;
use crate::processor::vops::PayoutEvent;

#[derive(Debug)]
enum PostAction {
    Upsert(NewPost),
    Delete { author: String, permlink: String },
    Options(PostOptionsUpdate),
    Payout(PostPayoutUpdate),
}

#[derive(Debug, Default)]
pub struct Posts {
    actions: Vec<PostAction>,
}

impl Posts {
    pub fn comment_op(&mut self, op: &CommentOp, date: NaiveDateTime) {
        self.actions.push(PostAction::Upsert(NewPost {
            author: op.author.clone(),
            permlink: op.permlink.clone(),
            parent_author: op.parent_author.clone(),
            parent_permlink: op.parent_permlink.clone(),
            created_at: date,
        }));
    }

    pub fn delete_op(&mut self, op: &DeleteCommentOp) {
        self.actions.push(PostAction::Delete {
            author: op.author.clone(),
            permlink: op.permlink.clone(),
        });
    }

    pub fn comment_options_op(&mut self, op: &CommentOptionsOp) -> anyhow::Result<()> {
        let max_accepted_payout = op
            .max_accepted_payout
            .as_ref()
            .map(asset_to_decimal)
            .transpose()?;
        self.actions.push(PostAction::Options(PostOptionsUpdate {
            author: op.author.clone(),
            permlink: op.permlink.clone(),
            max_accepted_payout,
            percent_hbd: op.percent_hbd.map(|p| p as i32),
            allow_votes: op.allow_votes,
            allow_curation_rewards: op.allow_curation_rewards,
        }));
        Ok(())
    }

    /// Applies one block's payout aggregates. Per-key events are folded in
    /// emission order; returns the per-type counters for the ops-stats map.
    pub fn comment_payout_op(
        &mut self,
        payouts: &BTreeMap<String, Vec<PayoutEvent>>,
        date: NaiveDateTime,
    ) -> anyhow::Result<BTreeMap<String, u64>> {
        let mut stats = BTreeMap::new();

        for (key, events) in payouts {
            let (author, permlink) = match key.split_once('/') {
                Some(parts) => parts,
                None => anyhow::bail!("malformed post key `{}`", key),
            };
            let mut update = PostPayoutUpdate {
                author: author.to_string(),
                permlink: permlink.to_string(),
                ..Default::default()
            };

            for event in events {
                *stats.entry(event.tag().to_string()).or_insert(0) += 1;
                match event {
                    PayoutEvent::EffectiveVote { pending_payout } => {
                        update.pending_payout = Some(asset_to_decimal(pending_payout)?);
                    }
                    PayoutEvent::CommentReward {
                        payout,
                        author_rewards,
                        ..
                    } => {
                        update.payout = Some(asset_to_decimal(payout)?);
                        update.author_rewards = Some(*author_rewards);
                    }
                    PayoutEvent::PayoutUpdate => {
                        update.is_paidout = true;
                        update.payout_at = Some(date);
                    }
                    // Reward breakdowns are carried by the comment reward;
                    // these stages only count.
                    PayoutEvent::CurationReward { .. } | PayoutEvent::AuthorReward { .. } => {}
                }
            }

            self.actions.push(PostAction::Payout(update));
        }

        Ok(stats)
    }

    pub async fn flush(&mut self, storage: &mut StorageProcessor<'_>) -> QueryResult<()> {
        for action in self.actions.drain(..) {
            match action {
                PostAction::Upsert(post) => storage.chain_schema().upsert_post(&post).await?,
                PostAction::Delete { author, permlink } => {
                    storage.chain_schema().delete_post(&author, &permlink).await?
                }
                PostAction::Options(options) => {
                    storage.chain_schema().update_post_options(&options).await?
                }
                PostAction::Payout(update) => {
                    storage.chain_schema().apply_post_payout(&update).await?
                }
            }
        }
        Ok(())
    }

    pub fn clear(&mut self) {
        self.actions.clear();
    }

    #[cfg(test)]
    pub fn staged_len(&self) -> usize {
        self.actions.len()
    }
}
