//! Effective-vote staging.
//!
//! Votes arrive as consensus snapshots, not as user operations; the
//! snapshot for a (post, voter) pair supersedes any earlier one in the
//! same batch, which also keeps the flush statement free of duplicate
//! keys.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use hivemind_storage::chain::records::NewVote;
use hivemind_storage::{QueryResult, StorageProcessor};
use hivemind_types::vops::EffectiveCommentVoteVop;

#[derive(Debug, Default)]
pub struct Votes {
    staged: BTreeMap<(String, String, String), NewVote>,
}

impl Votes {
    pub fn effective_comment_vote_op(&mut self, vop: &EffectiveCommentVoteVop, date: NaiveDateTime) {
        self.staged.insert(
            (vop.author.clone(), vop.permlink.clone(), vop.voter.clone()),
            NewVote {
                author: vop.author.clone(),
                permlink: vop.permlink.clone(),
                voter: vop.voter.clone(),
                weight: vop.weight as i64,
                rshares: vop.rshares,
                last_update: date,
            },
        );
    }

    pub async fn flush(&mut self, storage: &mut StorageProcessor<'_>) -> QueryResult<()> {
        let rows: Vec<_> = self.staged.values().cloned().collect();
        storage.chain_schema().save_votes(&rows).await?;
        self.staged.clear();
        Ok(())
    }

    pub fn clear(&mut self) {
        self.staged.clear();
    }

    #[cfg(test)]
    pub fn staged_len(&self) -> usize {
        self.staged.len()
    }
}
