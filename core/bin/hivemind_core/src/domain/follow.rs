//! Follow-graph staging.
//!
//! Deltas are tracked in memory and written in bulk because the
//! follower/following recounts are expensive. The flush runs on its own
//! connection, outside the batch transaction; a partial failure there can
//! leave the counts desynchronised until the next full recount.

use chrono::NaiveDateTime;
use hivemind_storage::chain::records::{NewFollow, NewReblog};
use hivemind_storage::{QueryResult, StorageProcessor};

/// Follow state encoded in the `what` list of a follow custom-json.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowState {
    Reset = 0,
    Blog = 1,
    Ignore = 2,
}

#[derive(Debug, Default)]
pub struct Follows {
    follows: Vec<NewFollow>,
    reblogs: Vec<NewReblog>,
}

impl Follows {
    pub fn follow_op(
        &mut self,
        follower: &str,
        following: &str,
        state: FollowState,
        date: NaiveDateTime,
    ) {
        self.follows.push(NewFollow {
            follower: follower.to_string(),
            following: following.to_string(),
            state: state as i16,
            created_at: date,
        });
    }

    pub fn reblog_op(&mut self, account: &str, author: &str, permlink: &str, date: NaiveDateTime) {
        self.reblogs.push(NewReblog {
            account: account.to_string(),
            post_author: author.to_string(),
            post_permlink: permlink.to_string(),
            created_at: date,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.follows.is_empty() && self.reblogs.is_empty()
    }

    pub async fn flush(&mut self, storage: &mut StorageProcessor<'_>) -> QueryResult<()> {
        storage.chain_schema().save_follows(&self.follows).await?;
        storage.chain_schema().save_reblogs(&self.reblogs).await?;
        self.follows.clear();
        self.reblogs.clear();
        Ok(())
    }

    pub fn clear(&mut self) {
        self.follows.clear();
        self.reblogs.clear();
    }

    #[cfg(test)]
    pub fn staged_len(&self) -> usize {
        self.follows.len() + self.reblogs.len()
    }
}
