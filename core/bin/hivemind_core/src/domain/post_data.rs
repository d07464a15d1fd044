//! Post body/meta cache. Last edit of a post within a batch wins.

use std::collections::BTreeMap;

use hivemind_storage::chain::records::NewPostData;
use hivemind_storage::{QueryResult, StorageProcessor};
use hivemind_types::operation::CommentOp;

#[derive(Debug, Default)]
pub struct PostDataCache {
    staged: BTreeMap<(String, String), NewPostData>,
}

impl PostDataCache {
    pub fn comment_op(&mut self, op: &CommentOp) {
        self.staged.insert(
            (op.author.clone(), op.permlink.clone()),
            NewPostData {
                author: op.author.clone(),
                permlink: op.permlink.clone(),
                title: op.title.clone(),
                body: op.body.clone(),
                json: op.json_metadata.clone(),
            },
        );
    }

    pub fn delete_op(&mut self, author: &str, permlink: &str) {
        // The row itself is removed by the posts flush; dropping the
        // staged body keeps a delete-after-edit batch consistent.
        self.staged
            .remove(&(author.to_string(), permlink.to_string()));
    }

    pub async fn flush(&mut self, storage: &mut StorageProcessor<'_>) -> QueryResult<()> {
        let rows: Vec<_> = self.staged.values().cloned().collect();
        storage.chain_schema().save_post_data(&rows).await?;
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
