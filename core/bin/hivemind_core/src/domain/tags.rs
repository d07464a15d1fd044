//! Tag assignments extracted from comment metadata.

use std::collections::BTreeSet;

use hivemind_storage::chain::records::NewPostTag;
use hivemind_storage::{QueryResult, StorageProcessor};

/// At most this many tags are indexed per post.
const MAX_TAGS_PER_POST: usize = 5;

#[derive(Debug, Default)]
pub struct Tags {
    staged: BTreeSet<(String, String, String)>,
}

impl Tags {
    /// Stages the tags named by a comment's `json_metadata`. Malformed
    /// metadata carries no tags.
    pub fn comment_op(&mut self, author: &str, permlink: &str, json_metadata: &str) {
        for tag in parse_tags(json_metadata) {
            self.staged
                .insert((author.to_string(), permlink.to_string(), tag));
        }
    }

    pub async fn flush(&mut self, storage: &mut StorageProcessor<'_>) -> QueryResult<()> {
        let rows: Vec<_> = self
            .staged
            .iter()
            .map(|(author, permlink, tag)| NewPostTag {
                author: author.clone(),
                permlink: permlink.clone(),
                tag: tag.clone(),
            })
            .collect();
        storage.chain_schema().save_post_tags(&rows).await?;
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

fn parse_tags(json_metadata: &str) -> Vec<String> {
    let meta: serde_json::Value = match serde_json::from_str(json_metadata) {
        Ok(meta) => meta,
        Err(_) => return Vec::new(),
    };

    let mut tags = Vec::new();
    if let Some(raw_tags) = meta.get("tags").and_then(|t| t.as_array()) {
        for tag in raw_tags {
            if let Some(tag) = tag.as_str() {
                let tag = tag.trim().to_lowercase();
                if !tag.is_empty() && !tags.contains(&tag) {
                    tags.push(tag);
                }
            }
            if tags.len() == MAX_TAGS_PER_POST {
                break;
            }
        }
    }
    tags
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_are_normalised_and_capped() {
        let tags = parse_tags(r#"{"tags": ["Life", "life", " photo ", "", "a", "b", "c", "d"]}"#);
        assert_eq!(tags, vec!["life", "photo", "a", "b", "c"]);
    }

    #[test]
    fn malformed_metadata_has_no_tags() {
        assert!(parse_tags("not json").is_empty());
        assert!(parse_tags(r#"{"tags": "single"}"#).is_empty());
    }
}
