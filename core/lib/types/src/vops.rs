//! Typed virtual-operation surface.
//!
//! Virtual operations are consensus-emitted records (rewards, payout
//! snapshots) that never appear inside transactions. They share the
//! `{"type": ..., "value": ...}` wire shape with user operations.

use serde::Deserialize;
use serde_json::Value;

use crate::asset::Asset;
use crate::operation::{OperationDecodeError, RawOperation};

#[derive(Debug, Clone, Deserialize)]
pub struct CurationRewardVop {
    pub curator: String,
    pub reward: Asset,
    pub comment_author: String,
    pub comment_permlink: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthorRewardVop {
    pub author: String,
    pub permlink: String,
    pub hbd_payout: Asset,
    pub hive_payout: Asset,
    pub vesting_payout: Asset,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommentRewardVop {
    pub author: String,
    pub permlink: String,
    pub payout: Asset,
    pub author_rewards: i64,
    pub total_payout_value: Asset,
    pub curator_payout_value: Asset,
    pub beneficiary_payout_value: Asset,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EffectiveCommentVoteVop {
    pub voter: String,
    pub author: String,
    pub permlink: String,
    #[serde(default)]
    pub weight: u64,
    #[serde(default)]
    pub rshares: i64,
    #[serde(default)]
    pub total_vote_weight: u64,
    pub pending_payout: Asset,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommentPayoutUpdateVop {
    pub author: String,
    pub permlink: String,
}

#[derive(Debug, Clone)]
pub enum VirtualOperation {
    CurationReward(CurationRewardVop),
    AuthorReward(AuthorRewardVop),
    CommentReward(CommentRewardVop),
    EffectiveCommentVote(EffectiveCommentVoteVop),
    CommentPayoutUpdate(CommentPayoutUpdateVop),
    Other(String),
}

fn payload<T: serde::de::DeserializeOwned>(
    tag: &str,
    value: &Value,
) -> Result<T, OperationDecodeError> {
    serde_json::from_value(value.clone()).map_err(|source| OperationDecodeError {
        tag: tag.to_string(),
        source,
    })
}

impl VirtualOperation {
    pub fn decode(raw: &RawOperation) -> Result<Self, OperationDecodeError> {
        let tag = raw.kind.as_str();
        let vop = match tag {
            "curation_reward_operation" => Self::CurationReward(payload(tag, &raw.value)?),
            "author_reward_operation" => Self::AuthorReward(payload(tag, &raw.value)?),
            "comment_reward_operation" => Self::CommentReward(payload(tag, &raw.value)?),
            "effective_comment_vote_operation" => {
                Self::EffectiveCommentVote(payload(tag, &raw.value)?)
            }
            "comment_payout_update_operation" => {
                Self::CommentPayoutUpdate(payload(tag, &raw.value)?)
            }
            other => Self::Other(other.to_string()),
        };
        Ok(vop)
    }

    pub fn tag(&self) -> &str {
        match self {
            Self::CurationReward(_) => "curation_reward_operation",
            Self::AuthorReward(_) => "author_reward_operation",
            Self::CommentReward(_) => "comment_reward_operation",
            Self::EffectiveCommentVote(_) => "effective_comment_vote_operation",
            Self::CommentPayoutUpdate(_) => "comment_payout_update_operation",
            Self::Other(tag) => tag,
        }
    }

    /// `author/permlink` key of the post this vop concerns, if any.
    pub fn post_key(&self) -> Option<String> {
        match self {
            Self::CurationReward(v) => Some(format!("{}/{}", v.comment_author, v.comment_permlink)),
            Self::AuthorReward(v) => Some(format!("{}/{}", v.author, v.permlink)),
            Self::CommentReward(v) => Some(format!("{}/{}", v.author, v.permlink)),
            Self::EffectiveCommentVote(v) => Some(format!("{}/{}", v.author, v.permlink)),
            Self::CommentPayoutUpdate(v) => Some(format!("{}/{}", v.author, v.permlink)),
            Self::Other(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn effective_vote_decodes_with_post_key() {
        let raw = RawOperation {
            kind: "effective_comment_vote_operation".into(),
            value: json!({
                "voter": "carol", "author": "bob", "permlink": "my-post",
                "weight": 12, "rshares": 3456,
                "pending_payout": {"amount": "102", "precision": 3, "nai": "@@000000013"}
            }),
        };
        let vop = VirtualOperation::decode(&raw).unwrap();
        assert_eq!(vop.post_key().as_deref(), Some("bob/my-post"));
        match vop {
            VirtualOperation::EffectiveCommentVote(v) => {
                assert_eq!(v.pending_payout.symbol(), "HBD");
                assert_eq!(v.rshares, 3456);
            }
            other => panic!("unexpected variant: {:?}", other),
        }
    }

    #[test]
    fn unknown_vops_have_no_post_key() {
        let raw = RawOperation {
            kind: "producer_reward_operation".into(),
            value: json!({"producer": "w"}),
        };
        let vop = VirtualOperation::decode(&raw).unwrap();
        assert!(vop.post_key().is_none());
    }
}
