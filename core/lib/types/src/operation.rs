//! Typed user-operation surface.
//!
//! Blocks arrive with string-tagged operations. Decoding them into an
//! exhaustive enum at the block boundary makes the routed surface a
//! compile-time contract; everything the indexer does not consume stays
//! behind [`Operation::Other`] and is only counted.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::asset::Asset;

/// Wire shape of one operation: `{"type": ..., "value": ...}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawOperation {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: Value,
}

#[derive(Debug, Error)]
#[error("malformed `{tag}` payload: {source}")]
pub struct OperationDecodeError {
    pub tag: String,
    #[source]
    pub source: serde_json::Error,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PowOp {
    pub worker_account: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Pow2Op {
    pub work: Pow2Work,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Pow2Work {
    pub value: Pow2WorkValue,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Pow2WorkValue {
    pub input: Pow2Input,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Pow2Input {
    pub worker_account: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountCreateOp {
    pub new_account_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountUpdateOp {
    pub account: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommentOp {
    pub parent_author: String,
    pub parent_permlink: String,
    pub author: String,
    pub permlink: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub json_metadata: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeleteCommentOp {
    pub author: String,
    pub permlink: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommentOptionsOp {
    pub author: String,
    pub permlink: String,
    pub max_accepted_payout: Option<Asset>,
    pub percent_hbd: Option<u32>,
    pub allow_votes: Option<bool>,
    pub allow_curation_rewards: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VoteOp {
    pub voter: String,
    pub author: String,
    pub permlink: String,
    pub weight: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransferOp {
    pub from: String,
    pub to: String,
    pub amount: Asset,
    #[serde(default)]
    pub memo: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CustomJsonOp {
    #[serde(default)]
    pub required_auths: Vec<String>,
    #[serde(default)]
    pub required_posting_auths: Vec<String>,
    pub id: String,
    pub json: String,
}

/// One decoded user operation.
#[derive(Debug, Clone)]
pub enum Operation {
    Pow(PowOp),
    Pow2(Pow2Op),
    AccountCreate(AccountCreateOp),
    AccountCreateWithDelegation(AccountCreateOp),
    CreateClaimedAccount(AccountCreateOp),
    AccountUpdate(AccountUpdateOp),
    AccountUpdate2(AccountUpdateOp),
    Comment(CommentOp),
    DeleteComment(DeleteCommentOp),
    CommentOptions(CommentOptionsOp),
    Vote(VoteOp),
    Transfer(TransferOp),
    CustomJson(CustomJsonOp),
    /// Anything the indexer does not consume; kept for the counters.
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

impl Operation {
    /// Decodes a raw operation into its typed form. Unknown tags are not
    /// an error; a malformed payload of a known tag is.
    pub fn decode(raw: &RawOperation) -> Result<Self, OperationDecodeError> {
        let tag = raw.kind.as_str();
        let op = match tag {
            "pow_operation" => Self::Pow(payload(tag, &raw.value)?),
            "pow2_operation" => Self::Pow2(payload(tag, &raw.value)?),
            "account_create_operation" => Self::AccountCreate(payload(tag, &raw.value)?),
            "account_create_with_delegation_operation" => {
                Self::AccountCreateWithDelegation(payload(tag, &raw.value)?)
            }
            "create_claimed_account_operation" => {
                Self::CreateClaimedAccount(payload(tag, &raw.value)?)
            }
            "account_update_operation" => Self::AccountUpdate(payload(tag, &raw.value)?),
            "account_update2_operation" => Self::AccountUpdate2(payload(tag, &raw.value)?),
            "comment_operation" => Self::Comment(payload(tag, &raw.value)?),
            "delete_comment_operation" => Self::DeleteComment(payload(tag, &raw.value)?),
            "comment_options_operation" => Self::CommentOptions(payload(tag, &raw.value)?),
            "vote_operation" => Self::Vote(payload(tag, &raw.value)?),
            "transfer_operation" => Self::Transfer(payload(tag, &raw.value)?),
            "custom_json_operation" => Self::CustomJson(payload(tag, &raw.value)?),
            other => Self::Other(other.to_string()),
        };
        Ok(op)
    }

    /// The wire tag, used as the ops-stats counter key.
    pub fn tag(&self) -> &str {
        match self {
            Self::Pow(_) => "pow_operation",
            Self::Pow2(_) => "pow2_operation",
            Self::AccountCreate(_) => "account_create_operation",
            Self::AccountCreateWithDelegation(_) => "account_create_with_delegation_operation",
            Self::CreateClaimedAccount(_) => "create_claimed_account_operation",
            Self::AccountUpdate(_) => "account_update_operation",
            Self::AccountUpdate2(_) => "account_update2_operation",
            Self::Comment(_) => "comment_operation",
            Self::DeleteComment(_) => "delete_comment_operation",
            Self::CommentOptions(_) => "comment_options_operation",
            Self::Vote(_) => "vote_operation",
            Self::Transfer(_) => "transfer_operation",
            Self::CustomJson(_) => "custom_json_operation",
            Self::Other(tag) => tag,
        }
    }

    /// Account introduced by an account-creating operation, if this is one.
    pub fn new_account_name(&self) -> Option<&str> {
        match self {
            Self::Pow(op) => Some(&op.worker_account),
            Self::Pow2(op) => Some(&op.work.value.input.worker_account),
            Self::AccountCreate(op)
            | Self::AccountCreateWithDelegation(op)
            | Self::CreateClaimedAccount(op) => Some(&op.new_account_name),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(kind: &str, value: Value) -> RawOperation {
        RawOperation {
            kind: kind.to_string(),
            value,
        }
    }

    #[test]
    fn account_creating_ops_expose_the_new_name() {
        let create = Operation::decode(&raw(
            "account_create_operation",
            json!({"new_account_name": "alice", "creator": "bob"}),
        ))
        .unwrap();
        assert_eq!(create.new_account_name(), Some("alice"));

        let pow2 = Operation::decode(&raw(
            "pow2_operation",
            json!({"work": {"type": "pow2", "value": {"input": {"worker_account": "miner"}}}}),
        ))
        .unwrap();
        assert_eq!(pow2.new_account_name(), Some("miner"));
    }

    #[test]
    fn unknown_tags_fall_through_as_other() {
        let op = Operation::decode(&raw("witness_update_operation", json!({"owner": "w"}))).unwrap();
        assert!(matches!(&op, Operation::Other(tag) if tag == "witness_update_operation"));
        assert_eq!(op.tag(), "witness_update_operation");
        assert_eq!(op.new_account_name(), None);
    }

    #[test]
    fn malformed_known_payload_is_an_error() {
        let err = Operation::decode(&raw("vote_operation", json!({"voter": "a"}))).unwrap_err();
        assert_eq!(err.tag, "vote_operation");
    }
}
