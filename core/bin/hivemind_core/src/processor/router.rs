//! Two-pass operation routing.
//!
//! Pass 1 discovers accounts introduced by the block so that pass 2 can
//! dispatch operations referencing them, even within the same block.
//! Custom JSON is deferred past the main scan for the same reason: it may
//! reference posts created earlier in the block.

use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDateTime;

use hivemind_types::operation::CustomJsonOp;
use hivemind_types::{BlockNumber, Operation};

use crate::domain::{DirtyLevel, Domains};

/// Pass 1: names introduced by account-creating operations, in-block
/// duplicates collapsed.
pub fn discover_accounts(txs: &[Vec<Operation>]) -> HashSet<String> {
    let mut names = HashSet::new();
    for ops in txs {
        for op in ops {
            if let Some(name) = op.new_account_name() {
                names.insert(name.to_string());
            }
        }
    }
    names
}

/// Pass 2: dispatches every operation to its domain sub-processor and
/// counts it; returns the deferred custom-JSON batch.
///
/// Dirty marks are skipped during initial sync; the account cache is
/// rebuilt wholesale afterwards.
pub fn dispatch_block(
    txs: &[Vec<Operation>],
    num: BlockNumber,
    date: NaiveDateTime,
    is_initial_sync: bool,
    domains: &mut Domains,
    ops_stats: &mut BTreeMap<String, u64>,
) -> anyhow::Result<Vec<CustomJsonOp>> {
    let mut json_ops = Vec::new();

    for (tx_idx, ops) in txs.iter().enumerate() {
        for op in ops {
            if !matches!(op, Operation::CustomJson(_)) {
                *ops_stats.entry(op.tag().to_string()).or_insert(0) += 1;
            }

            match op {
                Operation::AccountUpdate(update) | Operation::AccountUpdate2(update) => {
                    if !is_initial_sync {
                        domains.accounts.dirty(&update.account, DirtyLevel::Full);
                    }
                }

                Operation::Comment(comment) => {
                    domains.comment_op(comment, date);
                    if !is_initial_sync {
                        domains.accounts.dirty(&comment.author, DirtyLevel::LiteStats);
                    }
                }
                Operation::DeleteComment(delete) => domains.delete_op(delete),
                Operation::CommentOptions(options) => domains.comment_options_op(options)?,
                Operation::Vote(vote) => {
                    if !is_initial_sync {
                        domains.accounts.dirty(&vote.author, DirtyLevel::LiteRep);
                        domains.accounts.dirty(&vote.voter, DirtyLevel::LiteStats);
                    }
                }

                Operation::Transfer(transfer) => {
                    domains.transfer(transfer, tx_idx, num, date)?
                }
                Operation::CustomJson(json_op) => json_ops.push(json_op.clone()),

                // Account creation was handled by pass 1; the rest only
                // count.
                Operation::Pow(_)
                | Operation::Pow2(_)
                | Operation::AccountCreate(_)
                | Operation::AccountCreateWithDelegation(_)
                | Operation::CreateClaimedAccount(_)
                | Operation::Other(_) => {}
            }
        }
    }

    Ok(json_ops)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hivemind_types::RawOperation;
    use serde_json::json;

    fn decode(kind: &str, value: serde_json::Value) -> Operation {
        Operation::decode(&RawOperation {
            kind: kind.to_string(),
            value,
        })
        .unwrap()
    }

    fn date() -> NaiveDateTime {
        chrono::NaiveDate::from_ymd(2020, 1, 1).and_hms(0, 0, 0)
    }

    #[test]
    fn pass_one_collects_all_account_creating_ops() {
        let txs = vec![
            vec![
                decode("account_create_operation", json!({"new_account_name": "alice"})),
                decode("pow_operation", json!({"worker_account": "miner"})),
            ],
            vec![decode(
                "create_claimed_account_operation",
                json!({"new_account_name": "alice"}),
            )],
        ];

        let names = discover_accounts(&txs);
        assert_eq!(names.len(), 2);
        assert!(names.contains("alice"));
        assert!(names.contains("miner"));
    }

    #[test]
    fn custom_json_is_deferred_and_not_counted() {
        let txs = vec![vec![
            decode(
                "vote_operation",
                json!({"voter": "a", "author": "b", "permlink": "p", "weight": 100}),
            ),
            decode(
                "custom_json_operation",
                json!({"required_posting_auths": ["a"], "id": "follow", "json": "[]"}),
            ),
        ]];

        let mut domains = Domains::new();
        let mut stats = BTreeMap::new();
        let deferred = dispatch_block(
            &txs,
            BlockNumber(1),
            date(),
            false,
            &mut domains,
            &mut stats,
        )
        .unwrap();

        assert_eq!(deferred.len(), 1);
        assert_eq!(stats.get("vote_operation"), Some(&1));
        assert!(stats.get("custom_json_operation").is_none());
    }

    #[test]
    fn dirty_marks_are_skipped_during_initial_sync() {
        let txs = vec![vec![decode(
            "comment_operation",
            json!({
                "parent_author": "", "parent_permlink": "cat",
                "author": "bob", "permlink": "p", "body": "hi", "json_metadata": ""
            }),
        )]];

        let mut domains = Domains::new();
        let mut stats = BTreeMap::new();
        dispatch_block(&txs, BlockNumber(1), date(), true, &mut domains, &mut stats).unwrap();

        // Post staged, author not marked dirty.
        assert_eq!(domains.posts.staged_len(), 1);
        assert_eq!(stats.get("comment_operation"), Some(&1));
    }
}
