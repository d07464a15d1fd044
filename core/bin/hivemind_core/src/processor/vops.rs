//! Folding of a block's virtual operations into the two keyed aggregates
//! consumed by the domain sub-processors.
//!
//! The fold is a pure function of the vop list. Per-key event order is the
//! chain emission order: payout stages must be applied as the node emitted
//! them (author reward, curation reward, comment reward, payout update).

use std::collections::BTreeMap;

use hivemind_types::vops::EffectiveCommentVoteVop;
use hivemind_types::{Asset, VirtualOperation};

/// One payout stage recorded against a post.
#[derive(Debug, Clone, PartialEq)]
pub enum PayoutEvent {
    CurationReward {
        reward: Asset,
    },
    AuthorReward {
        hbd_payout: Asset,
        hive_payout: Asset,
        vesting_payout: Asset,
    },
    CommentReward {
        payout: Asset,
        author_rewards: i64,
        total_payout_value: Asset,
        curator_payout_value: Asset,
        beneficiary_payout_value: Asset,
    },
    EffectiveVote {
        pending_payout: Asset,
    },
    /// Emitted only once the post is paid out.
    PayoutUpdate,
}

impl PayoutEvent {
    /// Counter key; matches the originating vop tag.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::CurationReward { .. } => "curation_reward_operation",
            Self::AuthorReward { .. } => "author_reward_operation",
            Self::CommentReward { .. } => "comment_reward_operation",
            Self::EffectiveVote { .. } => "effective_comment_vote_operation",
            Self::PayoutUpdate => "comment_payout_update_operation",
        }
    }
}

/// Virtual-op aggregates of one block, keyed by `author/permlink`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VopAggregates {
    /// Latest pending-payout snapshot per post. Later snapshots within
    /// one block supersede earlier ones.
    pub effective_votes: BTreeMap<String, EffectiveCommentVoteVop>,
    /// Payout stages per post, in emission order.
    pub comment_payouts: BTreeMap<String, Vec<PayoutEvent>>,
}

impl VopAggregates {
    pub fn is_empty(&self) -> bool {
        self.effective_votes.is_empty() && self.comment_payouts.is_empty()
    }
}

/// Folds the raw virtual operations of one block into the keyed maps.
pub fn prepare_vops(vops: &[VirtualOperation]) -> VopAggregates {
    let mut aggregates = VopAggregates::default();

    for vop in vops {
        let key = match vop.post_key() {
            Some(key) => key,
            None => continue,
        };

        let event = match vop {
            VirtualOperation::CurationReward(v) => PayoutEvent::CurationReward {
                reward: v.reward.clone(),
            },
            VirtualOperation::AuthorReward(v) => PayoutEvent::AuthorReward {
                hbd_payout: v.hbd_payout.clone(),
                hive_payout: v.hive_payout.clone(),
                vesting_payout: v.vesting_payout.clone(),
            },
            VirtualOperation::CommentReward(v) => PayoutEvent::CommentReward {
                payout: v.payout.clone(),
                author_rewards: v.author_rewards,
                total_payout_value: v.total_payout_value.clone(),
                curator_payout_value: v.curator_payout_value.clone(),
                beneficiary_payout_value: v.beneficiary_payout_value.clone(),
            },
            VirtualOperation::EffectiveCommentVote(v) => {
                aggregates.effective_votes.insert(key.clone(), v.clone());
                PayoutEvent::EffectiveVote {
                    pending_payout: v.pending_payout.clone(),
                }
            }
            VirtualOperation::CommentPayoutUpdate(_) => PayoutEvent::PayoutUpdate,
            VirtualOperation::Other(_) => continue,
        };

        aggregates.comment_payouts.entry(key).or_default().push(event);
    }

    aggregates
}

#[cfg(test)]
mod tests {
    use super::*;
    use hivemind_types::RawOperation;
    use serde_json::json;

    fn asset(amount: &str, nai: &str) -> serde_json::Value {
        json!({"amount": amount, "precision": 3, "nai": nai})
    }

    fn vop(kind: &str, value: serde_json::Value) -> VirtualOperation {
        VirtualOperation::decode(&RawOperation {
            kind: kind.to_string(),
            value,
        })
        .unwrap()
    }

    fn payout_stage_fixture() -> Vec<VirtualOperation> {
        vec![
            vop(
                "author_reward_operation",
                json!({
                    "author": "bob", "permlink": "p",
                    "hbd_payout": asset("10", "@@000000013"),
                    "hive_payout": asset("0", "@@000000021"),
                    "vesting_payout": asset("500", "@@000000037")
                }),
            ),
            vop(
                "curation_reward_operation",
                json!({
                    "curator": "carol", "reward": asset("300", "@@000000037"),
                    "comment_author": "bob", "comment_permlink": "p"
                }),
            ),
            vop(
                "comment_reward_operation",
                json!({
                    "author": "bob", "permlink": "p",
                    "payout": asset("20", "@@000000013"), "author_rewards": 10,
                    "total_payout_value": asset("10", "@@000000013"),
                    "curator_payout_value": asset("10", "@@000000013"),
                    "beneficiary_payout_value": asset("0", "@@000000013")
                }),
            ),
            vop(
                "comment_payout_update_operation",
                json!({"author": "bob", "permlink": "p"}),
            ),
        ]
    }

    /// Payout stages must be kept in chain-emission order within a key.
    #[test]
    fn per_key_order_is_emission_order() {
        let aggregates = prepare_vops(&payout_stage_fixture());

        let events = &aggregates.comment_payouts["bob/p"];
        let tags: Vec<_> = events.iter().map(PayoutEvent::tag).collect();
        assert_eq!(
            tags,
            vec![
                "author_reward_operation",
                "curation_reward_operation",
                "comment_reward_operation",
                "comment_payout_update_operation",
            ]
        );
    }

    #[test]
    fn effective_vote_keeps_the_last_snapshot_per_key() {
        let vops = vec![
            vop(
                "effective_comment_vote_operation",
                json!({
                    "voter": "carol", "author": "bob", "permlink": "p",
                    "rshares": 1, "pending_payout": asset("100", "@@000000013")
                }),
            ),
            vop(
                "effective_comment_vote_operation",
                json!({
                    "voter": "dave", "author": "bob", "permlink": "p",
                    "rshares": 2, "pending_payout": asset("250", "@@000000013")
                }),
            ),
        ];

        let aggregates = prepare_vops(&vops);

        let vote = &aggregates.effective_votes["bob/p"];
        assert_eq!(vote.voter, "dave");
        assert_eq!(vote.pending_payout.amount, "250");
        // Both snapshots still reach the payout aggregates, in order.
        assert_eq!(aggregates.comment_payouts["bob/p"].len(), 2);
    }

    #[test]
    fn unrecognised_vops_are_skipped() {
        let vops = vec![vop("producer_reward_operation", json!({"producer": "w"}))];
        assert!(prepare_vops(&vops).is_empty());
    }

    /// Same input must yield an identical fold.
    #[test]
    fn fold_is_deterministic() {
        let vops = payout_stage_fixture();
        assert_eq!(prepare_vops(&vops), prepare_vops(&vops));
    }
}
