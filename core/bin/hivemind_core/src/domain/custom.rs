//! Custom-JSON dialect processing.
//!
//! Custom JSON carries the social surface (follows, reblogs, community
//! actions). The ops of a block are processed as one batch after the main
//! scan, since they may reference posts created earlier in the block.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::Deserialize;

use hivemind_types::operation::CustomJsonOp;
use hivemind_types::BlockNumber;

use crate::domain::follow::{FollowState, Follows};

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    fn into_vec(self) -> Vec<String> {
        match self {
            Self::One(name) => vec![name],
            Self::Many(names) => names,
        }
    }
}

#[derive(Debug, Deserialize)]
struct FollowParams {
    follower: String,
    following: OneOrMany,
    #[serde(default)]
    what: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ReblogParams {
    account: String,
    author: String,
    permlink: String,
}

/// Processes one block's deferred custom-JSON batch; returns per-dialect
/// counters to merge into the ops-stats map.
pub fn process_ops(
    ops: &[CustomJsonOp],
    _num: BlockNumber,
    date: NaiveDateTime,
    follows: &mut Follows,
) -> BTreeMap<String, u64> {
    let mut stats = BTreeMap::new();
    let mut bump = |key: &str| {
        *stats.entry(key.to_string()).or_insert(0u64) += 1;
    };

    for op in ops {
        let actor = op
            .required_posting_auths
            .first()
            .or_else(|| op.required_auths.first());
        let actor = match actor {
            Some(actor) => actor.as_str(),
            None => {
                bump("invalid");
                continue;
            }
        };

        match op.id.as_str() {
            "follow" | "reblog" => match parse_follow_dialect(&op.json) {
                Some(FollowDialect::Follow(params)) => {
                    // The chain does not enforce it, but only self-issued
                    // follows are indexed.
                    if params.follower != actor {
                        bump("invalid");
                        continue;
                    }
                    let state = follow_state(&params.what);
                    for following in params.following.into_vec() {
                        follows.follow_op(&params.follower, &following, state, date);
                    }
                    bump("follow");
                }
                Some(FollowDialect::Reblog(params)) => {
                    if params.account != actor {
                        bump("invalid");
                        continue;
                    }
                    follows.reblog_op(&params.account, &params.author, &params.permlink, date);
                    bump("reblog");
                }
                None => bump("invalid"),
            },
            "community" => bump("community"),
            "notify" => bump("notify"),
            _ => bump("unknown"),
        }
    }

    stats
}

enum FollowDialect {
    Follow(FollowParams),
    Reblog(ReblogParams),
}

/// The follow dialect wraps its payload as `[name, params]`.
fn parse_follow_dialect(json: &str) -> Option<FollowDialect> {
    let value: serde_json::Value = serde_json::from_str(json).ok()?;
    let pair = value.as_array()?;
    let name = pair.get(0)?.as_str()?;
    let params = pair.get(1)?.clone();

    match name {
        "follow" => serde_json::from_value(params).ok().map(FollowDialect::Follow),
        "reblog" => serde_json::from_value(params).ok().map(FollowDialect::Reblog),
        _ => None,
    }
}

fn follow_state(what: &[String]) -> FollowState {
    match what.first().map(String::as_str) {
        Some("blog") | Some("follow") => FollowState::Blog,
        Some("ignore") => FollowState::Ignore,
        _ => FollowState::Reset,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn custom(id: &str, auth: &str, json: &str) -> CustomJsonOp {
        serde_json::from_value(serde_json::json!({
            "required_auths": [],
            "required_posting_auths": [auth],
            "id": id,
            "json": json,
        }))
        .unwrap()
    }

    fn date() -> NaiveDateTime {
        NaiveDate::from_ymd(2020, 1, 1).and_hms(0, 0, 0)
    }

    #[test]
    fn follow_and_reblog_are_staged() {
        let ops = vec![
            custom(
                "follow",
                "alice",
                r#"["follow", {"follower": "alice", "following": "bob", "what": ["blog"]}]"#,
            ),
            custom(
                "follow",
                "carol",
                r#"["reblog", {"account": "carol", "author": "bob", "permlink": "p"}]"#,
            ),
        ];

        let mut follows = Follows::default();
        let stats = process_ops(&ops, BlockNumber(10), date(), &mut follows);

        assert_eq!(stats.get("follow"), Some(&1));
        assert_eq!(stats.get("reblog"), Some(&1));
        assert_eq!(follows.staged_len(), 2);
    }

    #[test]
    fn impersonated_follows_are_rejected() {
        let ops = vec![custom(
            "follow",
            "mallory",
            r#"["follow", {"follower": "alice", "following": "bob", "what": ["blog"]}]"#,
        )];

        let mut follows = Follows::default();
        let stats = process_ops(&ops, BlockNumber(10), date(), &mut follows);

        assert_eq!(stats.get("invalid"), Some(&1));
        assert!(follows.is_empty());
    }

    #[test]
    fn unfollow_resets_state() {
        assert_eq!(follow_state(&[]), FollowState::Reset);
        assert_eq!(follow_state(&["ignore".to_string()]), FollowState::Ignore);
    }
}
