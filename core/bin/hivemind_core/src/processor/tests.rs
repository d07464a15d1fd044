//! Scenario tests for the block processor, driven through an in-memory
//! provider.

use std::collections::HashMap;

use chrono::{NaiveDate, NaiveDateTime};
use serde_json::json;

use hivemind_types::{BlockNumber, RawOperation, SignedBlock, Transaction};

use crate::domain::Domains;
use crate::processor::vops::VopAggregates;
use crate::processor::{BlockProcessor, VopsSupply};
use crate::provider::test_utils::FakeBlockProvider;

fn timestamp(secs: u32) -> NaiveDateTime {
    NaiveDate::from_ymd(2016, 3, 24).and_hms(16, 5, secs)
}

fn raw_op(kind: &str, value: serde_json::Value) -> RawOperation {
    RawOperation {
        kind: kind.to_string(),
        value,
    }
}

fn block(num: u32, ops: Vec<RawOperation>) -> SignedBlock {
    SignedBlock {
        block_id: format!("{:08x}{:08x}", num, 0x0a42b6f2u32),
        previous: format!("{:08x}{:08x}", num - 1, 0x0a42b6f2u32),
        timestamp: timestamp(num),
        transactions: if ops.is_empty() {
            Vec::new()
        } else {
            vec![Transaction { operations: ops }]
        },
    }
}

async fn process_live(
    processor: &mut BlockProcessor,
    domains: &mut Domains,
    provider: &FakeBlockProvider,
    block: &SignedBlock,
) -> BlockNumber {
    processor
        .process(domains, block, &VopsSupply::Live(provider), false)
        .await
        .expect("block processing must succeed")
}

#[tokio::test]
async fn first_block_bootstraps_the_head_date() {
    let provider = FakeBlockProvider::default();
    let mut processor = BlockProcessor::new(None);
    let mut domains = Domains::new();

    let first = block(1, vec![]);
    let num = process_live(&mut processor, &mut domains, &provider, &first).await;

    assert_eq!(num, BlockNumber(1));
    assert_eq!(processor.head_block_date(), Some(first.timestamp));

    let headers = processor.staged_headers();
    assert_eq!(headers.len(), 1);
    assert_eq!(headers[0].num, 1);
    assert_eq!(headers[0].created_at, first.timestamp);
}

/// Operations of block B are tagged with the date of block B-1.
#[tokio::test]
async fn operations_are_tagged_with_the_previous_block_date() {
    let provider = FakeBlockProvider::default();
    let mut processor = BlockProcessor::new(None);
    let mut domains = Domains::new();

    let first = block(1, vec![]);
    process_live(&mut processor, &mut domains, &provider, &first).await;

    let second = block(
        2,
        vec![raw_op(
            "account_create_operation",
            json!({"new_account_name": "alice"}),
        )],
    );
    process_live(&mut processor, &mut domains, &provider, &second).await;

    let staged = domains.accounts.staged();
    assert_eq!(staged.len(), 1);
    assert_eq!(staged[0].name, "alice");
    // Tagged with block 1's timestamp, not block 2's.
    assert_eq!(staged[0].created_at, first.timestamp);
    // The cache now points at block 2 for whatever comes next.
    assert_eq!(processor.head_block_date(), Some(second.timestamp));
}

/// An account created by a block is visible to later operations of the
/// same block.
#[tokio::test]
async fn account_created_in_block_is_usable_within_it() {
    let provider = FakeBlockProvider::default();
    let mut processor = BlockProcessor::new(None);
    let mut domains = Domains::new();

    let mixed = block(
        1,
        vec![
            raw_op(
                "account_create_operation",
                json!({"new_account_name": "alice"}),
            ),
            raw_op(
                "comment_operation",
                json!({
                    "parent_author": "", "parent_permlink": "intro",
                    "author": "alice", "permlink": "hello",
                    "body": "hi", "json_metadata": "{\"tags\": [\"intro\"]}"
                }),
            ),
        ],
    );
    process_live(&mut processor, &mut domains, &provider, &mixed).await;

    assert!(domains.accounts.is_registered("alice"));
    assert_eq!(domains.posts.staged_len(), 1);
    assert_eq!(domains.post_data.staged_len(), 1);
    assert_eq!(domains.tags.staged_len(), 1);
}

#[tokio::test]
async fn staged_headers_keep_chain_linkage() {
    let provider = FakeBlockProvider::default();
    let mut processor = BlockProcessor::new(None);
    let mut domains = Domains::new();

    for num in 1..=3 {
        let next = block(num, vec![]);
        process_live(&mut processor, &mut domains, &provider, &next).await;
    }

    let headers = processor.staged_headers();
    assert_eq!(headers.len(), 3);
    for pair in headers.windows(2) {
        assert_eq!(pair[1].prev, pair[0].hash);
        assert_eq!(pair[1].num, pair[0].num + 1);
    }
}

#[tokio::test]
async fn counters_and_custom_json_stats_are_merged() {
    let provider = FakeBlockProvider::default();
    let mut processor = BlockProcessor::new(None);
    let mut domains = Domains::new();

    let busy = block(
        1,
        vec![
            raw_op(
                "vote_operation",
                json!({"voter": "a", "author": "b", "permlink": "p", "weight": 10000}),
            ),
            raw_op("witness_update_operation", json!({"owner": "w"})),
            raw_op(
                "custom_json_operation",
                json!({
                    "required_posting_auths": ["alice"],
                    "id": "follow",
                    "json": "[\"follow\", {\"follower\": \"alice\", \"following\": \"bob\", \"what\": [\"blog\"]}]"
                }),
            ),
        ],
    );
    process_live(&mut processor, &mut domains, &provider, &busy).await;

    let stats = processor.ops_stats();
    assert_eq!(stats.get("vote_operation"), Some(&1));
    assert_eq!(stats.get("witness_update_operation"), Some(&1));
    assert_eq!(stats.get("follow"), Some(&1));
    // Custom JSON is never counted under its own tag.
    assert!(stats.get("custom_json_operation").is_none());
    assert_eq!(domains.follows.staged_len(), 1);
}

#[tokio::test]
async fn live_vops_feed_votes_and_payouts() {
    let provider = FakeBlockProvider::default();
    provider
        .add_vops(
            1,
            vec![
                hivemind_types::VirtualOperation::decode(&raw_op(
                    "effective_comment_vote_operation",
                    json!({
                        "voter": "carol", "author": "bob", "permlink": "p",
                        "rshares": 100,
                        "pending_payout": {"amount": "150", "precision": 3, "nai": "@@000000013"}
                    }),
                ))
                .unwrap(),
                hivemind_types::VirtualOperation::decode(&raw_op(
                    "comment_payout_update_operation",
                    json!({"author": "bob", "permlink": "p"}),
                ))
                .unwrap(),
            ],
        )
        .await;

    let mut processor = BlockProcessor::new(None);
    let mut domains = Domains::new();
    process_live(&mut processor, &mut domains, &provider, &block(1, vec![])).await;

    assert_eq!(domains.votes.staged_len(), 1);
    // One payout action staged for "bob/p".
    assert_eq!(domains.posts.staged_len(), 1);
    let stats = processor.ops_stats();
    assert_eq!(stats.get("effective_comment_vote_operation"), Some(&1));
    assert_eq!(stats.get("comment_payout_update_operation"), Some(&1));
}

#[tokio::test]
async fn preloaded_vops_fall_back_to_empty() {
    let preloaded: HashMap<u32, VopAggregates> = HashMap::new();
    let mut processor = BlockProcessor::new(None);
    let mut domains = Domains::new();

    processor
        .process(
            &mut domains,
            &block(1, vec![]),
            &VopsSupply::Preloaded(&preloaded),
            true,
        )
        .await
        .expect("absent vops key must mean an empty set");

    assert_eq!(domains.votes.staged_len(), 0);
    assert_eq!(domains.posts.staged_len(), 0);
}

/// The producer/consumer channel delivers every block of the range, in
/// order, batch by batch.
#[tokio::test]
async fn block_fetcher_covers_the_whole_range() {
    use crate::provider::spawn_block_fetcher;
    use crate::signal::ShutdownFlag;
    use std::sync::Arc;

    let provider = FakeBlockProvider::default();
    for num in 1..=25 {
        provider.add_block(block(num, vec![])).await;
    }

    let (mut rx, producer) = spawn_block_fetcher(
        Arc::new(provider),
        BlockNumber(1),
        BlockNumber(25),
        10,
        ShutdownFlag::new(),
    );

    let mut seen = Vec::new();
    while let Some(batch) = rx.recv().await {
        assert!(batch.blocks.len() <= 10);
        for block in &batch.blocks {
            seen.push(*block.num().unwrap());
        }
    }
    producer.await.unwrap().unwrap();

    assert_eq!(seen, (1..=25).collect::<Vec<_>>());
}
