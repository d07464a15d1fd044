// External imports
use chrono::NaiveDateTime;
use sqlx::types::BigDecimal;
// Workspace imports
// Local imports

/// Account registered by an account-creating operation.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAccount {
    pub name: String,
    pub created_at: NaiveDateTime,
}

/// Post row produced by a `comment` operation.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub author: String,
    pub permlink: String,
    pub parent_author: String,
    pub parent_permlink: String,
    pub created_at: NaiveDateTime,
}

/// Payout columns applied to one post at batch flush.
#[derive(Debug, Clone, Default)]
pub struct PostPayoutUpdate {
    pub author: String,
    pub permlink: String,
    pub pending_payout: Option<BigDecimal>,
    pub payout: Option<BigDecimal>,
    pub author_rewards: Option<i64>,
    pub is_paidout: bool,
    pub payout_at: Option<NaiveDateTime>,
}

/// `comment_options` columns applied to one post.
#[derive(Debug, Clone)]
pub struct PostOptionsUpdate {
    pub author: String,
    pub permlink: String,
    pub max_accepted_payout: Option<BigDecimal>,
    pub percent_hbd: Option<i32>,
    pub allow_votes: Option<bool>,
    pub allow_curation_rewards: Option<bool>,
}

/// Body/meta of one post, kept in a separate table from the post header.
#[derive(Debug, Clone)]
pub struct NewPostData {
    pub author: String,
    pub permlink: String,
    pub title: String,
    pub body: String,
    pub json: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewPostTag {
    pub author: String,
    pub permlink: String,
    pub tag: String,
}

/// Effective vote snapshot for one (post, voter) pair.
#[derive(Debug, Clone)]
pub struct NewVote {
    pub author: String,
    pub permlink: String,
    pub voter: String,
    pub weight: i64,
    pub rshares: i64,
    pub last_update: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct NewPayment {
    pub block_num: i32,
    pub tx_idx: i32,
    pub from_account: String,
    pub to_account: String,
    pub amount: BigDecimal,
    pub token: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewFollow {
    pub follower: String,
    pub following: String,
    /// 0 = nothing, 1 = follows, 2 = mutes.
    pub state: i16,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewReblog {
    pub account: String,
    pub post_author: String,
    pub post_permlink: String,
    pub created_at: NaiveDateTime,
}
