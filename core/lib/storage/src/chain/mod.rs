//! Bulk writes commanded by the domain sub-processors' flushers.
//!
//! Uniform row sets travel as one `UNNEST` statement; post actions are
//! replayed one statement per action because their order within a batch
//! is significant (a comment may be created, edited and deleted between
//! two flushes).

// Built-in deps
use std::time::Instant;
// External imports
// Workspace imports
// Local imports
use self::records::{
    NewAccount, NewFollow, NewPayment, NewPost, NewPostData, NewPostTag, NewReblog, NewVote,
    PostOptionsUpdate, PostPayoutUpdate,
};
use crate::{QueryResult, StorageProcessor};

pub mod records;

#[derive(Debug)]
pub struct ChainSchema<'a, 'c>(pub &'a mut StorageProcessor<'c>);

impl<'a, 'c> ChainSchema<'a, 'c> {
    /// All registered account names; prefetched into memory at startup.
    pub async fn load_account_names(&mut self) -> QueryResult<Vec<String>> {
        let start = Instant::now();
        let names: Vec<String> = sqlx::query_scalar("SELECT name FROM hive_accounts")
            .fetch_all(self.0.conn())
            .await?;

        metrics::histogram!("sql.chain.load_account_names", start.elapsed());
        Ok(names)
    }

    /// Registers accounts introduced in the batch. Re-registration of an
    /// existing name is a no-op.
    pub async fn save_accounts(&mut self, accounts: &[NewAccount]) -> QueryResult<()> {
        if accounts.is_empty() {
            return Ok(());
        }
        let start = Instant::now();

        let names: Vec<_> = accounts.iter().map(|a| a.name.clone()).collect();
        let dates: Vec<_> = accounts.iter().map(|a| a.created_at).collect();
        sqlx::query(
            "INSERT INTO hive_accounts (name, created_at) \
             SELECT name, created_at FROM UNNEST($1::text[], $2::timestamp[]) \
                 AS u(name, created_at) \
             ON CONFLICT (name) DO NOTHING",
        )
        .bind(names)
        .bind(dates)
        .execute(self.0.conn())
        .await?;

        metrics::histogram!("sql.chain.save_accounts", start.elapsed());
        Ok(())
    }

    pub async fn upsert_post(&mut self, post: &NewPost) -> QueryResult<()> {
        sqlx::query(
            "INSERT INTO hive_posts (author, permlink, parent_author, parent_permlink, \
                                     created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $5) \
             ON CONFLICT (author, permlink) DO UPDATE SET updated_at = EXCLUDED.updated_at",
        )
        .bind(&post.author)
        .bind(&post.permlink)
        .bind(&post.parent_author)
        .bind(&post.parent_permlink)
        .bind(post.created_at)
        .execute(self.0.conn())
        .await?;
        Ok(())
    }

    pub async fn delete_post(&mut self, author: &str, permlink: &str) -> QueryResult<()> {
        sqlx::query(
            "DELETE FROM hive_post_tags WHERE post_id IN \
             (SELECT id FROM hive_posts WHERE author = $1 AND permlink = $2)",
        )
        .bind(author)
        .bind(permlink)
        .execute(self.0.conn())
        .await?;
        sqlx::query(
            "DELETE FROM hive_posts_data WHERE id IN \
             (SELECT id FROM hive_posts WHERE author = $1 AND permlink = $2)",
        )
        .bind(author)
        .bind(permlink)
        .execute(self.0.conn())
        .await?;
        sqlx::query("DELETE FROM hive_posts WHERE author = $1 AND permlink = $2")
            .bind(author)
            .bind(permlink)
            .execute(self.0.conn())
            .await?;
        Ok(())
    }

    pub async fn update_post_options(&mut self, options: &PostOptionsUpdate) -> QueryResult<()> {
        sqlx::query(
            "UPDATE hive_posts SET \
                 max_accepted_payout = COALESCE($3, max_accepted_payout), \
                 percent_hbd = COALESCE($4, percent_hbd), \
                 allow_votes = COALESCE($5, allow_votes), \
                 allow_curation_rewards = COALESCE($6, allow_curation_rewards) \
             WHERE author = $1 AND permlink = $2",
        )
        .bind(&options.author)
        .bind(&options.permlink)
        .bind(&options.max_accepted_payout)
        .bind(options.percent_hbd)
        .bind(options.allow_votes)
        .bind(options.allow_curation_rewards)
        .execute(self.0.conn())
        .await?;
        Ok(())
    }

    /// Applies one post's folded payout columns.
    pub async fn apply_post_payout(&mut self, update: &PostPayoutUpdate) -> QueryResult<()> {
        sqlx::query(
            "UPDATE hive_posts SET \
                 pending_payout = COALESCE($3, pending_payout), \
                 payout = COALESCE($4, payout), \
                 author_rewards = COALESCE($5, author_rewards), \
                 is_paidout = is_paidout OR $6, \
                 payout_at = COALESCE($7, payout_at) \
             WHERE author = $1 AND permlink = $2",
        )
        .bind(&update.author)
        .bind(&update.permlink)
        .bind(&update.pending_payout)
        .bind(&update.payout)
        .bind(update.author_rewards)
        .bind(update.is_paidout)
        .bind(update.payout_at)
        .execute(self.0.conn())
        .await?;
        Ok(())
    }

    /// Replaces post bodies/meta staged by the post-data cache.
    pub async fn save_post_data(&mut self, rows: &[NewPostData]) -> QueryResult<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let start = Instant::now();

        let authors: Vec<_> = rows.iter().map(|r| r.author.clone()).collect();
        let permlinks: Vec<_> = rows.iter().map(|r| r.permlink.clone()).collect();
        let titles: Vec<_> = rows.iter().map(|r| r.title.clone()).collect();
        let bodies: Vec<_> = rows.iter().map(|r| r.body.clone()).collect();
        let jsons: Vec<_> = rows.iter().map(|r| r.json.clone()).collect();
        sqlx::query(
            "INSERT INTO hive_posts_data (id, title, body, json) \
             SELECT p.id, u.title, u.body, u.json \
             FROM UNNEST($1::text[], $2::text[], $3::text[], $4::text[], $5::text[]) \
                 AS u(author, permlink, title, body, json) \
             JOIN hive_posts p ON p.author = u.author AND p.permlink = u.permlink \
             ON CONFLICT (id) DO UPDATE SET \
                 title = EXCLUDED.title, body = EXCLUDED.body, json = EXCLUDED.json",
        )
        .bind(authors)
        .bind(permlinks)
        .bind(titles)
        .bind(bodies)
        .bind(jsons)
        .execute(self.0.conn())
        .await?;

        metrics::histogram!("sql.chain.save_post_data", start.elapsed());
        Ok(())
    }

    pub async fn save_post_tags(&mut self, rows: &[NewPostTag]) -> QueryResult<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let start = Instant::now();

        let authors: Vec<_> = rows.iter().map(|r| r.author.clone()).collect();
        let permlinks: Vec<_> = rows.iter().map(|r| r.permlink.clone()).collect();
        let tags: Vec<_> = rows.iter().map(|r| r.tag.clone()).collect();
        sqlx::query(
            "INSERT INTO hive_post_tags (post_id, tag) \
             SELECT p.id, u.tag \
             FROM UNNEST($1::text[], $2::text[], $3::text[]) AS u(author, permlink, tag) \
             JOIN hive_posts p ON p.author = u.author AND p.permlink = u.permlink \
             ON CONFLICT DO NOTHING",
        )
        .bind(authors)
        .bind(permlinks)
        .bind(tags)
        .execute(self.0.conn())
        .await?;

        metrics::histogram!("sql.chain.save_post_tags", start.elapsed());
        Ok(())
    }

    /// Upserts effective-vote rows. The caller must have deduplicated by
    /// (post, voter); duplicate keys in one statement are a Postgres error.
    pub async fn save_votes(&mut self, rows: &[NewVote]) -> QueryResult<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let start = Instant::now();

        let authors: Vec<_> = rows.iter().map(|r| r.author.clone()).collect();
        let permlinks: Vec<_> = rows.iter().map(|r| r.permlink.clone()).collect();
        let voters: Vec<_> = rows.iter().map(|r| r.voter.clone()).collect();
        let weights: Vec<_> = rows.iter().map(|r| r.weight).collect();
        let rshares: Vec<_> = rows.iter().map(|r| r.rshares).collect();
        let updates: Vec<_> = rows.iter().map(|r| r.last_update).collect();
        sqlx::query(
            "INSERT INTO hive_votes (post_id, voter, weight, rshares, last_update) \
             SELECT p.id, u.voter, u.weight, u.rshares, u.last_update \
             FROM UNNEST($1::text[], $2::text[], $3::text[], $4::int8[], $5::int8[], $6::timestamp[]) \
                 AS u(author, permlink, voter, weight, rshares, last_update) \
             JOIN hive_posts p ON p.author = u.author AND p.permlink = u.permlink \
             ON CONFLICT (post_id, voter) DO UPDATE SET \
                 weight = EXCLUDED.weight, rshares = EXCLUDED.rshares, \
                 last_update = EXCLUDED.last_update",
        )
        .bind(authors)
        .bind(permlinks)
        .bind(voters)
        .bind(weights)
        .bind(rshares)
        .bind(updates)
        .execute(self.0.conn())
        .await?;

        metrics::histogram!("sql.chain.save_votes", start.elapsed());
        Ok(())
    }

    pub async fn save_payments(&mut self, rows: &[NewPayment]) -> QueryResult<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let start = Instant::now();

        let block_nums: Vec<_> = rows.iter().map(|r| r.block_num).collect();
        let tx_idxs: Vec<_> = rows.iter().map(|r| r.tx_idx).collect();
        let froms: Vec<_> = rows.iter().map(|r| r.from_account.clone()).collect();
        let tos: Vec<_> = rows.iter().map(|r| r.to_account.clone()).collect();
        let amounts: Vec<_> = rows.iter().map(|r| r.amount.clone()).collect();
        let tokens: Vec<_> = rows.iter().map(|r| r.token.clone()).collect();
        let dates: Vec<_> = rows.iter().map(|r| r.created_at).collect();
        sqlx::query(
            "INSERT INTO hive_payments \
                 (block_num, tx_idx, from_account, to_account, amount, token, created_at) \
             SELECT * FROM UNNEST($1::int4[], $2::int4[], $3::text[], $4::text[], \
                                  $5::numeric[], $6::text[], $7::timestamp[])",
        )
        .bind(block_nums)
        .bind(tx_idxs)
        .bind(froms)
        .bind(tos)
        .bind(amounts)
        .bind(tokens)
        .bind(dates)
        .execute(self.0.conn())
        .await?;

        metrics::histogram!("sql.chain.save_payments", start.elapsed());
        Ok(())
    }

    /// Upserts follow states and recounts follower/following totals for
    /// every account the batch touched. The recount is the expensive part
    /// and the reason this flush runs outside the block transaction.
    pub async fn save_follows(&mut self, rows: &[NewFollow]) -> QueryResult<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let start = Instant::now();

        let followers: Vec<_> = rows.iter().map(|r| r.follower.clone()).collect();
        let followings: Vec<_> = rows.iter().map(|r| r.following.clone()).collect();
        let states: Vec<_> = rows.iter().map(|r| r.state).collect();
        let dates: Vec<_> = rows.iter().map(|r| r.created_at).collect();
        sqlx::query(
            "INSERT INTO hive_follows (follower, following, state, created_at) \
             SELECT * FROM UNNEST($1::text[], $2::text[], $3::int2[], $4::timestamp[]) \
             ON CONFLICT (follower, following) DO UPDATE SET state = EXCLUDED.state",
        )
        .bind(&followers)
        .bind(&followings)
        .bind(states)
        .bind(dates)
        .execute(self.0.conn())
        .await?;

        let mut touched: Vec<String> = followers;
        touched.extend(followings);
        touched.sort();
        touched.dedup();
        sqlx::query(
            "UPDATE hive_accounts a SET \
                 followers = (SELECT COUNT(*) FROM hive_follows f \
                              WHERE f.following = a.name AND f.state = 1), \
                 following = (SELECT COUNT(*) FROM hive_follows f \
                              WHERE f.follower = a.name AND f.state = 1) \
             WHERE a.name = ANY($1)",
        )
        .bind(touched)
        .execute(self.0.conn())
        .await?;

        metrics::histogram!("sql.chain.save_follows", start.elapsed());
        Ok(())
    }

    pub async fn save_reblogs(&mut self, rows: &[NewReblog]) -> QueryResult<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let start = Instant::now();

        let accounts: Vec<_> = rows.iter().map(|r| r.account.clone()).collect();
        let authors: Vec<_> = rows.iter().map(|r| r.post_author.clone()).collect();
        let permlinks: Vec<_> = rows.iter().map(|r| r.post_permlink.clone()).collect();
        let dates: Vec<_> = rows.iter().map(|r| r.created_at).collect();
        sqlx::query(
            "INSERT INTO hive_reblogs (account, post_author, post_permlink, created_at) \
             SELECT * FROM UNNEST($1::text[], $2::text[], $3::text[], $4::timestamp[]) \
             ON CONFLICT DO NOTHING",
        )
        .bind(accounts)
        .bind(authors)
        .bind(permlinks)
        .bind(dates)
        .execute(self.0.conn())
        .await?;

        metrics::histogram!("sql.chain.save_reblogs", start.elapsed());
        Ok(())
    }
}
