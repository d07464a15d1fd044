// Built-in deps
use std::time::Instant;
// External imports
use chrono::NaiveDateTime;
// Workspace imports
use hivemind_types::BlockNumber;
// Local imports
use self::records::{NewBlockHeader, StorageBlockHeader};
use crate::{QueryResult, StorageProcessor};

pub mod records;

/// Block schema is the persistent side of the block store: the
/// `hive_blocks` table, its multi-row flush, and the head-only pop used by
/// fork recovery.
#[derive(Debug)]
pub struct BlocksSchema<'a, 'c>(pub &'a mut StorageProcessor<'c>);

impl<'a, 'c> BlocksSchema<'a, 'c> {
    /// The highest persisted block number, 0 when the table is empty.
    pub async fn head_num(&mut self) -> QueryResult<BlockNumber> {
        let start = Instant::now();
        let num: Option<i32> =
            sqlx::query_scalar("SELECT num FROM hive_blocks ORDER BY num DESC LIMIT 1")
                .fetch_optional(self.0.conn())
                .await?;

        metrics::histogram!("sql.blocks.head_num", start.elapsed());
        Ok(BlockNumber(num.unwrap_or(0) as u32))
    }

    /// `created_at` of the head row, `None` when the table is empty.
    pub async fn head_date(&mut self) -> QueryResult<Option<NaiveDateTime>> {
        let start = Instant::now();
        let date: Option<NaiveDateTime> =
            sqlx::query_scalar("SELECT created_at FROM hive_blocks ORDER BY num DESC LIMIT 1")
                .fetch_optional(self.0.conn())
                .await?;

        metrics::histogram!("sql.blocks.head_date", start.elapsed());
        Ok(date)
    }

    /// Given the block number, attempts to retrieve its header.
    pub async fn get_block(&mut self, number: BlockNumber) -> QueryResult<Option<StorageBlockHeader>> {
        let start = Instant::now();
        let header = sqlx::query_as::<_, StorageBlockHeader>(
            "SELECT num, hash, prev, txs, ops, created_at FROM hive_blocks WHERE num = $1 LIMIT 1",
        )
        .bind(*number as i32)
        .fetch_optional(self.0.conn())
        .await?;

        metrics::histogram!("sql.blocks.get_block", start.elapsed());
        Ok(header)
    }

    /// Writes the staged headers in one multi-row insert, ascending.
    ///
    /// Commits atomically with whatever else the surrounding transaction
    /// carries; must only be called on a transaction processor.
    pub async fn save_blocks(&mut self, headers: &[NewBlockHeader]) -> QueryResult<()> {
        debug_assert!(self.0.in_transaction());
        if headers.is_empty() {
            return Ok(());
        }
        let start = Instant::now();

        let mut nums = Vec::with_capacity(headers.len());
        let mut hashes = Vec::with_capacity(headers.len());
        let mut prevs = Vec::with_capacity(headers.len());
        let mut txs = Vec::with_capacity(headers.len());
        let mut ops = Vec::with_capacity(headers.len());
        let mut dates = Vec::with_capacity(headers.len());
        for header in headers {
            nums.push(header.num as i32);
            hashes.push(header.hash.clone());
            prevs.push(header.prev.clone());
            txs.push(header.txs);
            ops.push(header.ops);
            dates.push(header.created_at);
        }

        sqlx::query(
            "INSERT INTO hive_blocks (num, hash, prev, txs, ops, created_at) \
             SELECT num, hash, prev, txs, ops, created_at \
             FROM UNNEST($1::int4[], $2::text[], $3::text[], $4::int4[], $5::int4[], $6::timestamp[]) \
                 AS u(num, hash, prev, txs, ops, created_at) \
             ORDER BY num",
        )
        .bind(nums)
        .bind(hashes)
        .bind(prevs)
        .bind(txs)
        .bind(ops)
        .bind(dates)
        .execute(self.0.conn())
        .await?;

        metrics::histogram!("sql.blocks.save_blocks", start.elapsed());
        Ok(())
    }

    /// Sanity check on table state at startup: block numbers must form a
    /// contiguous sequence.
    pub async fn is_consistent(&mut self) -> QueryResult<bool> {
        let consistent: bool = sqlx::query_scalar(
            "SELECT COUNT(*) = COALESCE(MAX(num) - MIN(num) + 1, 0) FROM hive_blocks",
        )
        .fetch_one(self.0.conn())
        .await?;

        Ok(consistent)
    }

    /// Deletes the header row and every dependent row produced at or after
    /// its timestamp. The caller guarantees that `header` is the current
    /// head; block numbers above it must already be gone.
    pub async fn pop_block(&mut self, header: &StorageBlockHeader) -> QueryResult<()> {
        debug_assert!(self.0.in_transaction());
        let start = Instant::now();
        let date = header.created_at;

        // Community records first, they reference the core rows.
        for table in &[
            "hive_notifs",
            "hive_subscriptions",
            "hive_roles",
            "hive_communities",
            "hive_feed_cache",
            "hive_reblogs",
            "hive_follows",
        ] {
            sqlx::query(&format!("DELETE FROM {} WHERE created_at >= $1", table))
                .bind(date)
                .execute(self.0.conn())
                .await?;
        }

        // Posts last among the dated rows: tags and data reference their ids.
        sqlx::query(
            "DELETE FROM hive_post_tags WHERE post_id IN \
             (SELECT id FROM hive_posts WHERE created_at >= $1)",
        )
        .bind(date)
        .execute(self.0.conn())
        .await?;
        sqlx::query(
            "DELETE FROM hive_posts_data WHERE id IN \
             (SELECT id FROM hive_posts WHERE created_at >= $1)",
        )
        .bind(date)
        .execute(self.0.conn())
        .await?;
        sqlx::query("DELETE FROM hive_posts WHERE created_at >= $1")
            .bind(date)
            .execute(self.0.conn())
            .await?;

        sqlx::query("DELETE FROM hive_payments WHERE block_num = $1")
            .bind(header.num)
            .execute(self.0.conn())
            .await?;
        sqlx::query("DELETE FROM hive_blocks WHERE num = $1")
            .bind(header.num)
            .execute(self.0.conn())
            .await?;

        metrics::histogram!("sql.blocks.pop_block", start.elapsed());
        Ok(())
    }
}

#[cfg(all(test, feature = "db_test"))]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn header(num: u32, hash: &str, prev: &str) -> NewBlockHeader {
        NewBlockHeader {
            num,
            hash: hash.to_string(),
            prev: prev.to_string(),
            txs: 0,
            ops: 0,
            created_at: NaiveDate::from_ymd(2016, 3, 24).and_hms(16, 5, num),
        }
    }

    /// Flushed headers must come back with the head cursor advanced and
    /// the chain linkage intact.
    #[tokio::test]
    async fn save_and_head() -> QueryResult<()> {
        let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let mut storage = StorageProcessor::establish_connection(&database_url).await?;
        let mut transaction = storage.start_transaction().await?;

        let headers = vec![
            header(1, "000000010a", "0000000000"),
            header(2, "000000020b", "000000010a"),
        ];
        BlocksSchema(&mut transaction).save_blocks(&headers).await?;

        assert_eq!(BlocksSchema(&mut transaction).head_num().await?, BlockNumber(2));
        assert!(BlocksSchema(&mut transaction).is_consistent().await?);

        let stored = BlocksSchema(&mut transaction)
            .get_block(BlockNumber(2))
            .await?
            .expect("block 2 must be stored");
        assert_eq!(stored.prev, "000000010a");

        // Never commit: the test transaction is rolled back on drop.
        Ok(())
    }
}
