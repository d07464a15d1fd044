//! Periodic maintenance statements run between single blocks, plus the
//! startup guards that do not belong to any data schema.

// Built-in deps
use std::time::Instant;
// External imports
// Workspace imports
use hivemind_types::BlockNumber;
// Local imports
use crate::{QueryResult, StorageProcessor};

#[derive(Debug)]
pub struct MaintenanceSchema<'a, 'c>(pub &'a mut StorageProcessor<'c>);

impl<'a, 'c> MaintenanceSchema<'a, 'c> {
    /// Recomputes community post counts and ranks. Run every ~10 minutes
    /// of chain time while tracking the live head.
    pub async fn update_communities_posts_and_rank(
        &mut self,
        start_block: BlockNumber,
    ) -> QueryResult<()> {
        let start = Instant::now();
        sqlx::query("SELECT hivemind_app.update_communities_posts_and_rank($1)")
            .bind(*start_block as i32)
            .execute(self.0.conn())
            .await?;

        metrics::histogram!("sql.maintenance.communities_rank", start.elapsed());
        Ok(())
    }

    /// Regenerates the payout stats view. Run hourly and once after a
    /// massive sync.
    pub async fn generate_payout_stats(&mut self) -> QueryResult<()> {
        let start = Instant::now();
        sqlx::query("REFRESH MATERIALIZED VIEW CONCURRENTLY hivemind_app.payout_stats_view")
            .execute(self.0.conn())
            .await?;

        metrics::histogram!("sql.maintenance.payout_stats", start.elapsed());
        Ok(())
    }

    /// Rebuilds the account-mentions index. Run hourly.
    pub async fn refresh_mentions(&mut self) -> QueryResult<()> {
        let start = Instant::now();
        sqlx::query("SELECT hivemind_app.update_post_mentions()")
            .execute(self.0.conn())
            .await?;

        metrics::histogram!("sql.maintenance.mentions", start.elapsed());
        Ok(())
    }

    /// Whether the connection runs with superuser privileges. Required by
    /// the `log_explain_queries` switch.
    pub async fn is_superuser(&mut self) -> QueryResult<bool> {
        let superuser: bool =
            sqlx::query_scalar("SELECT current_setting('is_superuser') = 'on'")
                .fetch_one(self.0.conn())
                .await?;
        Ok(superuser)
    }
}
