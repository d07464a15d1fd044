// Built-in deps
use std::fmt;
// External imports
use async_trait::async_trait;
use deadpool::managed::{Manager, PoolConfig, RecycleResult, Timeouts};
use deadpool::Runtime;
use sqlx::{Connection, Error as SqlxError, PgConnection};
// Workspace imports
use hivemind_config::DbConfig;
// Local imports
use crate::StorageProcessor;

pub mod holder;

type Pool = deadpool::managed::Pool<DbPool>;

pub type PooledConnection = deadpool::managed::Object<DbPool>;

#[derive(Clone)]
pub(crate) struct DbPool {
    url: String,
}

impl DbPool {
    fn create(url: impl Into<String>, max_size: usize) -> Pool {
        let pool_config = PoolConfig {
            max_size,
            timeouts: Timeouts::wait_millis(20_000), // wait 20 seconds before returning error
            runtime: Runtime::Tokio1,
        };
        Pool::from_config(DbPool { url: url.into() }, pool_config)
    }
}

#[async_trait]
impl Manager for DbPool {
    type Type = PgConnection;
    type Error = SqlxError;

    async fn create(&self) -> Result<PgConnection, SqlxError> {
        PgConnection::connect(&self.url).await
    }
    async fn recycle(&self, obj: &mut PgConnection) -> RecycleResult<SqlxError> {
        Ok(obj.ping().await?)
    }
}

/// `ConnectionPool` encapsulates a fixed-size pool of connections to the
/// hivemind database, sized and pointed by [`DbConfig`].
#[derive(Clone)]
pub struct ConnectionPool {
    pool: Pool,
}

impl fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hivemind connection pool")
    }
}

impl ConnectionPool {
    /// Establishes a pool of the connections to the database and
    /// creates a new `ConnectionPool` object.
    /// `pool_max_size` overrides the configured pool size when set.
    pub fn new(config: &DbConfig, pool_max_size: Option<usize>) -> Self {
        let max_size = pool_max_size.unwrap_or(config.pool_size);

        let pool = DbPool::create(config.url.clone(), max_size);

        Self { pool }
    }

    /// Creates a `StorageProcessor` entity over a pooled connection.
    /// Blocks until a connection can be handed out, or fails after the
    /// pool timeout on a database outage.
    pub async fn access_storage(&self) -> crate::QueryResult<StorageProcessor<'_>> {
        let connection = self
            .pool
            .get()
            .await
            .map_err(|err| anyhow::anyhow!("Failed to get connection from the pool: {}", err))?;

        Ok(StorageProcessor::from_pool(connection))
    }
}
