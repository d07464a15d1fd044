//! Storage crate provides the interfaces to interact with the hivemind
//! database. The backend database is `Postgres`, accessed through the
//! `sqlx` crate.
//!
//! The essential structure of this crate is the `StorageProcessor`, which
//! holds down the connection to the database and provides abstract
//! interfaces to modify it (called `Schema`s).
//!
//! # Schema Hierarchy
//!
//! - `blocks`, the block store: the `hive_blocks` table, its flush and the
//!   fork-pop delete sequence.
//! - `haf`, the upstream provider surface: application-context primitives
//!   and block/virtual-operation fetches against the HAF views.
//! - `chain`, the bulk writes commanded by the domain flushers (accounts,
//!   posts, tags, votes, payments, follows).
//! - `maintenance`, the periodic statements run between single blocks.
//!
//! Most schema modules contain a `mod.rs` with the schema itself and a
//! `records.rs` with the row structures of the associated tables.
//!
//! # Testing Approach
//!
//! Tests that touch an actual Postgres instance are gated behind the
//! `db_test` feature and expect `DATABASE_URL` to point at an empty
//! database; they run inside transactions that are never committed.

// Built-in deps
// External imports
use sqlx::{postgres::Postgres, Connection, PgConnection, Transaction};
// Workspace imports
// Local imports
use crate::connection::{holder::ConnectionHolder, PooledConnection};

pub mod blocks;
pub mod chain;
pub mod connection;
pub mod haf;
pub mod maintenance;

pub use crate::connection::ConnectionPool;
pub type QueryResult<T> = Result<T, anyhow::Error>;

/// Storage processor is the main storage interaction point.
/// It holds down the connection (either direct or pooled) to the database
/// and provide methods to obtain different storage schemas.
#[derive(Debug)]
pub struct StorageProcessor<'a> {
    conn: ConnectionHolder<'a>,
    in_transaction: bool,
}

impl<'a> StorageProcessor<'a> {
    /// Creates a `StorageProcessor` using an unique sole connection to the database.
    pub async fn establish_connection<'b>(database_url: &str) -> QueryResult<StorageProcessor<'b>> {
        let connection = PgConnection::connect(database_url).await?;
        Ok(StorageProcessor {
            conn: ConnectionHolder::Direct(connection),
            in_transaction: false,
        })
    }

    pub async fn start_transaction<'c: 'b, 'b>(
        &'c mut self,
    ) -> Result<StorageProcessor<'b>, anyhow::Error> {
        let transaction = self.conn().begin().await?;

        let mut processor = StorageProcessor::from_transaction(transaction);
        processor.in_transaction = true;

        Ok(processor)
    }

    /// Checks if the `StorageProcessor` is currently within a database transaction.
    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    pub fn from_transaction(conn: Transaction<'_, Postgres>) -> StorageProcessor<'_> {
        StorageProcessor {
            conn: ConnectionHolder::Transaction(conn),
            in_transaction: true,
        }
    }

    pub async fn commit(self) -> QueryResult<()> {
        if let ConnectionHolder::Transaction(transaction) = self.conn {
            transaction.commit().await?;
            Ok(())
        } else {
            panic!("StorageProcessor::commit can only be invoked after calling StorageProcessor::start_transaction");
        }
    }

    /// Creates a `StorageProcessor` using a pool of connections.
    /// This method borrows one of the connections from the pool, and releases it
    /// after `drop`.
    pub fn from_pool(conn: PooledConnection) -> Self {
        Self {
            conn: ConnectionHolder::Pooled(conn),
            in_transaction: false,
        }
    }

    /// Gains access to the `Blocks` schema.
    pub fn blocks_schema(&mut self) -> blocks::BlocksSchema<'_, 'a> {
        blocks::BlocksSchema(self)
    }

    /// Gains access to the `Haf` schema.
    pub fn haf_schema(&mut self) -> haf::HafSchema<'_, 'a> {
        haf::HafSchema(self)
    }

    /// Gains access to the `Chain` schema.
    pub fn chain_schema(&mut self) -> chain::ChainSchema<'_, 'a> {
        chain::ChainSchema(self)
    }

    /// Gains access to the `Maintenance` schema.
    pub fn maintenance_schema(&mut self) -> maintenance::MaintenanceSchema<'_, 'a> {
        maintenance::MaintenanceSchema(self)
    }

    fn conn(&mut self) -> &mut PgConnection {
        match &mut self.conn {
            ConnectionHolder::Pooled(conn) => conn,
            ConnectionHolder::Direct(conn) => conn,
            ConnectionHolder::Transaction(conn) => conn,
        }
    }
}
