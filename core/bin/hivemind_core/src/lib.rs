//! Block-ingestion core of the hivemind social indexer.
//!
//! Consumes the append-only stream of signed blocks served by the HAF
//! database, dispatches their operations to the domain sub-processors,
//! and advances the durable head cursor in lock-step with the upstream
//! block log.

pub mod domain;
pub mod error;
pub mod fork;
pub mod mocks;
pub mod processor;
pub mod provider;
pub mod signal;
pub mod sync;
