//! Configuration of the hivemind indexer, loaded from environment
//! variables section by section.

pub mod configs;

pub use crate::configs::{DbConfig, HivemindConfig, SyncConfig};

/// Convenience macro that loads the structure from the environment variables given the prefix.
///
/// # Panics
///
/// Panics if the config cannot be loaded from the environment variables.
#[macro_export]
macro_rules! envy_load {
    ($name:expr, $prefix:expr) => {
        envy::prefixed($prefix)
            .from_env()
            .unwrap_or_else(|err| panic!("Cannot load config <{}>: {}", $name, err))
    };
}
