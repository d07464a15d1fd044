// External deps
use serde::Deserialize;

// Public re-exports
pub use self::{db::DbConfig, sync::SyncConfig};

pub mod db;
pub mod sync;

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct HivemindConfig {
    pub db: DbConfig,
    pub sync: SyncConfig,
}

impl HivemindConfig {
    pub fn from_env() -> Self {
        Self {
            db: DbConfig::from_env(),
            sync: SyncConfig::from_env(),
        }
    }
}

#[cfg(test)]
pub(crate) mod test_utils;
