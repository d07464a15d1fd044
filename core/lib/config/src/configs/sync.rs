// External uses
use serde::Deserialize;
// Local uses
use crate::envy_load;

fn default_max_batch() -> usize {
    1000
}

fn default_community_start_block() -> u32 {
    37_500_000
}

/// Configuration of the sync manager.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct SyncConfig {
    /// Stop after this block has been imported. Testing aid.
    pub test_max_block: Option<u32>,
    /// Past this block massive sync is not entered. Testing aid.
    pub test_last_block_for_massive: Option<u32>,
    /// Number of blocks the provider prefetches per batch.
    #[serde(default = "default_max_batch")]
    pub max_batch: usize,
    /// Height at which community processing begins.
    #[serde(default = "default_community_start_block")]
    pub community_start_block: u32,
    /// Paths to JSON files with mock blocks appended past the real chain.
    #[serde(default)]
    pub mock_block_data_path: Vec<String>,
    /// Path to a JSON file with mock virtual operations.
    pub mock_vops_data_path: Option<String>,
    /// Log EXPLAIN output for queries; requires a superuser connection.
    #[serde(default)]
    pub log_explain_queries: bool,
}

impl SyncConfig {
    pub fn from_env() -> Self {
        envy_load!("sync", "HIVEMIND_")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configs::test_utils::set_env;

    fn expected_config() -> SyncConfig {
        SyncConfig {
            test_max_block: Some(5_000_000),
            test_last_block_for_massive: None,
            max_batch: 1000,
            community_start_block: 37_500_000,
            mock_block_data_path: vec!["a.json".into(), "b.json".into()],
            mock_vops_data_path: Some("vops.json".into()),
            log_explain_queries: false,
        }
    }

    #[test]
    fn from_env() {
        let config = r#"
HIVEMIND_TEST_MAX_BLOCK="5000000"
HIVEMIND_MOCK_BLOCK_DATA_PATH="a.json,b.json"
HIVEMIND_MOCK_VOPS_DATA_PATH="vops.json"
        "#;
        set_env(config);

        let actual = SyncConfig::from_env();
        assert_eq!(actual, expected_config());
    }
}
