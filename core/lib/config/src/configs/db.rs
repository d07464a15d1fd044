// External uses
use serde::Deserialize;
// Local uses
use crate::envy_load;

/// Used database configuration.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct DbConfig {
    /// Amount of open connections to the database held by the indexer in the pool.
    pub pool_size: usize,
    /// Database URL.
    pub url: String,
}

impl DbConfig {
    pub fn from_env() -> Self {
        envy_load!("db", "DATABASE_")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configs::test_utils::set_env;

    fn expected_config() -> DbConfig {
        DbConfig {
            pool_size: 4,
            url: "postgres://postgres@localhost/haf_block_log".into(),
        }
    }

    #[test]
    fn from_env() {
        let config = r#"
DATABASE_POOL_SIZE="4"
DATABASE_URL="postgres://postgres@localhost/haf_block_log"
        "#;
        set_env(config);

        let actual = DbConfig::from_env();
        assert_eq!(actual, expected_config());
    }
}
