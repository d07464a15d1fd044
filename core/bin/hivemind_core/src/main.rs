use std::sync::Arc;

use hivemind_config::HivemindConfig;
use hivemind_storage::ConnectionPool;

use hivemind_core::mocks::MockChainData;
use hivemind_core::provider::HafBlockProvider;
use hivemind_core::signal::ShutdownFlag;
use hivemind_core::sync::SyncManager;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = HivemindConfig::from_env();
    log::info!(
        "Using HAF database as block data provider, pointed by url: '{}'",
        config.db.url
    );

    let shutdown = ShutdownFlag::new();
    shutdown.install_ctrlc_handler()?;

    let mut mocks = MockChainData::default();
    for path in &config.sync.mock_block_data_path {
        mocks.load_block_file(path)?;
    }
    if let Some(path) = &config.sync.mock_vops_data_path {
        mocks.load_vops_file(path)?;
    }

    let pool = ConnectionPool::new(&config.db, None);
    let provider = Arc::new(HafBlockProvider::new(pool.clone(), mocks));

    let mut manager = SyncManager::new(config.sync, pool, provider, shutdown).await?;
    if let Err(err) = manager.run().await {
        if err.is_fatal() {
            log::error!("Fatal: {}", err);
        } else {
            log::error!("Sync aborted: {:#}", anyhow::Error::from(err));
        }
        std::process::exit(1);
    }

    Ok(())
}
