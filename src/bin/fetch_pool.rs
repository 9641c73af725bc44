use price_history::logging;
use price_history::storage_utils::AppConfig;
use price_history::updater::update_pool;
use reqwest::Client;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();
    let config = AppConfig::load().await?;
    let pool = &config.geckoterminal;

    println!(
        "\n--- Updating {} pool {} ({}) ---",
        pool.network, pool.pool_address, pool.timeframe
    );
    let client = Client::new();
    update_pool(&client, &config).await;

    Ok(())
}
