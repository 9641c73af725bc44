use chrono::Utc;
use price_history::analysis::run_history_status;
use price_history::logging;
use price_history::storage_utils::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();
    let config = AppConfig::load().await?;

    println!("\n--- Stored price histories in {} ---", config.data_dir.display());
    run_history_status(&config, Utc::now().naive_utc()).await?;

    Ok(())
}
