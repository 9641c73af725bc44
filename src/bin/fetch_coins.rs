use chrono::Utc;
use price_history::logging;
use price_history::storage_utils::AppConfig;
use price_history::updater::{UpdateOutcome, update_coins};
use reqwest::Client;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();
    let config = AppConfig::load().await?;

    println!("\n--- Updating CoinGecko price histories ---");
    let client = Client::new();
    let reports = update_coins(&client, &config, Utc::now().naive_utc()).await;

    let failed = reports
        .iter()
        .filter(|r| matches!(r.outcome, UpdateOutcome::Failed(_)))
        .count();
    println!(
        "\n📊 {} asset(s) processed, {} failed. Data in {}",
        reports.len(),
        failed,
        config.data_dir.display()
    );

    Ok(())
}
