use chrono::Utc;
use price_history::analysis::{load_assets, run_trend_drawdown};
use price_history::logging;
use price_history::period::DateWindow;
use price_history::prompt::{banner, read_line, select_index};
use price_history::storage_utils::AppConfig;
use std::io;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();
    let config = AppConfig::load().await?;

    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut output = io::stdout();

    let assets = load_assets(&config).await?;
    if assets.is_empty() {
        println!("⚠️ No history files in {}", config.data_dir.display());
        return Ok(());
    }

    banner(&mut output, "📉 TREND & DRAWDOWN")?;
    println!("\nAvailable histories:");
    for (i, asset) in assets.iter().enumerate() {
        println!("{}. {} ({} rows)", i + 1, asset.name, asset.history.len());
    }

    let Some(raw) = read_line(&mut input, &mut output, "\n➡️  Select a file by number: ")? else {
        return Ok(());
    };
    let asset = match select_index(&raw, assets.len()) {
        Ok(i) => &assets[i],
        Err(e) => {
            println!("❌ {e}");
            return Ok(());
        }
    };

    if let (Some(first), Some(last)) = (asset.history.first_timestamp(), asset.history.last_timestamp()) {
        println!("\n📅 {} data available from {} to {}", asset.name, first.date(), last.date());
    }

    let Some(start) = read_line(&mut input, &mut output, "Start date (YYYY-MM-DD): ")? else {
        return Ok(());
    };
    let Some(end) = read_line(&mut input, &mut output, "End date (YYYY-MM-DD): ")? else {
        return Ok(());
    };
    let window = match DateWindow::custom(&start, &end) {
        Ok(window) => window,
        Err(e) => {
            println!("❌ {e}");
            return Ok(());
        }
    };

    run_trend_drawdown(&config, asset, &window, Utc::now().naive_utc()).await?;
    Ok(())
}
