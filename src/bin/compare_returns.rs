use chrono::Utc;
use price_history::analysis::{earliest_stored_date, run_comparison};
use price_history::logging;
use price_history::prompt::{clear_screen, select_period, wait_for_enter};
use price_history::storage_utils::AppConfig;
use std::io;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();
    let config = AppConfig::load().await?;

    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut output = io::stdout();

    loop {
        clear_screen();
        let now = Utc::now().naive_utc();
        let earliest = earliest_stored_date(&config.data_dir).await;

        let Some(window) = select_period(&mut input, &mut output, now.date(), earliest)? else {
            println!("\n👋 Bye!");
            break;
        };

        if let Err(e) = run_comparison(&config, &window, now).await {
            eprintln!("❌ Analysis failed: {e:#}");
        }

        wait_for_enter(&mut input, &mut output, "\nPress ENTER to choose another period...")?;
    }

    Ok(())
}
