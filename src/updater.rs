//! Fetch → merge → persist, one asset at a time.
//!
//! A failure in one asset (remote or local) is recorded in that asset's report
//! and the loop moves on. A failed asset's history file is never rewritten.

use crate::coingecko::CoinGeckoClient;
use crate::geckoterminal::GeckoTerminalClient;
use crate::history::{self, PriceHistory, PriceObservation, history_path};
use crate::merge::{MergeOutcome, merge};
use crate::storage_utils::{AppConfig, CoinAsset, CoinGeckoConfig, GeckoTerminalConfig};
use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use reqwest::Client;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome {
    Created(usize),
    Appended(usize),
    NothingNew,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateReport {
    pub asset: String,
    pub path: PathBuf,
    pub outcome: UpdateOutcome,
}

impl fmt::Display for UpdateReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = self.path.display();
        match &self.outcome {
            UpdateOutcome::Created(n) => write!(f, "✅ Saved: {path} ({n} records)"),
            UpdateOutcome::Appended(n) => {
                let noun = if *n == 1 { "record" } else { "records" };
                write!(f, "✅ Updated: {path} with {n} new {noun}")
            }
            UpdateOutcome::NothingNew => write!(f, "⚠️ No new data for {}", self.asset),
            UpdateOutcome::Failed(reason) => {
                write!(f, "❌ Failed to update {}: {reason}", self.asset)
            }
        }
    }
}

/// Days to request so the gap since `last` is covered, plus padding.
pub fn lookback_days(last: Option<NaiveDateTime>, now: NaiveDateTime, config: &CoinGeckoConfig) -> u32 {
    match last {
        Some(last) => {
            let gap = (now - last).num_days().max(0) as u32;
            (gap + config.update_padding_days).max(1)
        }
        None => config.initial_lookback_days.max(1),
    }
}

/// Merges `incoming` into the table at `path` and writes it unless nothing is new.
pub async fn apply_batch(
    path: &Path,
    existing: Option<&PriceHistory>,
    incoming: Vec<PriceObservation>,
) -> Result<UpdateOutcome> {
    let outcome = match merge(existing, incoming) {
        MergeOutcome::Created { history, added } => {
            history::save(path, &history).await?;
            UpdateOutcome::Created(added)
        }
        MergeOutcome::Appended { history, added } => {
            history::save(path, &history).await?;
            UpdateOutcome::Appended(added)
        }
        MergeOutcome::NothingNew => UpdateOutcome::NothingNew,
    };
    Ok(outcome)
}

fn settle(asset: &str, path: PathBuf, result: Result<UpdateOutcome>) -> UpdateReport {
    let outcome = result.unwrap_or_else(|e| {
        warn!(asset, error = %format!("{e:#}"), "update failed");
        UpdateOutcome::Failed(format!("{e:#}"))
    });
    info!(asset, ?outcome, "update finished");
    UpdateReport {
        asset: asset.to_string(),
        path,
        outcome,
    }
}

async fn update_coin(
    gecko: &CoinGeckoClient<'_>,
    coin: &CoinAsset,
    path: &Path,
    config: &CoinGeckoConfig,
    now: NaiveDateTime,
) -> Result<UpdateOutcome> {
    let existing = history::load(path).await?;
    let last = existing.as_ref().and_then(PriceHistory::last_timestamp);
    let days = lookback_days(last, now, config);

    match last {
        Some(last) => println!("🔄 Updating {} since {} (+{} days)", coin.name, last.date(), days),
        None => println!("📥 Creating initial history for {}", coin.name),
    }

    let incoming = gecko
        .market_chart(&coin.coin_id, days)
        .await
        .with_context(|| format!("fetching {}", coin.coin_id))?;

    apply_batch(path, existing.as_ref(), incoming).await
}

/// Updates every configured CoinGecko asset in order.
pub async fn update_coins(client: &Client, config: &AppConfig, now: NaiveDateTime) -> Vec<UpdateReport> {
    let gecko = CoinGeckoClient::new(client, &config.coingecko);
    let mut reports = Vec::with_capacity(config.coingecko.coins.len());

    for coin in &config.coingecko.coins {
        let path = history_path(&config.data_dir, &coin.name);
        let result = update_coin(&gecko, coin, &path, &config.coingecko, now).await;
        let report = settle(&coin.name, path, result);
        println!("{report}");
        reports.push(report);
    }

    reports
}

async fn fetch_and_merge_pool(
    client: &Client,
    pool: &GeckoTerminalConfig,
    path: &Path,
) -> Result<UpdateOutcome> {
    let incoming = GeckoTerminalClient::new(client, pool)
        .close_prices()
        .await
        .context("fetching pool OHLCV")?;
    let existing = history::load(path).await?;
    apply_batch(path, existing.as_ref(), incoming).await
}

/// Fetches the configured pool first; the stored table is only read once the
/// fetch has succeeded.
pub async fn update_pool(client: &Client, config: &AppConfig) -> UpdateReport {
    let pool = &config.geckoterminal;
    let path = history_path(&config.data_dir, &pool.name);

    let result = fetch_and_merge_pool(client, pool, &path).await;
    let report = settle(&pool.name, path, result);
    println!("{report}");
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::parse_timestamp;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn ts(s: &str) -> NaiveDateTime {
        parse_timestamp(s).unwrap()
    }

    fn config_for(server: &MockServer, data_dir: &Path, coins: &[&str]) -> AppConfig {
        AppConfig {
            data_dir: data_dir.to_path_buf(),
            coingecko: CoinGeckoConfig {
                base_url: server.uri(),
                coins: coins
                    .iter()
                    .map(|c| CoinAsset {
                        name: c.to_string(),
                        coin_id: c.to_string(),
                    })
                    .collect(),
                ..CoinGeckoConfig::default()
            },
            geckoterminal: GeckoTerminalConfig {
                base_url: server.uri(),
                pool_address: "POOL".to_string(),
                ..GeckoTerminalConfig::default()
            },
            ..AppConfig::default()
        }
    }

    #[test]
    fn lookback_covers_gap_plus_padding() {
        let config = CoinGeckoConfig::default();
        let now = ts("2024-01-10 06:00:00");

        assert_eq!(lookback_days(None, now, &config), 120);
        assert_eq!(lookback_days(Some(ts("2024-01-05 00:00:00")), now, &config), 7);
        assert_eq!(lookback_days(Some(ts("2024-01-10 05:00:00")), now, &config), 2);
        assert_eq!(lookback_days(Some(ts("2024-02-01")), now, &config), 2);
    }

    #[test]
    fn report_lines_are_human_readable() {
        let report = UpdateReport {
            asset: "bitcoin".to_string(),
            path: PathBuf::from("price_data/bitcoin_price_history.csv"),
            outcome: UpdateOutcome::Appended(1),
        };
        assert_eq!(
            report.to_string(),
            "✅ Updated: price_data/bitcoin_price_history.csv with 1 new record"
        );
    }

    #[tokio::test]
    async fn nothing_new_leaves_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = history_path(dir.path(), "bitcoin");
        let existing = PriceHistory::from_observations(vec![
            PriceObservation::new(ts("2024-01-01"), 100.0),
            PriceObservation::new(ts("2024-01-02"), 105.0),
        ]);
        history::save(&path, &existing).await.unwrap();
        let before = std::fs::read(&path).unwrap();

        let outcome = apply_batch(
            &path,
            Some(&existing),
            vec![PriceObservation::new(ts("2024-01-02"), 999.0)],
        )
        .await
        .unwrap();

        assert_eq!(outcome, UpdateOutcome::NothingNew);
        assert_eq!(std::fs::read(&path).unwrap(), before);
    }

    #[tokio::test]
    async fn one_failing_coin_does_not_stop_the_batch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/coins/bitcoin/market_chart"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/coins/solana/market_chart"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"{"prices": [[1704067200000, 100.0], [1704153600000, 101.0]]}"#),
            )
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let config = config_for(&server, dir.path(), &["bitcoin", "solana"]);

        let btc_path = history_path(dir.path(), "bitcoin");
        let btc = PriceHistory::from_observations(vec![PriceObservation::new(ts("2023-12-30"), 42000.0)]);
        history::save(&btc_path, &btc).await.unwrap();
        let btc_before = std::fs::read(&btc_path).unwrap();

        let reports = update_coins(&Client::new(), &config, ts("2024-01-03 00:00:00")).await;

        assert_eq!(reports.len(), 2);
        assert!(matches!(reports[0].outcome, UpdateOutcome::Failed(_)));
        assert_eq!(reports[1].outcome, UpdateOutcome::Created(2));
        assert_eq!(std::fs::read(&btc_path).unwrap(), btc_before);

        let sol = history::load(&history_path(dir.path(), "solana")).await.unwrap().unwrap();
        assert_eq!(sol.len(), 2);
    }

    #[tokio::test]
    async fn pool_update_appends_only_newer_candles() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/networks/solana/pools/POOL/ohlcv/day"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"data": {"attributes": {"ohlcv_list": [
                    [1704153600, 0, 0, 0, 0.02, 0],
                    [1704067200, 0, 0, 0, 0.01, 0]
                ]}}}"#,
            ))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let config = config_for(&server, dir.path(), &[]);
        let path = history_path(dir.path(), "qflow");
        history::save(
            &path,
            &PriceHistory::from_observations(vec![PriceObservation::new(ts("2024-01-01"), 0.5)]),
        )
        .await
        .unwrap();

        let report = update_pool(&Client::new(), &config).await;
        assert_eq!(report.outcome, UpdateOutcome::Appended(1));

        let stored = history::load(&path).await.unwrap().unwrap();
        let prices: Vec<_> = stored.observations().iter().map(|o| o.price).collect();
        assert_eq!(prices, vec![Some(0.5), Some(0.02)]);

        let again = update_pool(&Client::new(), &config).await;
        assert_eq!(again.outcome, UpdateOutcome::NothingNew);
    }
}
