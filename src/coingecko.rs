//! CoinGecko `market_chart` history: `{"prices": [[epoch_ms, price], ...]}`.

use crate::error::FetchError;
use crate::history::PriceObservation;
use crate::http::get_body;
use crate::lenient::deserialize_f64_lenient;
use crate::storage_utils::CoinGeckoConfig;
use chrono::DateTime;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashSet;
use tracing::debug;

#[derive(Deserialize, Debug)]
struct MarketChart {
    #[serde(default)]
    prices: Vec<MarketChartPoint>,
}

#[derive(Deserialize, Debug)]
struct MarketChartPoint(
    #[serde(deserialize_with = "deserialize_f64_lenient")] Option<f64>,
    #[serde(deserialize_with = "deserialize_f64_lenient")] Option<f64>,
);

pub struct CoinGeckoClient<'a> {
    client: &'a Client,
    config: &'a CoinGeckoConfig,
}

impl<'a> CoinGeckoClient<'a> {
    pub fn new(client: &'a Client, config: &'a CoinGeckoConfig) -> Self {
        Self { client, config }
    }

    /// Fetches `days` of history for `coin_id`, quoted in the configured currency.
    pub async fn market_chart(
        &self,
        coin_id: &str,
        days: u32,
    ) -> Result<Vec<PriceObservation>, FetchError> {
        let url = format!(
            "{}/coins/{}/market_chart",
            self.config.base_url.trim_end_matches('/'),
            coin_id
        );
        let query = [
            ("vs_currency", self.config.vs_currency.clone()),
            ("days", days.to_string()),
        ];

        let body = get_body(self.client, &url, &query).await?;
        let observations = parse_market_chart(&body, &url)?;
        debug!(coin_id, days, rows = observations.len(), "market chart fetched");
        Ok(observations)
    }
}

/// Rows with a missing or out-of-range timestamp are skipped; the first row per
/// timestamp is kept.
pub fn parse_market_chart(body: &[u8], url: &str) -> Result<Vec<PriceObservation>, FetchError> {
    let chart: MarketChart = serde_json::from_slice(body).map_err(|source| FetchError::Malformed {
        url: url.to_string(),
        source,
    })?;

    let mut seen = HashSet::new();
    let observations: Vec<PriceObservation> = chart
        .prices
        .into_iter()
        .filter_map(|MarketChartPoint(ms, price)| {
            let timestamp = DateTime::from_timestamp_millis(ms? as i64)?.naive_utc();
            Some(PriceObservation { timestamp, price })
        })
        .filter(|o| seen.insert(o.timestamp))
        .collect();

    if observations.is_empty() {
        return Err(FetchError::EmptyPayload {
            url: url.to_string(),
        });
    }
    Ok(observations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const URL: &str = "http://test/coins/bitcoin/market_chart";

    #[test]
    fn converts_millis_and_drops_repeated_timestamps() {
        let body = br#"{"prices": [[1704067200000, 42000.5], [1704067200000, 1.0], [1704153600000, "43000"], [null, 5]]}"#;
        let rows = parse_market_chart(body, URL).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(
            rows[0].timestamp,
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap()
        );
        assert_eq!(rows[0].price, Some(42000.5));
        assert_eq!(rows[1].price, Some(43000.0));
    }

    #[test]
    fn empty_or_malformed_payloads_are_errors() {
        assert!(matches!(
            parse_market_chart(br#"{"prices": []}"#, URL),
            Err(FetchError::EmptyPayload { .. })
        ));
        assert!(matches!(
            parse_market_chart(br#"{"error": "coin not found"}"#, URL),
            Err(FetchError::EmptyPayload { .. })
        ));
        assert!(matches!(
            parse_market_chart(b"<html>", URL),
            Err(FetchError::Malformed { .. })
        ));
    }

    #[tokio::test]
    async fn requests_currency_and_lookback() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/coins/solana/market_chart"))
            .and(query_param("vs_currency", "usd"))
            .and(query_param("days", "7"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"{"prices": [[1704067200000, 101.25]]}"#),
            )
            .expect(1)
            .mount(&server)
            .await;

        let config = CoinGeckoConfig {
            base_url: server.uri(),
            ..CoinGeckoConfig::default()
        };
        let client = Client::new();
        let rows = CoinGeckoClient::new(&client, &config)
            .market_chart("solana", 7)
            .await
            .unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].price, Some(101.25));
    }

    #[tokio::test]
    async fn rate_limited_response_surfaces_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .mount(&server)
            .await;

        let config = CoinGeckoConfig {
            base_url: server.uri(),
            ..CoinGeckoConfig::default()
        };
        let client = Client::new();
        let err = CoinGeckoClient::new(&client, &config)
            .market_chart("bitcoin", 3)
            .await
            .unwrap_err();

        match err {
            FetchError::Status { status, body, .. } => {
                assert_eq!(status.as_u16(), 429);
                assert_eq!(body, "slow down");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
