//! GeckoTerminal pool OHLCV. Only the close is kept, relabelled as the price.

use crate::error::FetchError;
use crate::history::PriceObservation;
use crate::http::get_body;
use crate::lenient::deserialize_f64_lenient;
use crate::storage_utils::GeckoTerminalConfig;
use chrono::DateTime;
use reqwest::Client;
use serde::Deserialize;
use tracing::info;

#[derive(Deserialize, Debug, Default)]
struct OhlcvResponse {
    #[serde(default)]
    data: OhlcvData,
}

#[derive(Deserialize, Debug, Default)]
struct OhlcvData {
    #[serde(default)]
    attributes: OhlcvAttributes,
}

#[derive(Deserialize, Debug, Default)]
struct OhlcvAttributes {
    #[serde(default)]
    ohlcv_list: Vec<Candle>,
}

// [epoch_s, open, high, low, close, volume]
#[derive(Deserialize, Debug)]
struct Candle(
    #[serde(deserialize_with = "deserialize_f64_lenient")] Option<f64>,
    serde::de::IgnoredAny,
    serde::de::IgnoredAny,
    serde::de::IgnoredAny,
    #[serde(deserialize_with = "deserialize_f64_lenient")] Option<f64>,
    serde::de::IgnoredAny,
);

pub struct GeckoTerminalClient<'a> {
    client: &'a Client,
    config: &'a GeckoTerminalConfig,
}

impl<'a> GeckoTerminalClient<'a> {
    pub fn new(client: &'a Client, config: &'a GeckoTerminalConfig) -> Self {
        Self { client, config }
    }

    pub fn ohlcv_url(&self) -> String {
        format!(
            "{}/networks/{}/pools/{}/ohlcv/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.network,
            self.config.pool_address,
            self.config.timeframe
        )
    }

    /// Fetches the pool's candles for the configured timeframe as close prices.
    pub async fn close_prices(&self) -> Result<Vec<PriceObservation>, FetchError> {
        let url = self.ohlcv_url();
        info!(%url, "querying pool OHLCV");
        let body = get_body(self.client, &url, &[]).await?;
        parse_ohlcv(&body, &url)
    }
}

pub fn parse_ohlcv(body: &[u8], url: &str) -> Result<Vec<PriceObservation>, FetchError> {
    let response: OhlcvResponse =
        serde_json::from_slice(body).map_err(|source| FetchError::Malformed {
            url: url.to_string(),
            source,
        })?;

    let observations: Vec<PriceObservation> = response
        .data
        .attributes
        .ohlcv_list
        .into_iter()
        .filter_map(|Candle(secs, _, _, _, close, _)| {
            let timestamp = DateTime::from_timestamp(secs? as i64, 0)?.naive_utc();
            Some(PriceObservation {
                timestamp,
                price: close,
            })
        })
        .collect();

    if observations.is_empty() {
        return Err(FetchError::EmptyPayload {
            url: url.to_string(),
        });
    }
    Ok(observations)
}
