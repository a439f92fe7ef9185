// =============================================================================
// CoinGecko REST Client
// =============================================================================
//
// Three public v3 endpoints feed the dashboard:
//   GET /simple/price               — spot price + 24h change
//   GET /coins/{id}/ohlc            — `[t, o, h, l, c]` candles
//   GET /coins/{id}/market_chart    — `total_volumes` as `[t, volume]` pairs
//
// The demo API key, when present, is sent as `x-cg-demo-api-key` on every
// request via the client's default headers.
// =============================================================================

use std::collections::HashMap;

use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::types::Candle;

pub const DEFAULT_BASE_URL: &str = "https://api.coingecko.com/api/v3";

/// Spot price and the provider's rolling 24h percentage change.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpotPrice {
    pub price: f64,
    pub change_24h: Option<f64>,
}

#[derive(Deserialize)]
struct MarketChart {
    #[serde(default)]
    total_volumes: Vec<(f64, f64)>,
}

pub struct CoinGeckoClient {
    base_url: String,
    has_key: bool,
    client: reqwest::Client,
}

impl CoinGeckoClient {
    pub fn new(api_key: Option<String>) -> Result<Self> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(api_key: Option<String>, base_url: impl Into<String>) -> Result<Self> {
        let api_key = api_key.filter(|k| !k.trim().is_empty());

        let mut default_headers = HeaderMap::new();
        if let Some(key) = &api_key {
            let val = HeaderValue::from_str(key.trim())
                .context("CoinGecko API key is not a valid header value")?;
            default_headers.insert("x-cg-demo-api-key", val);
        }

        let client = reqwest::Client::builder()
            .default_headers(default_headers)
            .timeout(std::time::Duration::from_secs(15))
            .build()
            .context("failed to build reqwest client for CoinGeckoClient")?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            has_key: api_key.is_some(),
            client,
        })
    }

    /// `true` when a demo API key was supplied.
    pub fn has_key(&self) -> bool {
        self.has_key
    }

    /// GET /simple/price for one coin in one quote currency.
    #[instrument(skip(self), name = "coingecko::simple_price")]
    pub async fn simple_price(&self, coin_id: &str, vs_currency: &str) -> Result<SpotPrice> {
        let path = format!(
            "/simple/price?ids={coin_id}&vs_currencies={vs_currency}&include_24hr_change=true"
        );
        let body: HashMap<String, HashMap<String, Option<f64>>> =
            self.get_json(&path, "/simple/price").await?;
        let spot = parse_simple_price(&body, coin_id, vs_currency)?;

        debug!(price = spot.price, change_24h = ?spot.change_24h, "spot price fetched");
        Ok(spot)
    }

    /// GET /coins/{id}/ohlc over the last `days` days.
    #[instrument(skip(self), name = "coingecko::ohlc")]
    pub async fn ohlc(&self, coin_id: &str, vs_currency: &str, days: u32) -> Result<Vec<Candle>> {
        let path = format!("/coins/{coin_id}/ohlc?vs_currency={vs_currency}&days={days}");
        let candles: Vec<Candle> = self.get_json(&path, "/coins/{id}/ohlc").await?;

        debug!(count = candles.len(), "ohlc fetched");
        Ok(candles)
    }

    /// GET /coins/{id}/market_chart, returning only `total_volumes`.
    #[instrument(skip(self), name = "coingecko::volumes")]
    pub async fn volumes(
        &self,
        coin_id: &str,
        vs_currency: &str,
        days: u32,
    ) -> Result<Vec<(f64, f64)>> {
        let path = format!("/coins/{coin_id}/market_chart?vs_currency={vs_currency}&days={days}");
        let chart: MarketChart = self.get_json(&path, "/coins/{id}/market_chart").await?;

        debug!(count = chart.total_volumes.len(), "volumes fetched");
        Ok(chart.total_volumes)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, endpoint: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("GET {endpoint} request failed"))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("CoinGecko GET {} returned {}: {}", endpoint, status, body);
        }

        resp.json()
            .await
            .with_context(|| format!("failed to parse {endpoint} response"))
    }
}

impl std::fmt::Debug for CoinGeckoClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoinGeckoClient")
            .field("api_key", &if self.has_key { "<redacted>" } else { "<none>" })
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Pick `{coin: {vs: price, vs_24h_change: pct}}` out of a /simple/price body.
fn parse_simple_price(
    body: &HashMap<String, HashMap<String, Option<f64>>>,
    coin_id: &str,
    vs_currency: &str,
) -> Result<SpotPrice> {
    let quote = body
        .get(coin_id)
        .with_context(|| format!("coin '{coin_id}' missing from /simple/price response"))?;
    let price = quote
        .get(vs_currency)
        .copied()
        .flatten()
        .with_context(|| format!("no '{vs_currency}' price for '{coin_id}'"))?;
    let change_24h = quote
        .get(&format!("{vs_currency}_24h_change"))
        .copied()
        .flatten();

    Ok(SpotPrice { price, change_24h })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_price_with_change() {
        let body = serde_json::from_str(
            r#"{"cardano":{"usd":0.4512,"usd_24h_change":-2.314}}"#,
        )
        .unwrap();
        let spot = parse_simple_price(&body, "cardano", "usd").unwrap();
        assert_eq!(spot.price, 0.4512);
        assert_eq!(spot.change_24h, Some(-2.314));
    }

    #[test]
    fn simple_price_null_change() {
        let body =
            serde_json::from_str(r#"{"cardano":{"usd":0.4512,"usd_24h_change":null}}"#).unwrap();
        let spot = parse_simple_price(&body, "cardano", "usd").unwrap();
        assert!(spot.change_24h.is_none());
    }

    #[test]
    fn simple_price_missing_coin_is_error() {
        let body = serde_json::from_str(r#"{}"#).unwrap();
        let err = parse_simple_price(&body, "cardano", "usd").unwrap_err();
        assert!(err.to_string().contains("cardano"));
    }

    #[test]
    fn ohlc_rows_become_candles() {
        let candles: Vec<Candle> = serde_json::from_str(
            "[[1700000000000, 0.44, 0.46, 0.43, 0.45], [1700001800000, 0.45, 0.47, 0.44, 0.46]]",
        )
        .unwrap();
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[1].close, 0.46);
    }

    #[test]
    fn market_chart_keeps_total_volumes() {
        let chart: MarketChart = serde_json::from_str(
            r#"{"prices":[[1,0.45]],"market_caps":[[1,1.6e10]],"total_volumes":[[1,2.5e8],[2,2.6e8]]}"#,
        )
        .unwrap();
        assert_eq!(chart.total_volumes, vec![(1.0, 2.5e8), (2.0, 2.6e8)]);
        let empty: MarketChart = serde_json::from_str("{}").unwrap();
        assert!(empty.total_volumes.is_empty());
    }

    #[test]
    fn blank_key_counts_as_missing() {
        assert!(!CoinGeckoClient::new(Some("  ".into())).unwrap().has_key());
        assert!(!CoinGeckoClient::new(None).unwrap().has_key());
        let client = CoinGeckoClient::new(Some("CG-demo".into())).unwrap();
        assert!(client.has_key());
        assert!(format!("{client:?}").contains("<redacted>"));
    }
}
