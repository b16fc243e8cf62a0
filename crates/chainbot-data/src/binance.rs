//! Binance spot market data over the public REST API.

use crate::cache::CandleCache;
use async_trait::async_trait;
use chainbot_core::error::DataError;
use chainbot_core::traits::MarketData;
use chainbot_core::types::{Bar, Timeframe};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, trace, warn};

/// Binance caps `limit` on the klines endpoint.
const MAX_KLINES: usize = 1000;

/// Connection settings for [`BinanceMarketData`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BinanceConfig {
    pub base_url: String,
    pub quote_asset: String,
    pub cache_ttl_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for BinanceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.binance.com".to_string(),
            quote_asset: "USDT".to_string(),
            cache_ttl_secs: 30,
            request_timeout_secs: 10,
        }
    }
}

/// Candle and price feed backed by `/api/v3/klines` and `/api/v3/ticker/price`.
pub struct BinanceMarketData {
    client: reqwest::Client,
    config: BinanceConfig,
    candles: Mutex<CandleCache<Vec<Bar>>>,
    prices: Mutex<CandleCache<f64>>,
}

impl BinanceMarketData {
    pub fn new(config: BinanceConfig) -> Result<Self, DataError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs.max(1)))
            .build()
            .map_err(|e| DataError::ConnectionError(e.to_string()))?;
        let ttl = Duration::from_secs(config.cache_ttl_secs);

        Ok(Self {
            client,
            candles: Mutex::new(CandleCache::new(ttl)),
            prices: Mutex::new(CandleCache::new(ttl)),
            config,
        })
    }

    /// Exchange symbol for a user-facing one: `eth` → `ETHUSDT`.
    pub fn pair_symbol(&self, symbol: &str) -> String {
        let upper = symbol.trim().to_uppercase();
        let quote = self.config.quote_asset.to_uppercase();
        if upper.len() > quote.len() && upper.ends_with(&quote) {
            upper
        } else {
            format!("{upper}{quote}")
        }
    }

    async fn get(&self, path: &str, params: &[(&str, &str)]) -> Result<Value, DataError> {
        let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), path);
        let resp = self
            .client
            .get(&url)
            .query(params)
            .send()
            .await
            .map_err(|e| DataError::ConnectionError(format!("GET {url}: {e}")))?;

        let status = resp.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            warn!(url = %url, "rate limited");
            return Err(DataError::RateLimited(url));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(url = %url, status = %status, "market data request failed");
            if status == reqwest::StatusCode::BAD_REQUEST && body.contains("Invalid symbol") {
                let symbol = params
                    .iter()
                    .find(|(k, _)| *k == "symbol")
                    .map(|(_, v)| v.to_string())
                    .unwrap_or_default();
                return Err(DataError::SymbolNotFound(symbol));
            }
            return Err(DataError::ConnectionError(format!("HTTP {status} from {url}: {body}")));
        }

        resp.json::<Value>()
            .await
            .map_err(|e| DataError::ParseError(format!("JSON from {url}: {e}")))
    }
}

#[async_trait]
impl MarketData for BinanceMarketData {
    async fn candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Bar>, DataError> {
        let pair = self.pair_symbol(symbol);
        let limit = limit.clamp(1, MAX_KLINES);
        let key = format!("{pair}:{timeframe}:{limit}");

        if let Some(bars) = self.candles.lock().await.get(&key) {
            trace!(key = %key, "kline cache hit");
            return Ok(bars);
        }

        let started = Instant::now();
        let interval = timeframe.to_string();
        // One extra row covers the still-open candle that gets dropped.
        let fetch = (limit + 1).min(MAX_KLINES).to_string();
        let body = self
            .get(
                "/api/v3/klines",
                &[("symbol", pair.as_str()), ("interval", interval.as_str()), ("limit", fetch.as_str())],
            )
            .await?;

        let now_ms = chrono::Utc::now().timestamp_millis();
        let mut bars = parse_klines(&body, now_ms)?;
        if bars.len() > limit {
            bars.drain(..bars.len() - limit);
        }

        debug!(
            symbol = %pair,
            interval = %interval,
            candles = bars.len(),
            latency_ms = started.elapsed().as_millis() as u64,
            "klines fetched"
        );

        self.candles.lock().await.put(key, bars.clone());
        Ok(bars)
    }

    async fn latest_price(&self, symbol: &str) -> Result<f64, DataError> {
        let pair = self.pair_symbol(symbol);
        if let Some(price) = self.prices.lock().await.get(&pair) {
            return Ok(price);
        }

        let body = self.get("/api/v3/ticker/price", &[("symbol", pair.as_str())]).await?;
        let price = parse_ticker_price(&body)?;
        self.prices.lock().await.put(pair, price);
        Ok(price)
    }

    fn name(&self) -> &str {
        "binance"
    }
}

fn number(v: &Value) -> Option<f64> {
    match v {
        Value::String(s) => s.parse().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

/// Parse `[[open_time, "o", "h", "l", "c", "v", close_time, ...], ...]`,
/// keeping only candles already closed at `now_ms`.
fn parse_klines(body: &Value, now_ms: i64) -> Result<Vec<Bar>, DataError> {
    let rows = body
        .as_array()
        .ok_or_else(|| DataError::ParseError("klines response is not an array".into()))?;

    let mut bars = Vec::with_capacity(rows.len());
    for row in rows {
        let items = match row.as_array() {
            Some(a) if a.len() >= 7 => a,
            _ => continue,
        };
        let (Some(open_time), Some(close_time)) = (items[0].as_i64(), items[6].as_i64()) else {
            continue;
        };
        if close_time > now_ms {
            continue;
        }
        let fields: Option<Vec<f64>> = items[1..6].iter().map(number).collect();
        let Some(f) = fields else {
            return Err(DataError::ParseError(format!("bad kline at {open_time}")));
        };
        bars.push(Bar::new(open_time, f[0], f[1], f[2], f[3], f[4]));
    }
    Ok(bars)
}

fn parse_ticker_price(body: &Value) -> Result<f64, DataError> {
    body.get("price")
        .and_then(number)
        .ok_or_else(|| DataError::ParseError("ticker response has no price".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn client() -> BinanceMarketData {
        BinanceMarketData::new(BinanceConfig::default()).unwrap()
    }

    #[test]
    fn test_pair_symbol() {
        let md = client();
        assert_eq!(md.pair_symbol("eth"), "ETHUSDT");
        assert_eq!(md.pair_symbol("SOL"), "SOLUSDT");
        assert_eq!(md.pair_symbol("bnbusdt"), "BNBUSDT");
        assert_eq!(md.pair_symbol("USDT"), "USDTUSDT");
    }

    #[test]
    fn test_parse_klines_drops_open_candle() {
        let body = json!([
            [1_700_000_000_000_i64, "100.0", "110.0", "95.0", "105.0", "12.5", 1_700_003_599_999_i64, "0", 10, "0", "0", "0"],
            [1_700_003_600_000_i64, "105.0", "107.0", "101.0", "102.0", "8.0", 1_700_007_199_999_i64, "0", 10, "0", "0", "0"]
        ]);

        let bars = parse_klines(&body, 1_700_005_000_000).unwrap();
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].timestamp, 1_700_000_000_000);
        assert_eq!(bars[0].high, 110.0);
        assert_eq!(bars[0].close, 105.0);
        assert_eq!(bars[0].volume, 12.5);

        let all = parse_klines(&body, 1_800_000_000_000).unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn test_parse_klines_rejects_non_array() {
        assert!(parse_klines(&json!({"code": -1121, "msg": "Invalid symbol."}), 0).is_err());
    }

    #[test]
    fn test_parse_ticker_price() {
        let body = json!({"symbol": "ETHUSDT", "price": "3150.42000000"});
        assert_eq!(parse_ticker_price(&body).unwrap(), 3150.42);
        assert!(parse_ticker_price(&json!({})).is_err());
    }
}
