//! Binance USDⓈ-M futures public REST provider.
//!
//! Unauthenticated market-data endpoints only: klines, depth, 24h ticker,
//! open interest, exchange info and ping. Every request passes through the
//! circuit breaker; retries are the caller's job (see `retry`).

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::circuit_breaker::CircuitBreaker;
use super::provider::{AcquisitionError, Interval, MarketDataProvider};
use crate::clock::Clock;
use crate::domain::{Candle, Level, OrderBookSnapshot, Ticker24h};

pub const DEFAULT_BASE_URL: &str = "https://fapi.binance.com";

/// Binance error code for an unknown symbol.
const INVALID_SYMBOL_CODE: i64 = -1121;

#[derive(Debug, Deserialize)]
struct ApiError {
    code: i64,
    msg: String,
}

#[derive(Debug, Deserialize)]
struct DepthResponse {
    bids: Vec<[String; 2]>,
    asks: Vec<[String; 2]>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TickerResponse {
    symbol: String,
    last_price: String,
    price_change_percent: String,
    volume: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OpenInterestResponse {
    open_interest: String,
}

#[derive(Debug, Deserialize)]
struct ExchangeInfo {
    symbols: Vec<SymbolInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SymbolInfo {
    symbol: String,
    status: String,
    quote_asset: String,
}

pub struct BinanceProvider {
    client: reqwest::blocking::Client,
    base_url: String,
    circuit_breaker: Arc<CircuitBreaker>,
    clock: Arc<dyn Clock>,
}

impl BinanceProvider {
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        circuit_breaker: Arc<CircuitBreaker>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, AcquisitionError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("sigscan/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AcquisitionError::Unavailable(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            circuit_breaker,
            clock,
        })
    }

    fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        symbol: Option<&str>,
    ) -> Result<T, AcquisitionError> {
        if !self.circuit_breaker.is_allowed() {
            return Err(AcquisitionError::CircuitBreakerTripped);
        }

        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "GET");
        let resp = self
            .client
            .get(&url)
            .query(query)
            .send()
            .map_err(|e| AcquisitionError::Unavailable(e.to_string()))?;

        let status = resp.status().as_u16();
        let retry_after = resp
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        let body = resp
            .text()
            .map_err(|e| AcquisitionError::Unavailable(e.to_string()))?;

        if (200..300).contains(&status) {
            self.circuit_breaker.record_success();
            return serde_json::from_str(&body)
                .map_err(|e| AcquisitionError::ResponseFormat(format!("{path}: {e}")));
        }

        let err = classify_status(status, retry_after, &body, symbol);
        match &err {
            AcquisitionError::CircuitBreakerTripped => {
                warn!(status, "exchange ban response, tripping circuit breaker");
                self.circuit_breaker.trip();
            }
            AcquisitionError::RateLimited { .. } | AcquisitionError::Unavailable(_) => {
                self.circuit_breaker.record_failure();
            }
            _ => {}
        }
        Err(err)
    }
}

/// Map a non-2xx response onto the acquisition taxonomy.
pub fn classify_status(
    status: u16,
    retry_after: Option<u64>,
    body: &str,
    symbol: Option<&str>,
) -> AcquisitionError {
    match status {
        403 | 418 => AcquisitionError::CircuitBreakerTripped,
        429 => AcquisitionError::RateLimited {
            retry_after_secs: retry_after.unwrap_or(60),
        },
        400..=499 => match serde_json::from_str::<ApiError>(body) {
            Ok(api) if api.code == INVALID_SYMBOL_CODE => AcquisitionError::InvalidSymbol {
                symbol: symbol.unwrap_or_default().to_string(),
            },
            Ok(api) => AcquisitionError::ResponseFormat(format!("HTTP {status} ({}): {}", api.code, api.msg)),
            Err(_) => AcquisitionError::ResponseFormat(format!("HTTP {status}")),
        },
        _ => AcquisitionError::Unavailable(format!("HTTP {status}")),
    }
}

fn parse_f64(raw: &str, field: &str) -> Result<f64, AcquisitionError> {
    raw.parse::<f64>()
        .map_err(|_| AcquisitionError::ResponseFormat(format!("{field}: not a number: '{raw}'")))
}

fn value_f64(v: &serde_json::Value, field: &str) -> Result<f64, AcquisitionError> {
    match v {
        serde_json::Value::String(s) => parse_f64(s, field),
        serde_json::Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| AcquisitionError::ResponseFormat(format!("{field}: out of range"))),
        _ => Err(AcquisitionError::ResponseFormat(format!("{field}: unexpected type"))),
    }
}

/// Kline rows are positional arrays:
/// `[open_time, open, high, low, close, volume, close_time, ...]`.
pub fn parse_klines(body: &str) -> Result<Vec<Candle>, AcquisitionError> {
    let rows: Vec<Vec<serde_json::Value>> =
        serde_json::from_str(body).map_err(|e| AcquisitionError::ResponseFormat(format!("klines: {e}")))?;
    rows.iter().map(|row| kline_row(row)).collect()
}

fn kline_row(row: &[serde_json::Value]) -> Result<Candle, AcquisitionError> {
    if row.len() < 6 {
        return Err(AcquisitionError::ResponseFormat(format!(
            "kline row has {} fields, expected at least 6",
            row.len()
        )));
    }
    let open_time = row[0]
        .as_i64()
        .ok_or_else(|| AcquisitionError::ResponseFormat("kline open time".into()))?;
    let timestamp = DateTime::<Utc>::from_timestamp_millis(open_time)
        .ok_or_else(|| AcquisitionError::ResponseFormat(format!("invalid timestamp: {open_time}")))?;
    Ok(Candle {
        timestamp,
        open: value_f64(&row[1], "open")?,
        high: value_f64(&row[2], "high")?,
        low: value_f64(&row[3], "low")?,
        close: value_f64(&row[4], "close")?,
        volume: value_f64(&row[5], "volume")?,
    })
}

fn levels(rows: &[[String; 2]], side: &str) -> Result<Vec<Level>, AcquisitionError> {
    rows.iter()
        .map(|[price, qty]| Ok(Level::new(parse_f64(price, side)?, parse_f64(qty, side)?)))
        .collect()
}

pub fn parse_depth(
    symbol: &str,
    body: &str,
    captured_at: DateTime<Utc>,
) -> Result<OrderBookSnapshot, AcquisitionError> {
    let depth: DepthResponse =
        serde_json::from_str(body).map_err(|e| AcquisitionError::ResponseFormat(format!("depth: {e}")))?;
    Ok(OrderBookSnapshot {
        symbol: symbol.to_string(),
        bids: levels(&depth.bids, "bid")?,
        asks: levels(&depth.asks, "ask")?,
        captured_at,
    })
}

/// Symbols in TRADING status quoted in `quote`.
pub fn parse_tradable_symbols(body: &str, quote: &str) -> Result<Vec<String>, AcquisitionError> {
    let info: ExchangeInfo =
        serde_json::from_str(body).map_err(|e| AcquisitionError::ResponseFormat(format!("exchangeInfo: {e}")))?;
    Ok(filter_tradable(info, quote))
}

fn filter_tradable(info: ExchangeInfo, quote: &str) -> Vec<String> {
    info.symbols
        .into_iter()
        .filter(|s| s.status == "TRADING" && s.quote_asset == quote && s.symbol.ends_with(quote))
        .map(|s| s.symbol)
        .collect()
}

/// Nearest depth the endpoint accepts at or above `depth`.
fn depth_limit(depth: usize) -> usize {
    const ALLOWED: [usize; 7] = [5, 10, 20, 50, 100, 500, 1000];
    ALLOWED.into_iter().find(|&d| d >= depth).unwrap_or(1000)
}

impl MarketDataProvider for BinanceProvider {
    fn name(&self) -> &str {
        "binance_futures"
    }

    fn candles(
        &self,
        symbol: &str,
        interval: Interval,
        limit: usize,
    ) -> Result<Vec<Candle>, AcquisitionError> {
        let rows: Vec<Vec<serde_json::Value>> = self.get(
            "/fapi/v1/klines",
            &[
                ("symbol", symbol.to_string()),
                ("interval", interval.as_str().to_string()),
                ("limit", limit.min(1500).to_string()),
            ],
            Some(symbol),
        )?;
        rows.iter().map(|row| kline_row(row)).collect()
    }

    fn order_book(&self, symbol: &str, depth: usize) -> Result<OrderBookSnapshot, AcquisitionError> {
        let resp: DepthResponse = self.get(
            "/fapi/v1/depth",
            &[
                ("symbol", symbol.to_string()),
                ("limit", depth_limit(depth).to_string()),
            ],
            Some(symbol),
        )?;
        let mut bids = levels(&resp.bids, "bid")?;
        let mut asks = levels(&resp.asks, "ask")?;
        bids.truncate(depth);
        asks.truncate(depth);
        Ok(OrderBookSnapshot {
            symbol: symbol.to_string(),
            bids,
            asks,
            captured_at: self.clock.now(),
        })
    }

    fn ticker(&self, symbol: &str) -> Result<Ticker24h, AcquisitionError> {
        let query = [("symbol", symbol.to_string())];
        let t: TickerResponse = self.get("/fapi/v1/ticker/24hr", &query, Some(symbol))?;
        let oi: OpenInterestResponse = self.get("/fapi/v1/openInterest", &query, Some(symbol))?;
        Ok(Ticker24h {
            symbol: t.symbol,
            last_price: parse_f64(&t.last_price, "lastPrice")?,
            price_change_percent: parse_f64(&t.price_change_percent, "priceChangePercent")?,
            volume: parse_f64(&t.volume, "volume")?,
            open_interest: parse_f64(&oi.open_interest, "openInterest")?,
        })
    }

    fn tradable_symbols(&self, quote: &str) -> Result<Vec<String>, AcquisitionError> {
        let info: ExchangeInfo = self.get("/fapi/v1/exchangeInfo", &[], None)?;
        Ok(filter_tradable(info, quote))
    }

    fn ping(&self) -> Result<(), AcquisitionError> {
        let _: serde_json::Value = self.get("/fapi/v1/ping", &[], None)?;
        Ok(())
    }
}
