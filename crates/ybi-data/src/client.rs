//! Rate-limited, caching HTTP client for historical minute/daily bars and
//! reference data. Thin and typed: no selection or strategy logic lives
//! here, only fetch-and-shape.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, TimeZone, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::Instant;
use ybi_core::{BacktestError, Bar, DailyBar, ReferenceRecord};

use crate::cache::HttpCache;

const BASE_URL: &str = "https://api.polygon.io";

/// Sliding-window rate limiter: at most `max_requests` per `window`.
#[derive(Clone)]
struct RateLimiter {
    timestamps: Arc<Mutex<VecDeque<Instant>>>,
    max_requests: usize,
    window: Duration,
}

impl RateLimiter {
    fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            timestamps: Arc::new(Mutex::new(VecDeque::new())),
            max_requests,
            window,
        }
    }

    async fn acquire(&self) {
        loop {
            let mut ts = self.timestamps.lock().await;
            let now = Instant::now();
            while let Some(&front) = ts.front() {
                if now.duration_since(front) >= self.window {
                    ts.pop_front();
                } else {
                    break;
                }
            }
            if ts.len() < self.max_requests {
                ts.push_back(now);
                return;
            }
            let wait_until = ts.front().unwrap().checked_add(self.window).unwrap();
            let sleep_dur = wait_until.duration_since(now) + Duration::from_millis(50);
            drop(ts);
            tracing::debug!(seconds = sleep_dur.as_secs_f64(), "rate limiter waiting for a slot");
            tokio::time::sleep(sleep_dur).await;
        }
    }
}

/// Typed, cached, rate-limited market-data client. The API key is read once
/// at construction and never appears in a `Debug`/log line.
#[derive(Clone)]
pub struct PolygonDataClient {
    api_key: String,
    client: Client,
    rate_limiter: RateLimiter,
    cache: Arc<HttpCache>,
}

impl PolygonDataClient {
    pub fn new(api_key: String) -> Self {
        let rate_limit: usize = std::env::var("POLYGON_RATE_LIMIT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(500);

        let client = Client::builder()
            .timeout(Duration::from_secs(90))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            api_key,
            client,
            rate_limiter: RateLimiter::new(rate_limit, Duration::from_secs(60)),
            cache: Arc::new(HttpCache::from_env()),
        }
    }

    /// Read the API key from `POLYGON_API_KEY`. Never logs the value.
    pub fn from_env() -> Result<Self, BacktestError> {
        let key = std::env::var("POLYGON_API_KEY").map_err(|_| BacktestError::ProviderAuth)?;
        Ok(Self::new(key))
    }

    async fn get_cached(&self, key_parts: &[&str], url: &str) -> Result<String, BacktestError> {
        if let Some(cached) = self.cache.get(key_parts) {
            tracing::debug!(url, "cache hit");
            return Ok(cached);
        }

        for attempt in 0..3u32 {
            self.rate_limiter.acquire().await;
            let response = self
                .client
                .get(url)
                .query(&[("apiKey", self.api_key.as_str())])
                .send()
                .await
                .map_err(|e| BacktestError::DataUnavailable {
                    ticker: String::new(),
                    date: String::new(),
                    detail: e.to_string(),
                })?;

            if response.status().as_u16() == 401 || response.status().as_u16() == 403 {
                return Err(BacktestError::ProviderAuth);
            }
            if response.status().as_u16() == 429 {
                tracing::warn!(attempt, "rate limited by provider, backing off");
                tokio::time::sleep(Duration::from_secs(15)).await;
                continue;
            }
            if !response.status().is_success() {
                return Err(BacktestError::DataUnavailable {
                    ticker: String::new(),
                    date: String::new(),
                    detail: format!("HTTP {}", response.status()),
                });
            }

            let body = response.text().await.map_err(|e| BacktestError::DataUnavailable {
                ticker: String::new(),
                date: String::new(),
                detail: e.to_string(),
            })?;
            self.cache.put(key_parts, &body);
            return Ok(body);
        }

        Err(BacktestError::DataUnavailable {
            ticker: String::new(),
            date: String::new(),
            detail: "rate limited after 3 retries".to_string(),
        })
    }

    pub async fn minute_bars(
        &self,
        ticker: &str,
        date: NaiveDate,
    ) -> Result<Vec<Bar>, BacktestError> {
        let from = date.format("%Y-%m-%d").to_string();
        let url = format!(
            "{BASE_URL}/v2/aggs/ticker/{ticker}/range/1/minute/{from}/{from}"
        );
        let key = ["minute", ticker, &from];
        let body = self.get_cached(&key, &url).await.map_err(|e| attach(e, ticker, &from))?;
        let parsed: AggregateResponse = serde_json::from_str(&body).map_err(|e| {
            BacktestError::DataUnavailable {
                ticker: ticker.to_string(),
                date: from.clone(),
                detail: e.to_string(),
            }
        })?;

        let mut bars: Vec<Bar> = parsed
            .results
            .unwrap_or_default()
            .into_iter()
            .map(|r| Bar {
                ts: Utc.timestamp_millis_opt(r.t).single().unwrap_or_else(Utc::now),
                open: r.o,
                high: r.h,
                low: r.l,
                close: r.c,
                volume: r.v,
            })
            .collect();
        bars.sort_by_key(|b| b.ts);
        Ok(bars)
    }

    pub async fn daily_bars(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyBar>, BacktestError> {
        let from = start.format("%Y-%m-%d").to_string();
        let to = end.format("%Y-%m-%d").to_string();
        let url = format!(
            "{BASE_URL}/v2/aggs/ticker/{ticker}/range/1/day/{from}/{to}"
        );
        let key = ["daily", ticker, &from, &to];
        let body = self.get_cached(&key, &url).await.map_err(|e| attach(e, ticker, &from))?;
        let parsed: AggregateResponse = serde_json::from_str(&body).map_err(|e| {
            BacktestError::DataUnavailable {
                ticker: ticker.to_string(),
                date: from.clone(),
                detail: e.to_string(),
            }
        })?;

        Ok(parsed
            .results
            .unwrap_or_default()
            .into_iter()
            .map(|r| DailyBar {
                date: Utc
                    .timestamp_millis_opt(r.t)
                    .single()
                    .unwrap_or_else(Utc::now)
                    .date_naive(),
                open: r.o,
                high: r.h,
                low: r.l,
                close: r.c,
                volume: r.v,
            })
            .collect())
    }

    pub async fn grouped_daily(
        &self,
        date: NaiveDate,
    ) -> Result<HashMap<String, DailyBar>, BacktestError> {
        let d = date.format("%Y-%m-%d").to_string();
        let url = format!("{BASE_URL}/v2/aggs/grouped/locale/us/market/stocks/{d}");
        let key = ["grouped", &d];
        let body = self.get_cached(&key, &url).await.map_err(|e| attach(e, "", &d))?;
        let parsed: GroupedResponse = serde_json::from_str(&body).map_err(|e| {
            BacktestError::DataUnavailable {
                ticker: String::new(),
                date: d.clone(),
                detail: e.to_string(),
            }
        })?;

        Ok(parsed
            .results
            .unwrap_or_default()
            .into_iter()
            .map(|r| {
                (
                    r.ticker.clone(),
                    DailyBar {
                        date,
                        open: r.o,
                        high: r.h,
                        low: r.l,
                        close: r.c,
                        volume: r.v,
                    },
                )
            })
            .collect())
    }

    pub async fn reference(&self, ticker: &str) -> Result<Option<ReferenceRecord>, BacktestError> {
        let url = format!("{BASE_URL}/v3/reference/tickers/{ticker}");
        let key = ["reference", ticker];
        let body = match self.get_cached(&key, &url).await {
            Ok(b) => b,
            Err(BacktestError::DataUnavailable { .. }) => return Ok(None),
            Err(e) => return Err(e),
        };
        let parsed: ReferenceResponse = match serde_json::from_str(&body) {
            Ok(p) => p,
            Err(_) => return Ok(None),
        };
        Ok(parsed.results.map(|r| ReferenceRecord {
            ticker: ticker.to_string(),
            is_common_stock: r.security_type.eq_ignore_ascii_case("CS"),
            security_type: r.security_type,
            active: r.active,
        }))
    }
}

fn attach(err: BacktestError, ticker: &str, date: &str) -> BacktestError {
    match err {
        BacktestError::DataUnavailable { detail, .. } => BacktestError::DataUnavailable {
            ticker: ticker.to_string(),
            date: date.to_string(),
            detail,
        },
        other => other,
    }
}

#[derive(Debug, Deserialize, Serialize)]
struct AggregateResponse {
    results: Option<Vec<AggBar>>,
}

#[derive(Debug, Deserialize, Serialize)]
struct AggBar {
    t: i64,
    o: f64,
    h: f64,
    l: f64,
    c: f64,
    v: f64,
}

#[derive(Debug, Deserialize, Serialize)]
struct GroupedResponse {
    results: Option<Vec<GroupedBar>>,
}

#[derive(Debug, Deserialize, Serialize)]
struct GroupedBar {
    #[serde(rename = "T")]
    ticker: String,
    o: f64,
    h: f64,
    l: f64,
    c: f64,
    v: f64,
}

#[derive(Debug, Deserialize, Serialize)]
struct ReferenceResponse {
    results: Option<ReferenceResult>,
}

#[derive(Debug, Deserialize, Serialize)]
struct ReferenceResult {
    #[serde(rename = "type")]
    security_type: String,
    active: bool,
}
