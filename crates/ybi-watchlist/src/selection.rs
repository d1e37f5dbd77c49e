//! Day-level watchlist construction. Every function here only reads data
//! timestamped strictly before its own decision instant.

use chrono::NaiveDate;
use ybi_calendar::MarketCalendar;
use ybi_core::{BacktestError, SelectionMethod, WatchlistItem};
use ybi_data::PolygonDataClient;

use crate::config::WatchlistConfig;
use crate::hygiene::{is_ambiguous_pattern, is_unambiguous_excluded};

/// Builds the day's watchlist per the configured selection method.
pub async fn build_watchlist(
    date: NaiveDate,
    calendar: &MarketCalendar,
    data: &PolygonDataClient,
    config: &WatchlistConfig,
) -> Result<Vec<WatchlistItem>, BacktestError> {
    match config.method {
        SelectionMethod::GapOpen => build_gap_open(date, calendar, data, config).await,
        SelectionMethod::PremarketGap => build_premarket_gap(date, calendar, data, config).await,
    }
}

async fn passes_hygiene(ticker: &str, data: &PolygonDataClient, config: &WatchlistConfig) -> bool {
    if is_unambiguous_excluded(ticker) {
        return false;
    }
    if !is_ambiguous_pattern(ticker) {
        return true;
    }
    if !config.use_reference_data {
        return false;
    }
    match data.reference(ticker).await {
        Ok(Some(reference)) => reference.is_common_stock,
        // Reference data unavailable: fall back to the pattern heuristic.
        _ => false,
    }
}

async fn build_gap_open(
    date: NaiveDate,
    calendar: &MarketCalendar,
    data: &PolygonDataClient,
    config: &WatchlistConfig,
) -> Result<Vec<WatchlistItem>, BacktestError> {
    let prev_date = calendar
        .prev_trading_day(date, |_| true)
        .ok_or_else(|| BacktestError::InvariantViolation("no prior trading day".to_string()))?;

    let today = data.grouped_daily(date).await?;
    let prev = data.grouped_daily(prev_date).await?;

    let mut items = Vec::new();
    for (ticker, today_bar) in today.iter() {
        let Some(prev_bar) = prev.get(ticker) else {
            continue;
        };
        if prev_bar.close < config.min_prev_close || prev_bar.close > config.max_prev_close {
            continue;
        }
        if !passes_hygiene(ticker, data, config).await {
            continue;
        }

        let gap_open_pct = today_bar.open / prev_bar.close - 1.0;
        items.push(WatchlistItem {
            date,
            ticker: ticker.clone(),
            prev_close: prev_bar.close,
            premarket_high: None,
            premarket_low: None,
            premarket_volume: None,
            premarket_dollar_volume: None,
            premarket_pct: None,
            gap_open_pct: Some(gap_open_pct),
            selection_method: SelectionMethod::GapOpen,
            rank: 0,
        });
    }

    items.sort_by(|a, b| {
        b.gap_open_pct
            .unwrap_or(f64::MIN)
            .partial_cmp(&a.gap_open_pct.unwrap_or(f64::MIN))
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.ticker.cmp(&b.ticker))
    });
    items.truncate(config.top_n);
    for (i, item) in items.iter_mut().enumerate() {
        item.rank = i as u32 + 1;
    }
    Ok(items)
}

async fn build_premarket_gap(
    date: NaiveDate,
    calendar: &MarketCalendar,
    data: &PolygonDataClient,
    config: &WatchlistConfig,
) -> Result<Vec<WatchlistItem>, BacktestError> {
    let prev_date = calendar
        .prev_trading_day(date, |_| true)
        .ok_or_else(|| BacktestError::InvariantViolation("no prior trading day".to_string()))?;
    let prev = data.grouped_daily(prev_date).await?;

    // Deterministic candidate pre-selection: price range + hygiene, sorted
    // by previous-day volume descending with ticker-ascending tiebreak,
    // truncated to `max_candidates_to_scan` *before* any premarket fetch.
    let mut candidates: Vec<(String, f64, f64)> = Vec::new();
    for (ticker, bar) in prev.iter() {
        if bar.close < config.min_prev_close || bar.close > config.max_prev_close {
            continue;
        }
        if !passes_hygiene(ticker, data, config).await {
            continue;
        }
        candidates.push((ticker.clone(), bar.close, bar.volume));
    }
    candidates.sort_by(|a, b| {
        b.2.partial_cmp(&a.2)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    candidates.truncate(config.max_candidates_to_scan);

    let premarket_start = calendar
        .eastern_instant(date, ybi_calendar::premarket_start())
        .ok_or_else(|| BacktestError::InvariantViolation("bad premarket instant".to_string()))?;

    let mut items = Vec::new();
    for (ticker, prev_close, _prev_volume) in candidates {
        let bars = data.minute_bars(&ticker, date).await?;
        let premarket_bars: Vec<_> = bars
            .iter()
            .filter(|b| b.ts >= premarket_start && calendar.is_premarket(b.ts))
            .collect();
        let Some(last) = premarket_bars.last() else {
            continue;
        };

        let premarket_volume: f64 = premarket_bars.iter().map(|b| b.volume).sum();
        let premarket_dollar_volume: f64 =
            premarket_bars.iter().map(|b| b.volume * b.close).sum();
        let premarket_high = premarket_bars
            .iter()
            .map(|b| b.high)
            .fold(f64::MIN, f64::max);
        let premarket_low = premarket_bars
            .iter()
            .map(|b| b.low)
            .fold(f64::MAX, f64::min);
        let premarket_pct = last.close / prev_close - 1.0;

        if premarket_pct < config.min_premarket_pct {
            continue;
        }
        if premarket_volume < config.min_premarket_volume {
            continue;
        }
        if premarket_dollar_volume < config.min_premarket_dollar_volume {
            continue;
        }

        items.push(WatchlistItem {
            date,
            ticker,
            prev_close,
            premarket_high: Some(premarket_high),
            premarket_low: Some(premarket_low),
            premarket_volume: Some(premarket_volume),
            premarket_dollar_volume: Some(premarket_dollar_volume),
            premarket_pct: Some(premarket_pct),
            gap_open_pct: None,
            selection_method: SelectionMethod::PremarketGap,
            rank: 0,
        });
    }

    items.sort_by(|a, b| {
        b.premarket_pct
            .unwrap_or(f64::MIN)
            .partial_cmp(&a.premarket_pct.unwrap_or(f64::MIN))
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.ticker.cmp(&b.ticker))
    });
    items.truncate(config.top_n);
    for (i, item) in items.iter_mut().enumerate() {
        item.rank = i as u32 + 1;
    }
    Ok(items)
}
