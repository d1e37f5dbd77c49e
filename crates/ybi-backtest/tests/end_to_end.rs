//! Drives two synthetic trading days through the simulator end to end and
//! checks the ledger invariants: entry/exit ordering, stop validity, and
//! trade/fill reconciliation. Whether the synthetic price path actually
//! trips one of the five entry setups depends on exact indicator
//! thresholds this test does not attempt to reverse-engineer; the checks
//! below hold either way; they are per-trade and vacuously satisfied when
//! no trade fires.

use std::collections::HashMap;

use chrono::{NaiveDate, NaiveTime};
use ybi_backtest::config::RunConfig;
use ybi_backtest::{audit, inference, simulator, Portfolio};
use ybi_calendar::MarketCalendar;
use ybi_core::{Bar, DailyBar, DayStatus, SelectionMethod, WatchlistItem};

const TICKER: &str = "SYNT";

/// Builds one day's worth of 1-minute bars from 08:00 to 10:00 Eastern: a
/// premarket run-up to a local high, a pullback, a consolidation, and a
/// breakout above the premarket high during the entry window.
fn synthetic_bars(calendar: &MarketCalendar, date: NaiveDate) -> Vec<Bar> {
    let mut bars = Vec::new();
    let start = NaiveTime::from_hms_opt(8, 0, 0).unwrap();

    for minute in 0..120i64 {
        let t = start + chrono::Duration::minutes(minute);
        let ts = calendar.eastern_instant(date, t).expect("valid eastern instant");

        let close = if minute < 60 {
            9.00 + 0.015 * minute as f64 // premarket run-up to ~9.90
        } else if minute < 90 {
            9.90 - 0.006 * (minute - 60) as f64 // pullback to ~9.72
        } else if minute < 110 {
            9.72 + 0.004 * (minute - 90) as f64 // tight consolidation to ~9.80
        } else {
            9.80 + 0.03 * (minute - 109) as f64 // breakout past the premarket high
        };
        let open = close - 0.01;
        let high = close + 0.02;
        let low = close - 0.02;

        bars.push(Bar {
            ts,
            open,
            high,
            low,
            close,
            volume: 5_000.0,
        });
    }

    bars
}

fn watchlist_item(date: NaiveDate) -> WatchlistItem {
    WatchlistItem {
        date,
        ticker: TICKER.to_string(),
        prev_close: 9.00,
        premarket_high: Some(9.90),
        premarket_low: Some(8.95),
        premarket_volume: Some(100_000.0),
        premarket_dollar_volume: Some(900_000.0),
        premarket_pct: Some(10.0),
        gap_open_pct: Some(8.0),
        selection_method: SelectionMethod::PremarketGap,
        rank: 1,
    }
}

fn prev_daily(date: NaiveDate) -> DailyBar {
    DailyBar {
        date,
        open: 8.80,
        high: 9.10,
        low: 8.70,
        close: 9.00,
        volume: 2_000_000.0,
    }
}

#[test]
fn multi_day_synthetic_backtest_preserves_ledger_invariants() {
    let calendar = MarketCalendar::new(Default::default());
    let config = RunConfig::default();
    let mut portfolio = Portfolio::new(config.starting_cash);

    let day1 = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();
    let day2 = NaiveDate::from_ymd_opt(2024, 6, 4).unwrap();
    assert!(calendar.is_trading_day(day1));
    assert!(calendar.is_trading_day(day2));

    let mut all_trades = Vec::new();
    let mut all_fills = Vec::new();

    for date in [day1, day2] {
        let watchlist = vec![watchlist_item(date)];
        let mut bars_by_ticker = HashMap::new();
        bars_by_ticker.insert(TICKER.to_string(), synthetic_bars(&calendar, date));
        let mut prev = HashMap::new();
        prev.insert(TICKER.to_string(), prev_daily(date.pred_opt().unwrap()));

        let result = simulator::run_day(&mut portfolio, &calendar, date, &watchlist, bars_by_ticker, &prev, &config)
            .expect("run_day should not error on well-formed synthetic input");

        assert_ne!(result.audit.status, DayStatus::Error);

        for trade in &result.trades {
            assert!(trade.signal_ts < trade.entry_ts, "I1: signal must precede entry");
            assert!(trade.signal_ts < trade.exit_ts, "I2: signal must precede exit");
            assert!(trade.entry_ts <= trade.exit_ts, "exit cannot precede entry");
            // Gap-through-at-entry is the one documented exception to this
            // invariant (DESIGN.md); this synthetic path is continuous and
            // never exercises it. See simulator's gap_through_entry_tests.
            assert!(trade.stop_px_initial < trade.entry_px, "I6: stop must sit below entry for a long");
            assert!(trade.bars_held >= 0);
        }

        all_trades.extend(result.trades);
        all_fills.extend(result.fills);
    }

    let leakage = audit::leakage_audit(&all_trades);
    assert!(leakage.passed(), "leakage audit violations: {:?}", leakage.violations);

    let reconciliation = audit::reconcile_trades_and_fills(&all_trades, &all_fills);
    assert!(
        reconciliation.passed(),
        "reconciliation mismatches: {:?}",
        reconciliation.mismatches
    );

    let dates = vec![day1, day2];
    let daily_pnl: Vec<f64> = dates
        .iter()
        .map(|d| {
            all_trades
                .iter()
                .filter(|t| calendar.eastern_date(t.exit_ts) == *d)
                .map(|t| t.pnl_total)
                .sum()
        })
        .collect();
    let trade_pnls: Vec<f64> = all_trades.iter().map(|t| t.pnl_total).collect();
    let metrics = inference::compute_metrics(&dates, &daily_pnl, &trade_pnls);
    assert_eq!(metrics.n_trades, all_trades.len());
    assert_eq!(metrics.n_days, 2);
}
