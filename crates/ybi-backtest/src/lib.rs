//! Orchestrates one full backtest run: per-day data fetch, watchlist
//! selection, simulation, then inference/audit/reporting over the whole
//! span.

pub mod audit;
pub mod config;
pub mod inference;
pub mod reporting;
pub mod simulator;

use std::collections::HashMap;
use std::path::Path;

use chrono::NaiveDate;
use tracing::{info, warn};
use ybi_calendar::MarketCalendar;
use ybi_core::{BacktestError, DailyBar, DayAuditRecord, DayStatus, RejectedIntent};
use ybi_core::{FillRecord, TradeRecord, WatchlistItem};
use ybi_data::PolygonDataClient;

pub use config::RunConfig;
pub use simulator::Portfolio;

pub struct RunOutput {
    pub watchlist: Vec<WatchlistItem>,
    pub trades: Vec<TradeRecord>,
    pub fills: Vec<FillRecord>,
    pub rejected: Vec<RejectedIntent>,
    pub day_audit: Vec<DayAuditRecord>,
    pub metrics: inference::Metrics,
    pub hac: inference::HacInference,
    pub bootstrap: inference::BootstrapInference,
    pub leakage_audit: audit::LeakageAudit,
    pub reconciliation: audit::ReconciliationReport,
    pub stress_tests: Vec<audit::StressTestResult>,
}

/// Runs the full backtest over `[start, end]` inclusive and writes every
/// artifact under `out_dir`. Per-day `DataUnavailable` is caught and
/// downgraded to a `status=error` audit record, excluded from statistics;
/// every other error aborts the run.
pub async fn run_backtest(
    start: NaiveDate,
    end: NaiveDate,
    config: &RunConfig,
    data: &PolygonDataClient,
    out_dir: &Path,
) -> Result<RunOutput, BacktestError> {
    let calendar = MarketCalendar::new(config.session);
    let mut portfolio = Portfolio::new(config.starting_cash);

    let mut all_watchlist = Vec::new();
    let mut all_trades = Vec::new();
    let mut all_fills = Vec::new();
    let mut all_rejected = Vec::new();
    let mut day_audit = Vec::new();

    let mut cursor = start;
    while cursor <= end {
        if !calendar.is_trading_day(cursor) {
            day_audit.push(DayAuditRecord {
                date: cursor,
                status: DayStatus::HolidayClosed,
                reason: "not a trading day (weekend or market holiday)".to_string(),
            });
            cursor = cursor.succ_opt().ok_or_else(|| {
                BacktestError::InvariantViolation("date overflow while iterating".to_string())
            })?;
            continue;
        }

        let _span = tracing::info_span!("simulate_day", date = %cursor).entered();
        match simulate_one_day(&mut portfolio, &calendar, cursor, config, data).await {
            Ok(mut day) => {
                all_watchlist.append(&mut day.watchlist);
                all_trades.append(&mut day.trades);
                all_fills.append(&mut day.fills);
                all_rejected.append(&mut day.rejected);
                day_audit.push(day.audit);
            }
            Err(BacktestError::DataUnavailable { ticker, date, detail }) => {
                warn!(%ticker, %date, %detail, "data unavailable, day marked error");
                day_audit.push(DayAuditRecord {
                    date: cursor,
                    status: DayStatus::Error,
                    reason: format!("data unavailable for {ticker}: {detail}"),
                });
            }
            Err(other) => return Err(other),
        }

        cursor = cursor.succ_opt().ok_or_else(|| {
            BacktestError::InvariantViolation("date overflow while iterating".to_string())
        })?;
    }

    info!(n_days = day_audit.len(), n_trades = all_trades.len(), "simulation complete");

    let eligible_days: Vec<&DayAuditRecord> = day_audit.iter().filter(|d| d.status.is_eligible()).collect();
    let dates: Vec<NaiveDate> = eligible_days.iter().map(|d| d.date).collect();
    // Every trade is entered and exited within the same trading day (force-flat
    // guarantees this), so attributing by exit day alone cannot double-count.
    let daily_pnl: Vec<f64> = eligible_days
        .iter()
        .map(|day| {
            all_trades
                .iter()
                .filter(|t| calendar.eastern_date(t.exit_ts) == day.date)
                .map(|t| t.pnl_total)
                .sum::<f64>()
        })
        .collect();
    let trade_pnls: Vec<f64> = all_trades.iter().map(|t| t.pnl_total).collect();

    let metrics = inference::compute_metrics(&dates, &daily_pnl, &trade_pnls);
    let hac = inference::hac_inference(&daily_pnl);
    let bootstrap = inference::block_bootstrap(
        &daily_pnl,
        config.inference.bootstrap_block_len,
        config.inference.n_bootstrap,
        config.inference.random_seed,
    );

    let leakage = audit::leakage_audit(&all_trades);
    let reconciliation = audit::reconcile_trades_and_fills(&all_trades, &all_fills);
    if !reconciliation.passed() {
        return Err(BacktestError::InvariantViolation(format!(
            "ledger reconciliation failed: {} mismatches, total pnl {} vs fills net {}",
            reconciliation.mismatches.len(),
            reconciliation.total_pnl_from_trades,
            reconciliation.total_net_from_fills
        )));
    }

    let stress_tests = vec![
        audit::time_shift_stress_test(&daily_pnl, 1),
        audit::date_shuffle_stress_test(&daily_pnl, config.inference.random_seed),
    ];

    let output = RunOutput {
        watchlist: all_watchlist,
        trades: all_trades,
        fills: all_fills,
        rejected: all_rejected,
        day_audit,
        metrics,
        hac,
        bootstrap,
        leakage_audit: leakage,
        reconciliation,
        stress_tests,
    };

    reporting::write_all(out_dir, &output, config, &calendar)?;
    Ok(output)
}

struct OneDay {
    watchlist: Vec<WatchlistItem>,
    trades: Vec<TradeRecord>,
    fills: Vec<FillRecord>,
    rejected: Vec<RejectedIntent>,
    audit: DayAuditRecord,
}

async fn simulate_one_day(
    portfolio: &mut Portfolio,
    calendar: &MarketCalendar,
    date: NaiveDate,
    config: &RunConfig,
    data: &PolygonDataClient,
) -> Result<OneDay, BacktestError> {
    let watchlist = ybi_watchlist::build_watchlist(date, calendar, data, &config.watchlist).await?;

    if watchlist.is_empty() {
        let result = simulator::run_day(
            portfolio,
            calendar,
            date,
            &watchlist,
            HashMap::new(),
            &HashMap::new(),
            config,
        )?;
        return Ok(OneDay {
            watchlist,
            trades: result.trades,
            fills: result.fills,
            rejected: result.rejected,
            audit: result.audit,
        });
    }

    let prev_date = calendar
        .prev_trading_day(date, |_| true)
        .ok_or_else(|| BacktestError::InvariantViolation("no prior trading day".to_string()))?;
    let prev_daily: HashMap<String, DailyBar> = data.grouped_daily(prev_date).await?;

    let mut bars_by_ticker = HashMap::new();
    for item in &watchlist {
        let bars = data.minute_bars(&item.ticker, date).await?;
        bars_by_ticker.insert(item.ticker.clone(), bars);
    }

    let result = simulator::run_day(portfolio, calendar, date, &watchlist, bars_by_ticker, &prev_daily, config)?;

    Ok(OneDay {
        watchlist,
        trades: result.trades,
        fills: result.fills,
        rejected: result.rejected,
        audit: result.audit,
    })
}
