//! Writes every run artifact to `out_dir`: one CSV per ledger (watchlist,
//! fills, trades, day audit, daily metrics, rejected intents) plus two JSON
//! documents (summary, run metadata). CSV rows are flattened by hand rather
//! than derived directly on the domain types, since enums need a stable
//! string form independent of `serde`'s default variant-name encoding.

use std::fs::File;
use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use ybi_calendar::MarketCalendar;
use ybi_core::{
    BacktestError, DayAuditRecord, FillRecord, RejectedIntent, TradeRecord, WatchlistItem,
};

use crate::config::RunConfig;
use crate::RunOutput;

fn io_err(detail: impl std::fmt::Display) -> BacktestError {
    BacktestError::InvariantViolation(format!("failed to write report artifact: {detail}"))
}

fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), BacktestError> {
    let mut writer = csv::Writer::from_path(path).map_err(io_err)?;
    for row in rows {
        writer.serialize(row).map_err(io_err)?;
    }
    writer.flush().map_err(io_err)?;
    Ok(())
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), BacktestError> {
    let file = File::create(path).map_err(io_err)?;
    serde_json::to_writer_pretty(file, value).map_err(io_err)?;
    Ok(())
}

#[derive(Debug, Clone, Serialize)]
struct WatchlistRow {
    date: NaiveDate,
    ticker: String,
    prev_close: f64,
    premarket_high: Option<f64>,
    premarket_low: Option<f64>,
    premarket_volume: Option<f64>,
    premarket_dollar_volume: Option<f64>,
    premarket_pct: Option<f64>,
    gap_open_pct: Option<f64>,
    selection_method: &'static str,
    rank: u32,
}

impl From<&WatchlistItem> for WatchlistRow {
    fn from(w: &WatchlistItem) -> Self {
        Self {
            date: w.date,
            ticker: w.ticker.clone(),
            prev_close: w.prev_close,
            premarket_high: w.premarket_high,
            premarket_low: w.premarket_low,
            premarket_volume: w.premarket_volume,
            premarket_dollar_volume: w.premarket_dollar_volume,
            premarket_pct: w.premarket_pct,
            gap_open_pct: w.gap_open_pct,
            selection_method: w.selection_method.as_str(),
            rank: w.rank,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct FillRow {
    ts: DateTime<Utc>,
    ticker: String,
    side: &'static str,
    qty: i64,
    price: f64,
    fee: f64,
    intent_kind: &'static str,
    reason: String,
    linked_trade_id: Option<u64>,
}

impl From<&FillRecord> for FillRow {
    fn from(f: &FillRecord) -> Self {
        Self {
            ts: f.ts,
            ticker: f.ticker.clone(),
            side: f.side.as_str(),
            qty: f.qty,
            price: f.price,
            fee: f.fee,
            intent_kind: f.intent_kind.as_str(),
            reason: f.reason.clone(),
            linked_trade_id: f.linked_trade_id,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct TradeRow<'a> {
    ticker: &'a str,
    trade_id: u64,
    setup_tag: &'a str,
    entry_ts: DateTime<Utc>,
    exit_ts: DateTime<Utc>,
    signal_ts: DateTime<Utc>,
    entry_px: f64,
    avg_exit_px: f64,
    original_qty: i64,
    scale_pnl: f64,
    final_exit_pnl: f64,
    fees: f64,
    pnl_total: f64,
    exit_reason: &'a str,
    stop_px_initial: f64,
    bars_held: i64,
}

impl<'a> From<&'a TradeRecord> for TradeRow<'a> {
    fn from(t: &'a TradeRecord) -> Self {
        Self {
            ticker: &t.ticker,
            trade_id: t.trade_id,
            setup_tag: &t.setup_tag,
            entry_ts: t.entry_ts,
            exit_ts: t.exit_ts,
            signal_ts: t.signal_ts,
            entry_px: t.entry_px,
            avg_exit_px: t.avg_exit_px,
            original_qty: t.original_qty,
            scale_pnl: t.scale_pnl,
            final_exit_pnl: t.final_exit_pnl,
            fees: t.fees,
            pnl_total: t.pnl_total,
            exit_reason: &t.exit_reason,
            stop_px_initial: t.stop_px_initial,
            bars_held: t.bars_held,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct DayAuditRow {
    date: NaiveDate,
    status: &'static str,
    reason: String,
}

impl From<&DayAuditRecord> for DayAuditRow {
    fn from(d: &DayAuditRecord) -> Self {
        Self {
            date: d.date,
            status: d.status.as_str(),
            reason: d.reason.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct RejectedIntentRow {
    ts: DateTime<Utc>,
    ticker: String,
    kind: &'static str,
    reason_code: String,
}

impl From<&RejectedIntent> for RejectedIntentRow {
    fn from(r: &RejectedIntent) -> Self {
        Self {
            ts: r.ts,
            ticker: r.ticker.clone(),
            kind: r.kind.as_str(),
            reason_code: r.reason_code.clone(),
        }
    }
}

/// One eligible trading day's aggregated P&L, trade count, and fees,
/// recomputed here from the trade ledger rather than carried through from
/// the simulator, so the CSV stays a direct function of `RunOutput`.
#[derive(Debug, Clone, Serialize)]
pub struct DailyMetricRow {
    pub date: NaiveDate,
    pub pnl: f64,
    pub n_trades: usize,
    pub fees: f64,
}

pub fn daily_metrics(
    eligible_dates: &[NaiveDate],
    trades: &[TradeRecord],
    calendar: &MarketCalendar,
) -> Vec<DailyMetricRow> {
    eligible_dates
        .iter()
        .map(|date| {
            let day_trades: Vec<&TradeRecord> = trades
                .iter()
                .filter(|t| calendar.eastern_date(t.exit_ts) == *date)
                .collect();
            DailyMetricRow {
                date: *date,
                pnl: day_trades.iter().map(|t| t.pnl_total).sum(),
                n_trades: day_trades.len(),
                fees: day_trades.iter().map(|t| t.fees).sum(),
            }
        })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
struct Summary<'a> {
    metrics: &'a crate::inference::Metrics,
    hac: &'a crate::inference::HacInference,
    bootstrap: &'a crate::inference::BootstrapInference,
    leakage_audit: &'a crate::audit::LeakageAudit,
    reconciliation: &'a crate::audit::ReconciliationReport,
    stress_tests: &'a [crate::audit::StressTestResult],
}

#[derive(Debug, Clone, Serialize)]
struct RunMetadata<'a> {
    code_version: &'static str,
    config: &'a RunConfig,
}

/// Writes every artifact named in the external-interfaces contract. Callers
/// must have already created `out_dir`.
pub fn write_all(
    out_dir: &Path,
    output: &RunOutput,
    config: &RunConfig,
    calendar: &MarketCalendar,
) -> Result<(), BacktestError> {
    std::fs::create_dir_all(out_dir).map_err(io_err)?;

    let watchlist_rows: Vec<WatchlistRow> = output.watchlist.iter().map(WatchlistRow::from).collect();
    write_csv(&out_dir.join("watchlist.csv"), &watchlist_rows)?;

    let fill_rows: Vec<FillRow> = output.fills.iter().map(FillRow::from).collect();
    write_csv(&out_dir.join("fills.csv"), &fill_rows)?;

    let trade_rows: Vec<TradeRow> = output.trades.iter().map(TradeRow::from).collect();
    write_csv(&out_dir.join("trades.csv"), &trade_rows)?;

    let day_audit_rows: Vec<DayAuditRow> = output.day_audit.iter().map(DayAuditRow::from).collect();
    write_csv(&out_dir.join("day_audit.csv"), &day_audit_rows)?;

    let rejected_rows: Vec<RejectedIntentRow> =
        output.rejected.iter().map(RejectedIntentRow::from).collect();
    write_csv(&out_dir.join("rejected_intents.csv"), &rejected_rows)?;

    let eligible_dates: Vec<NaiveDate> = output
        .day_audit
        .iter()
        .filter(|d| d.status.is_eligible())
        .map(|d| d.date)
        .collect();
    let daily_rows = daily_metrics(&eligible_dates, &output.trades, calendar);
    write_csv(&out_dir.join("daily_metrics.csv"), &daily_rows)?;

    let summary = Summary {
        metrics: &output.metrics,
        hac: &output.hac,
        bootstrap: &output.bootstrap,
        leakage_audit: &output.leakage_audit,
        reconciliation: &output.reconciliation,
        stress_tests: &output.stress_tests,
    };
    write_json(&out_dir.join("summary.json"), &summary)?;

    let metadata = RunMetadata {
        code_version: env!("CARGO_PKG_VERSION"),
        config,
    };
    write_json(&out_dir.join("run_metadata.json"), &metadata)?;

    Ok(())
}
