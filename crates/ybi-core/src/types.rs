use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A single 1-minute OHLCV bar. Bars are strictly increasing in `ts` within
/// a (ticker, day); nothing downstream may consult a bar with `ts` greater
/// than the one it is currently processing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Bar {
    pub ts: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// A prior session's daily bar, used for previous close and PDH/PDL.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DailyBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Reference/security-master data used to exclude non-common-stock tickers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceRecord {
    pub ticker: String,
    pub security_type: String,
    pub is_common_stock: bool,
    pub active: bool,
}

/// How a ticker was selected onto the day's watchlist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectionMethod {
    GapOpen,
    PremarketGap,
}

impl SelectionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectionMethod::GapOpen => "gap_open",
            SelectionMethod::PremarketGap => "premarket_gap",
        }
    }
}

/// One ticker's entry on a day's watchlist. Immutable once published.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchlistItem {
    pub date: NaiveDate,
    pub ticker: String,
    pub prev_close: f64,
    pub premarket_high: Option<f64>,
    pub premarket_low: Option<f64>,
    pub premarket_volume: Option<f64>,
    pub premarket_dollar_volume: Option<f64>,
    pub premarket_pct: Option<f64>,
    pub gap_open_pct: Option<f64>,
    pub selection_method: SelectionMethod,
    pub rank: u32,
}

/// TTM Squeeze proxy state, mapped from Bollinger-vs-Keltner + momentum sign.
/// This is an approximation of the source methodology's proprietary
/// indicator, not a faithful reproduction of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TtmState {
    StrongBull,
    WeakBull,
    WeakBear,
    StrongBear,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MomentumSign {
    Bull,
    Bear,
    None,
}

/// A price level in one of the ladders (premarket, prior-day, pivot, round).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Level {
    pub price: f64,
    pub kind: LevelKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LevelKind {
    PivotHigh,
    PivotLow,
    Round,
}

/// The causal feature state as of one bar's close. Every field depends only
/// on bars with `ts` less than or equal to this snapshot's `ts`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureSnapshot {
    pub ts: DateTime<Utc>,
    pub ema8: Option<f64>,
    pub ema21: Option<f64>,
    pub ema34: Option<f64>,
    pub ema55: Option<f64>,
    pub ema200_or_sma200: Option<f64>,
    pub vwap_rth: Option<f64>,
    pub ttm_state: TtmState,
    pub momentum_sign: MomentumSign,
    pub extension_from_ema8: Option<f64>,
    pub pmh: Option<f64>,
    pub pml: Option<f64>,
    pub pdh: Option<f64>,
    pub pdl: Option<f64>,
    pub open_px: Option<f64>,
    pub hod_so_far: Option<f64>,
    pub lod_so_far: Option<f64>,
    pub pivots: Vec<Level>,
    pub round_levels: Vec<Level>,
}

/// An open long-only position for one ticker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub ticker: String,
    pub trade_id: u64,
    pub qty: i64,
    pub avg_entry: f64,
    pub stop: f64,
    /// The stop as set at entry, before any scale-out raises `stop`. Kept
    /// separate so the closed trade's `stop_px_initial` always reflects the
    /// entry-time risk, per (I6), even after a scale-out moves `stop` up.
    pub stop_initial: f64,
    pub entry_ts: DateTime<Utc>,
    pub signal_ts: DateTime<Utc>,
    pub setup_tag: String,
    /// Original (pre-scale-out) quantity, needed for trade-record bookkeeping.
    pub original_qty: i64,
    pub scale_pnl_realized: f64,
    pub scaled_out: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntentKind {
    Enter,
    ScaleOut,
    Exit,
}

/// A strategy decision made at `signal_ts`, to be filled at the next bar's
/// open. Never carries a reference to any bar after `signal_ts`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingIntent {
    pub ticker: String,
    pub kind: IntentKind,
    pub reason: String,
    pub signal_ts: DateTime<Utc>,
    pub stop_base: Option<f64>,
    pub scale_fraction: Option<f64>,
    pub setup_tag: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }
}

impl IntentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntentKind::Enter => "enter",
            IntentKind::ScaleOut => "scale_out",
            IntentKind::Exit => "exit",
        }
    }
}

/// One completed round trip. `pnl_total = scale_pnl + final_exit_pnl - fees`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRecord {
    pub ticker: String,
    pub trade_id: u64,
    pub setup_tag: String,
    pub entry_ts: DateTime<Utc>,
    pub exit_ts: DateTime<Utc>,
    pub signal_ts: DateTime<Utc>,
    pub entry_px: f64,
    pub avg_exit_px: f64,
    pub original_qty: i64,
    pub scale_pnl: f64,
    pub final_exit_pnl: f64,
    pub fees: f64,
    pub pnl_total: f64,
    pub exit_reason: String,
    pub stop_px_initial: f64,
    pub bars_held: i64,
}

/// One child execution (entry, scale-out, or final exit).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FillRecord {
    pub ts: DateTime<Utc>,
    pub ticker: String,
    pub side: Side,
    pub qty: i64,
    pub price: f64,
    pub fee: f64,
    pub intent_kind: IntentKind,
    pub reason: String,
    pub linked_trade_id: Option<u64>,
}

/// A setup that fired, or an entry/exit that was attempted, but which a risk
/// or validity gate rejected. Recorded rather than silently discarded so the
/// reason is auditable after the fact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectedIntent {
    pub ts: DateTime<Utc>,
    pub ticker: String,
    pub kind: IntentKind,
    pub reason_code: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DayStatus {
    Ok,
    NoTrades,
    NoWatchlist,
    Error,
    HolidayClosed,
}

impl DayStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DayStatus::Ok => "ok",
            DayStatus::NoTrades => "no_trades",
            DayStatus::NoWatchlist => "no_watchlist",
            DayStatus::Error => "error",
            DayStatus::HolidayClosed => "holiday_closed",
        }
    }

    /// Eligible days are included in the inference denominator; `error` days
    /// are excluded as missing, never coerced to a zero-P&L day.
    pub fn is_eligible(&self) -> bool {
        !matches!(self, DayStatus::Error | DayStatus::HolidayClosed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayAuditRecord {
    pub date: NaiveDate,
    pub status: DayStatus,
    pub reason: String,
}
