//! The per-day event loop: one linear, time-ordered pass over every
//! watchlist ticker's bars, in the fixed phase order mark-to-market ->
//! execute pending intents -> feature/signal update -> intrabar risk check.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use ybi_calendar::MarketCalendar;
use ybi_core::{
    Bar, BacktestError, DailyBar, DayAuditRecord, DayStatus, FeatureSnapshot, FillRecord,
    IntentKind, PendingIntent, Position, RejectedIntent, Side, TradeRecord, WatchlistItem,
};
use ybi_features::FeatureEngine;
use ybi_strategy::{exits, TickerStrategy};

use crate::config::RunConfig;

pub struct DaySimResult {
    pub audit: DayAuditRecord,
    pub trades: Vec<TradeRecord>,
    pub fills: Vec<FillRecord>,
    pub rejected: Vec<RejectedIntent>,
}

/// Cross-day portfolio state. Cash and the trade-id sequence are the only
/// state carried between days; nothing about yesterday's positions or
/// features survives into today.
pub struct Portfolio {
    pub cash: f64,
    trade_id_seq: u64,
}

impl Portfolio {
    pub fn new(starting_cash: f64) -> Self {
        Self {
            cash: starting_cash,
            trade_id_seq: 0,
        }
    }

    fn next_trade_id(&mut self) -> u64 {
        self.trade_id_seq += 1;
        self.trade_id_seq
    }
}

struct TickerDay {
    bars: Vec<Bar>,
    feature_engine: FeatureEngine,
    strategy: TickerStrategy,
    position: Option<Position>,
    pending: Option<PendingIntent>,
    entry_bar_index: Option<usize>,
    trades_today: u32,
}

fn fill_entry_price(bar_open: f64, config: &RunConfig) -> f64 {
    bar_open * (1.0 + config.fills.slippage_bps / 1e4) + config.fills.spread_cents / 2.0
}

fn fill_exit_price(base: f64, config: &RunConfig) -> f64 {
    base * (1.0 - config.fills.slippage_bps / 1e4) - config.fills.spread_cents / 2.0
}

/// Runs one trading day across every ticker in `watchlist`. `bars_by_ticker`
/// must contain that ticker's full day of bars (premarket and RTH) in
/// ascending `ts` order. `prev_daily` supplies PDH/PDL context.
pub fn run_day(
    portfolio: &mut Portfolio,
    calendar: &MarketCalendar,
    date: chrono::NaiveDate,
    watchlist: &[WatchlistItem],
    bars_by_ticker: HashMap<String, Vec<Bar>>,
    prev_daily: &HashMap<String, DailyBar>,
    config: &RunConfig,
) -> Result<DaySimResult, BacktestError> {
    if watchlist.is_empty() {
        return Ok(DaySimResult {
            audit: DayAuditRecord {
                date,
                status: DayStatus::NoWatchlist,
                reason: "no candidates passed selection".to_string(),
            },
            trades: Vec::new(),
            fills: Vec::new(),
            rejected: Vec::new(),
        });
    }

    let mut tickers: HashMap<String, TickerDay> = HashMap::new();
    let mut all_ts: BTreeSet<DateTime<Utc>> = BTreeSet::new();

    for item in watchlist {
        let bars = bars_by_ticker.get(&item.ticker).cloned().unwrap_or_default();
        for b in &bars {
            all_ts.insert(b.ts);
        }
        let engine = FeatureEngine::new(config.features.clone(), prev_daily.get(&item.ticker));
        let strategy = TickerStrategy::new(item.ticker.clone(), config.strategy.clone());
        tickers.insert(
            item.ticker.clone(),
            TickerDay {
                bars,
                feature_engine: engine,
                strategy,
                position: None,
                pending: None,
                entry_bar_index: None,
                trades_today: 0,
            },
        );
    }

    let mut last_price: HashMap<String, f64> = HashMap::new();
    let mut trades: Vec<TradeRecord> = Vec::new();
    let mut fills: Vec<FillRecord> = Vec::new();
    let mut rejected: Vec<RejectedIntent> = Vec::new();
    let mut portfolio_realized_pnl_today = 0.0;

    for ts in all_ts.iter().copied() {
        // Phase 1: mark-to-market using bar-open prices known at this ts.
        for (ticker, day) in tickers.iter() {
            if let Some(bar) = day.bars.iter().find(|b| b.ts == ts) {
                last_price.insert(ticker.clone(), bar.open);
            }
        }
        let equity_at_open: f64 = portfolio.cash
            + tickers
                .values()
                .filter_map(|d| {
                    d.position
                        .as_ref()
                        .map(|p| p.qty as f64 * last_price.get(&p.ticker).copied().unwrap_or(p.avg_entry))
                })
                .sum::<f64>();

        // Phase 2: execute any pending intent queued at a prior bar, on
        // this ticker's first bar at or after that intent's signal_ts.
        // Deterministic order across runs: exits and scale-outs before
        // entries, ticker name as the tiebreak within each group.
        let mut ticker_names: Vec<String> = tickers.keys().cloned().collect();
        ticker_names.sort_by(|a, b| {
            let priority = |t: &str| {
                tickers
                    .get(t)
                    .and_then(|d| d.pending.as_ref())
                    .map(|p| match p.kind {
                        IntentKind::ScaleOut | IntentKind::Exit => 0,
                        IntentKind::Enter => 1,
                    })
                    .unwrap_or(2)
            };
            priority(a).cmp(&priority(b)).then_with(|| a.cmp(b))
        });
        for ticker in &ticker_names {
            let has_bar_now = tickers[ticker].bars.iter().any(|b| b.ts == ts);
            if !has_bar_now {
                continue;
            }
            let Some(intent) = tickers.get(ticker).unwrap().pending.clone() else {
                continue;
            };
            if intent.signal_ts >= ts {
                continue;
            }
            let bar = *tickers[ticker].bars.iter().find(|b| b.ts == ts).unwrap();
            tickers.get_mut(ticker).unwrap().pending = None;

            match intent.kind {
                IntentKind::Enter => execute_enter(
                    portfolio,
                    tickers.get_mut(ticker).unwrap(),
                    &intent,
                    &bar,
                    ts,
                    equity_at_open,
                    config,
                    portfolio_realized_pnl_today,
                    &mut fills,
                    &mut rejected,
                ),
                IntentKind::ScaleOut => {
                    if let Some(pnl_delta) = execute_scale_out(
                        portfolio,
                        tickers.get_mut(ticker).unwrap(),
                        &bar,
                        ts,
                        config,
                        &mut fills,
                    ) {
                        portfolio_realized_pnl_today += pnl_delta;
                    }
                }
                IntentKind::Exit => {
                    if let Some(trade) = execute_exit(
                        portfolio,
                        tickers.get_mut(ticker).unwrap(),
                        &bar,
                        ts,
                        &intent.reason,
                        config,
                        &mut fills,
                    ) {
                        portfolio_realized_pnl_today += trade.pnl_total;
                        trades.push(trade);
                    }
                }
            }
        }

        // Phase 3: feature update and signal generation.
        for ticker in &ticker_names {
            let bar = {
                let day = tickers.get(ticker).unwrap();
                day.bars.iter().find(|b| b.ts == ts).copied()
            };
            let Some(bar) = bar else { continue };

            let snapshot: FeatureSnapshot = {
                let day = tickers.get_mut(ticker).unwrap();
                day.feature_engine.update(&bar, calendar)
            };

            // Entries only fire inside the entry window; exit and
            // force-flat logic stay live for the rest of the session.
            let day = tickers.get_mut(ticker).unwrap();
            day.strategy.observe(&snapshot, bar.close);

            if let Some(position) = day.position.clone() {
                if day.pending.is_some() {
                    continue;
                }
                if exits::scale_out_trigger(&position, &bar, &snapshot) {
                    day.pending = Some(PendingIntent {
                        ticker: ticker.clone(),
                        kind: IntentKind::ScaleOut,
                        reason: "scale_out".to_string(),
                        signal_ts: ts,
                        stop_base: None,
                        scale_fraction: Some(config.strategy.scale_fraction),
                        setup_tag: None,
                    });
                    continue;
                }
                let bars_held = day
                    .entry_bar_index
                    .map(|i| day.bars.iter().position(|b| b.ts == ts).unwrap_or(i) as i64 - i as i64)
                    .unwrap_or(0);
                if let Some(reason) = exits::full_exit_signal(
                    &position,
                    &snapshot,
                    &bar,
                    bars_held,
                    config.strategy.squeeze_hold_min_bars,
                    config.strategy.max_extension_for_exit,
                    config.strategy.level_touch_tolerance_pct,
                ) {
                    day.pending = Some(PendingIntent {
                        ticker: ticker.clone(),
                        kind: IntentKind::Exit,
                        reason: reason.to_string(),
                        signal_ts: ts,
                        stop_base: None,
                        scale_fraction: None,
                        setup_tag: None,
                    });
                }
            } else if calendar.is_in_entry_window(ts) && day.pending.is_none() {
                if let Some(intent) = day.strategy.try_enter(ts, bar.close, bar.low, &snapshot) {
                    day.pending = Some(intent);
                }
            }
        }

        // Phase 4: intrabar stop check for positions with a bar at this ts.
        for ticker in &ticker_names {
            let (has_bar, bar, has_position) = {
                let day = tickers.get(ticker).unwrap();
                let bar = day.bars.iter().find(|b| b.ts == ts).copied();
                (bar.is_some(), bar, day.position.is_some())
            };
            if !has_bar || !has_position {
                continue;
            }
            let bar = bar.unwrap();
            let position = tickers.get(ticker).unwrap().position.clone().unwrap();
            if let Some((stop_price, reason)) = exits::stop_exit(&position, &bar) {
                if let Some(trade) = settle_final_exit(
                    portfolio,
                    tickers.get_mut(ticker).unwrap(),
                    stop_price,
                    ts,
                    reason,
                    config,
                    &mut fills,
                ) {
                    portfolio_realized_pnl_today += trade.pnl_total;
                    trades.push(trade);
                }
            }
        }
    }

    // Force-flat: close any remaining position at that ticker's own last
    // bar of the day, regardless of the global last timestamp.
    for (ticker, day) in tickers.iter_mut() {
        if day.position.is_none() {
            continue;
        }
        let Some(last_bar) = day.bars.last().copied() else {
            return Err(BacktestError::InvariantViolation(format!(
                "{ticker} has an open position with no bars to force-flat against"
            )));
        };
        if let Some(trade) = settle_final_exit(
            portfolio,
            day,
            fill_exit_price(last_bar.close, config),
            last_bar.ts,
            "force_flat",
            config,
            &mut fills,
        ) {
            portfolio_realized_pnl_today += trade.pnl_total;
            trades.push(trade);
        }
        if day.position.is_some() {
            return Err(BacktestError::InvariantViolation(format!(
                "{ticker} still has an open position after force-flat"
            )));
        }
    }

    let status = if trades.is_empty() {
        DayStatus::NoTrades
    } else {
        DayStatus::Ok
    };

    Ok(DaySimResult {
        audit: DayAuditRecord {
            date,
            status,
            reason: if trades.is_empty() {
                "watchlist present, no setups fired".to_string()
            } else {
                format!("{} trades", trades.len())
            },
        },
        trades,
        fills,
        rejected,
    })
}

#[allow(clippy::too_many_arguments)]
fn execute_enter(
    portfolio: &mut Portfolio,
    day: &mut TickerDay,
    intent: &PendingIntent,
    bar: &Bar,
    ts: DateTime<Utc>,
    equity_at_open: f64,
    config: &RunConfig,
    portfolio_realized_pnl_today: f64,
    fills: &mut Vec<FillRecord>,
    rejected: &mut Vec<RejectedIntent>,
) {
    let reject = |reason: &str, rejected: &mut Vec<RejectedIntent>| {
        rejected.push(RejectedIntent {
            ts,
            ticker: intent.ticker.clone(),
            kind: IntentKind::Enter,
            reason_code: reason.to_string(),
        });
    };

    if day.trades_today >= config.risk.max_trades_per_day {
        reject("max_trades_per_day", rejected);
        return;
    }
    if portfolio_realized_pnl_today <= -config.risk.max_daily_loss_dollars {
        reject("max_daily_loss", rejected);
        return;
    }

    let computed_entry_px = fill_entry_price(bar.open, config);
    let stop_px = intent.stop_base.unwrap_or(0.0);

    // The fill bar gapped through the planned stop before the entry even
    // settled: `stop_px` would sit at or above the computed fill price. I6
    // reads as a flat reject here, but that silently drops the worked
    // gap-through scenario (entry fills, then flattens on the very same
    // bar) from the ledger entirely. Anchor the entry at the stop/reference
    // level instead of rejecting -- Phase 4's intrabar check runs later in
    // this same timestamp and will flatten the position immediately against
    // the bar's actual (worse) open. See DESIGN.md's Open Question entry.
    let gap_through_at_entry = stop_px >= computed_entry_px;
    let entry_px = if gap_through_at_entry { stop_px } else { computed_entry_px };

    let risk_dollars = config.risk.risk_per_trade_pct * equity_at_open;
    let size_fraction = intent.scale_fraction.unwrap_or(1.0);
    let qty = if gap_through_at_entry {
        // No valid per-share stop distance exists once the stop sits at or
        // above the fill price; bound size by entry notional instead.
        ((risk_dollars / entry_px) * size_fraction).floor() as i64
    } else {
        ((risk_dollars / (entry_px - stop_px)) * size_fraction).floor() as i64
    };
    if qty < 1 {
        reject("qty_below_one", rejected);
        return;
    }
    if entry_px * qty as f64 > config.risk.max_position_notional_pct * equity_at_open {
        reject("max_position_notional", rejected);
        return;
    }

    portfolio.cash -= entry_px * qty as f64;
    let trade_id = portfolio.next_trade_id();
    day.position = Some(Position {
        ticker: intent.ticker.clone(),
        trade_id,
        qty,
        avg_entry: entry_px,
        stop: stop_px,
        stop_initial: stop_px,
        entry_ts: ts,
        signal_ts: intent.signal_ts,
        setup_tag: intent.setup_tag.clone().unwrap_or_default(),
        original_qty: qty,
        scale_pnl_realized: 0.0,
        scaled_out: false,
    });
    day.entry_bar_index = day.bars.iter().position(|b| b.ts == ts);
    day.trades_today += 1;

    fills.push(FillRecord {
        ts,
        ticker: intent.ticker.clone(),
        side: Side::Buy,
        qty,
        price: entry_px,
        fee: 0.0,
        intent_kind: IntentKind::Enter,
        reason: intent.reason.clone(),
        linked_trade_id: Some(trade_id),
    });
}

fn execute_scale_out(
    portfolio: &mut Portfolio,
    day: &mut TickerDay,
    bar: &Bar,
    ts: DateTime<Utc>,
    config: &RunConfig,
    fills: &mut Vec<FillRecord>,
) -> Option<f64> {
    let position = day.position.as_mut()?;
    let trade_id = position.trade_id;
    let fraction = config.strategy.scale_fraction;
    let qty = ((position.original_qty as f64 * fraction).floor() as i64).min(position.qty);
    if qty < 1 {
        return None;
    }
    let exit_px = fill_exit_price(bar.open, config);
    portfolio.cash += exit_px * qty as f64;
    let pnl = (exit_px - position.avg_entry) * qty as f64;
    position.scale_pnl_realized += pnl;
    position.qty -= qty;
    position.scaled_out = true;
    position.stop = position.stop.max(position.avg_entry);

    fills.push(FillRecord {
        ts,
        ticker: position.ticker.clone(),
        side: Side::Sell,
        qty,
        price: exit_px,
        fee: 0.0,
        intent_kind: IntentKind::ScaleOut,
        reason: "scale_out".to_string(),
        linked_trade_id: Some(trade_id),
    });
    Some(pnl)
}

fn execute_exit(
    portfolio: &mut Portfolio,
    day: &mut TickerDay,
    bar: &Bar,
    ts: DateTime<Utc>,
    reason: &str,
    config: &RunConfig,
    fills: &mut Vec<FillRecord>,
) -> Option<TradeRecord> {
    let exit_px = fill_exit_price(bar.open, config);
    settle_final_exit(portfolio, day, exit_px, ts, reason, config, fills)
}

fn settle_final_exit(
    portfolio: &mut Portfolio,
    day: &mut TickerDay,
    exit_px_base: f64,
    exit_ts: DateTime<Utc>,
    reason: &str,
    config: &RunConfig,
    fills: &mut Vec<FillRecord>,
) -> Option<TradeRecord> {
    let position = day.position.take()?;
    let exit_px = if reason.starts_with("stop_hit") {
        fill_exit_price(exit_px_base, config)
    } else {
        exit_px_base
    };

    portfolio.cash += exit_px * position.qty as f64;
    portfolio.cash -= config.fills.fees_per_trade;

    let final_exit_pnl = (exit_px - position.avg_entry) * position.qty as f64;
    let pnl_total = position.scale_pnl_realized + final_exit_pnl - config.fills.fees_per_trade;

    fills.push(FillRecord {
        ts: exit_ts,
        ticker: position.ticker.clone(),
        side: Side::Sell,
        qty: position.qty,
        price: exit_px,
        fee: config.fills.fees_per_trade,
        intent_kind: IntentKind::Exit,
        reason: reason.to_string(),
        linked_trade_id: Some(position.trade_id),
    });

    if reason.starts_with("stop_hit") || reason == "failed_breakout" {
        day.strategy.arm_cooldown(exit_ts);
    }

    let bars_held = day
        .entry_bar_index
        .and_then(|i| day.bars.iter().position(|b| b.ts == exit_ts).map(|j| (j as i64 - i as i64).max(0)))
        .unwrap_or(0);

    Some(TradeRecord {
        ticker: position.ticker.clone(),
        trade_id: position.trade_id,
        setup_tag: position.setup_tag.clone(),
        entry_ts: position.entry_ts,
        exit_ts,
        signal_ts: position.signal_ts,
        entry_px: position.avg_entry,
        avg_exit_px: exit_px,
        original_qty: position.original_qty,
        scale_pnl: position.scale_pnl_realized,
        final_exit_pnl,
        fees: config.fills.fees_per_trade,
        pnl_total,
        exit_reason: reason.to_string(),
        stop_px_initial: position.stop_initial,
        bars_held,
    })
}

#[cfg(test)]
mod gap_through_entry_tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 3, 13, minute, 0).unwrap()
    }

    /// Reproduces the gap-through-at-entry worked scenario: an entry signal
    /// with `stop_base=10.00` whose fill bar gaps down to open 9.80. The
    /// entry still fills (anchored at the stop/reference price) and is
    /// immediately flattened by the same-timestamp intrabar stop check, with
    /// cooldown armed. See DESIGN.md's Open Question for the reasoning.
    #[test]
    fn gap_through_at_entry_fills_then_immediately_flattens_same_bar() {
        let mut config = RunConfig::default();
        config.fills.slippage_bps = 0.0;
        config.fills.spread_cents = 0.0;

        let mut portfolio = Portfolio::new(25_000.0);
        let signal_ts = ts(40);
        let fill_ts = ts(41);
        let bar = Bar {
            ts: fill_ts,
            open: 9.80,
            high: 9.85,
            low: 9.70,
            close: 9.82,
            volume: 5_000.0,
        };
        let mut day = TickerDay {
            bars: vec![bar],
            feature_engine: FeatureEngine::new(config.features.clone(), None),
            strategy: TickerStrategy::new("SYNT".to_string(), config.strategy.clone()),
            position: None,
            pending: None,
            entry_bar_index: None,
            trades_today: 0,
        };

        let intent = PendingIntent {
            ticker: "SYNT".to_string(),
            kind: IntentKind::Enter,
            reason: "setup_a".to_string(),
            signal_ts,
            stop_base: Some(10.00),
            scale_fraction: None,
            setup_tag: Some("A".to_string()),
        };

        let equity_at_open = portfolio.cash;
        let mut fills = Vec::new();
        let mut rejected = Vec::new();
        execute_enter(
            &mut portfolio,
            &mut day,
            &intent,
            &bar,
            fill_ts,
            equity_at_open,
            &config,
            0.0,
            &mut fills,
            &mut rejected,
        );

        assert!(rejected.is_empty(), "gap-through entry must not be rejected: {rejected:?}");
        let position = day.position.clone().expect("entry should have filled");
        assert_eq!(position.avg_entry, 10.00);
        assert_eq!(position.stop, 10.00);

        let (exit_px_base, reason) =
            exits::stop_exit(&position, &bar).expect("gap-through stop must fire on the same bar");
        assert_eq!(reason, "stop_hit_gap_through");
        assert_eq!(exit_px_base, bar.open);

        let trade = settle_final_exit(&mut portfolio, &mut day, exit_px_base, fill_ts, reason, &config, &mut fills)
            .expect("position should close");

        assert_eq!(trade.exit_reason, "stop_hit_gap_through");
        assert!(trade.signal_ts < trade.entry_ts, "I2: signal precedes entry");
        assert!(trade.signal_ts < trade.exit_ts, "I2: signal precedes exit");
        let expected_pnl = (9.80 - 10.00) * trade.original_qty as f64 - config.fills.fees_per_trade;
        assert!((trade.pnl_total - expected_pnl).abs() < 1e-9);

        assert!(day.strategy.in_cooldown(fill_ts), "cooldown should be armed after a stop-hit exit");
    }
}
