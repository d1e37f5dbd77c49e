//! Exit rules: intrabar stop, scale-out trigger, and full-exit signals.
//! Pure functions over a position snapshot and the current bar/features --
//! the caller (the simulator) owns all mutation and fill bookkeeping.

use ybi_core::{Bar, FeatureSnapshot, MomentumSign, Position, TtmState};

/// Checks the stop against this bar's (open, low). `bar.low <= stop` means
/// the stop is hit; a gapped-through open gets the worse fill price.
pub fn stop_exit(position: &Position, bar: &Bar) -> Option<(f64, &'static str)> {
    if bar.low > position.stop {
        return None;
    }
    if bar.open <= position.stop {
        Some((bar.open, "stop_hit_gap_through"))
    } else {
        Some((position.stop, "stop_hit"))
    }
}

/// True the first time the bar's high touches the nearest resistance level
/// above the entry price, and the position hasn't already been scaled.
pub fn scale_out_trigger(position: &Position, bar: &Bar, snapshot: &FeatureSnapshot) -> bool {
    if position.scaled_out {
        return false;
    }
    nearest_resistance_above(position.avg_entry, snapshot)
        .map(|level| bar.high >= level)
        .unwrap_or(false)
}

pub fn nearest_resistance_above(entry_px: f64, snapshot: &FeatureSnapshot) -> Option<f64> {
    snapshot
        .pivots
        .iter()
        .chain(snapshot.round_levels.iter())
        .map(|l| l.price)
        .filter(|&p| p > entry_px)
        .fold(None, |acc, p| match acc {
            Some(a) if a < p => Some(a),
            _ => Some(p),
        })
}

/// Any of the four full-exit signals firing, with a reason code.
pub fn full_exit_signal(
    position: &Position,
    snapshot: &FeatureSnapshot,
    bar: &Bar,
    bars_held: i64,
    squeeze_hold_min_bars: i64,
    max_extension_for_exit: f64,
    level_touch_tolerance_pct: f64,
) -> Option<&'static str> {
    let in_squeeze = matches!(snapshot.ttm_state, TtmState::WeakBull | TtmState::WeakBear);
    if in_squeeze && bars_held >= squeeze_hold_min_bars {
        if let Some(ema8) = snapshot.ema8 {
            if bar.close < ema8 {
                return Some("close_below_ema8_after_squeeze");
            }
        }
    }

    let ttm_bear = matches!(snapshot.ttm_state, TtmState::WeakBear | TtmState::StrongBear);
    if ttm_bear && snapshot.momentum_sign == MomentumSign::Bear {
        return Some("ttm_flip_bear");
    }

    if let Some(resistance) = nearest_resistance_above(position.avg_entry, snapshot) {
        let near_level = (bar.high - resistance).abs() / resistance <= level_touch_tolerance_pct
            || bar.high >= resistance;
        if near_level && bar.high > resistance && bar.close < resistance {
            return Some("failed_breakout");
        }
    }

    if let Some(extension) = snapshot.extension_from_ema8 {
        let bearish_rejection = bar.close < bar.open;
        if extension > max_extension_for_exit && bearish_rejection {
            return Some("extension_rejection");
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn position() -> Position {
        Position {
            ticker: "TEST".to_string(),
            trade_id: 1,
            qty: 100,
            avg_entry: 10.0,
            stop: 9.5,
            stop_initial: 9.5,
            entry_ts: Utc::now(),
            signal_ts: Utc::now(),
            setup_tag: "A".to_string(),
            original_qty: 100,
            scale_pnl_realized: 0.0,
            scaled_out: false,
        }
    }

    fn bar(open: f64, high: f64, low: f64, close: f64) -> Bar {
        Bar {
            ts: Utc::now(),
            open,
            high,
            low,
            close,
            volume: 1000.0,
        }
    }

    fn snapshot(ttm_state: TtmState, ema8: f64) -> FeatureSnapshot {
        FeatureSnapshot {
            ts: Utc::now(),
            ema8: Some(ema8),
            ema21: None,
            ema34: None,
            ema55: None,
            ema200_or_sma200: None,
            vwap_rth: None,
            ttm_state,
            momentum_sign: MomentumSign::None,
            extension_from_ema8: None,
            pmh: None,
            pml: None,
            pdh: None,
            pdl: None,
            open_px: None,
            hod_so_far: None,
            lod_so_far: None,
            pivots: Vec::new(),
            round_levels: Vec::new(),
        }
    }

    #[test]
    fn close_below_ema8_after_squeeze_requires_squeeze_state() {
        let pos = position();
        let b = bar(10.0, 10.1, 9.8, 9.9);
        let snap = snapshot(TtmState::None, 10.0);
        assert_eq!(full_exit_signal(&pos, &snap, &b, 10, 3, 0.05, 0.002), None);
    }

    #[test]
    fn close_below_ema8_after_squeeze_fires_in_squeeze() {
        let pos = position();
        let b = bar(10.0, 10.1, 9.8, 9.9);
        let snap = snapshot(TtmState::WeakBull, 10.0);
        assert_eq!(
            full_exit_signal(&pos, &snap, &b, 10, 3, 0.05, 0.002),
            Some("close_below_ema8_after_squeeze")
        );
    }

    #[test]
    fn stop_hit_without_gap_fills_at_stop_price() {
        let pos = position();
        let b = bar(9.8, 9.9, 9.4, 9.6);
        let result = stop_exit(&pos, &b);
        assert_eq!(result, Some((9.5, "stop_hit")));
    }

    #[test]
    fn gap_through_fills_at_open() {
        let pos = position();
        let b = bar(9.2, 9.3, 9.0, 9.1);
        let result = stop_exit(&pos, &b);
        assert_eq!(result, Some((9.2, "stop_hit_gap_through")));
    }

    #[test]
    fn no_stop_hit_above_stop_price() {
        let pos = position();
        let b = bar(10.2, 10.3, 9.8, 10.1);
        assert_eq!(stop_exit(&pos, &b), None);
    }
}
