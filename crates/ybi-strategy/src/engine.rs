//! Per-ticker, per-day entry state machine: evaluates setups A-E in
//! priority order and tracks the ephemeral context (breakout legs, cooldown)
//! that the pure filter/exit functions don't carry themselves.

use chrono::{DateTime, Duration, Utc};
use ybi_core::{FeatureSnapshot, IntentKind, PendingIntent};

use crate::config::StrategyConfig;
use crate::filters::{macro_filter, micro_filter, starter_filter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickerState {
    Flat,
    Entered,
    Scaled,
    Exited,
}

/// Per-ticker-per-day ephemeral strategy context. One instance is created
/// per (ticker, day) and fed bars in order; never shared across days.
pub struct TickerStrategy {
    pub ticker: String,
    config: StrategyConfig,
    pub state: TickerState,
    cooldown_until: Option<DateTime<Utc>>,
    had_breakout_leg: bool,
    recent_pivot_lows: Vec<f64>,
    hod_before_pullback: Option<f64>,
}

impl TickerStrategy {
    pub fn new(ticker: String, config: StrategyConfig) -> Self {
        Self {
            ticker,
            config,
            state: TickerState::Flat,
            cooldown_until: None,
            had_breakout_leg: false,
            recent_pivot_lows: Vec::new(),
            hod_before_pullback: None,
        }
    }

    pub fn in_cooldown(&self, now: DateTime<Utc>) -> bool {
        self.cooldown_until.map_or(false, |until| now < until)
    }

    pub fn arm_cooldown(&mut self, now: DateTime<Utc>) {
        self.cooldown_until = Some(now + Duration::minutes(self.config.cooldown_minutes));
    }

    /// Updates ephemeral breakout/pullback bookkeeping from the bar just
    /// closed. Must be called once per bar before `try_enter`.
    pub fn observe(&mut self, snapshot: &FeatureSnapshot, bar_close: f64) {
        if let Some(pmh) = snapshot.pmh {
            if bar_close > pmh {
                self.had_breakout_leg = true;
            }
        }
        if let Some(hod) = snapshot.hod_so_far {
            if self.hod_before_pullback.is_none() || hod > self.hod_before_pullback.unwrap() {
                self.hod_before_pullback = Some(hod);
            }
        }
        for level in &snapshot.pivots {
            if level.kind == ybi_core::LevelKind::PivotLow && self.recent_pivot_lows.len() < 8 {
                if !self
                    .recent_pivot_lows
                    .iter()
                    .any(|&p| (p - level.price).abs() / level.price < 0.002)
                {
                    self.recent_pivot_lows.push(level.price);
                }
            }
        }
    }

    /// Evaluates setups A-E in priority order against the bar that just
    /// closed at `signal_ts`. Returns at most one entry intent.
    pub fn try_enter(
        &mut self,
        signal_ts: DateTime<Utc>,
        price: f64,
        bar_low: f64,
        snapshot: &FeatureSnapshot,
    ) -> Option<PendingIntent> {
        if self.state != TickerState::Flat || self.in_cooldown(signal_ts) {
            return None;
        }

        if self.config.setup_a_enabled {
            if let Some(pmh) = snapshot.pmh {
                let not_overextended = snapshot
                    .extension_from_ema8
                    .map_or(true, |e| e <= self.config.max_extension_for_entry);
                if price > pmh
                    && not_overextended
                    && macro_filter(snapshot, price)
                    && micro_filter(snapshot, price)
                {
                    return Some(self.entry_intent(
                        signal_ts,
                        "A",
                        pmh.min(bar_low),
                        None,
                    ));
                }
            }
        }

        if self.config.setup_b_enabled && self.had_breakout_leg {
            if let Some(reference) = snapshot.vwap_rth.or(snapshot.ema21) {
                let shallow_dip = bar_low < reference * 1.01 && bar_low >= reference * 0.98;
                if price > reference
                    && shallow_dip
                    && macro_filter(snapshot, price)
                    && micro_filter(snapshot, price)
                {
                    return Some(self.entry_intent(signal_ts, "B", reference, None));
                }
            }
        }

        if self.config.setup_c_enabled && self.recent_pivot_lows.len() >= 2 {
            let mut lows = self.recent_pivot_lows.clone();
            lows.sort_by(|a, b| a.partial_cmp(b).unwrap());
            let (low1, low2) = (lows[0], lows[1]);
            let within_tolerance = (low1 - low2).abs() / low1.max(low2) < 0.01;
            if within_tolerance
                && snapshot.ema8.map_or(false, |e| price > e)
                && snapshot.momentum_sign == ybi_core::MomentumSign::Bull
                && macro_filter(snapshot, price)
            {
                return Some(self.entry_intent(signal_ts, "C", low1.min(low2), None));
            }
        }

        if self.config.setup_d_enabled {
            if let Some(level) = crate::exits::nearest_resistance_above(price * 0.98, snapshot)
                .filter(|&l| l <= price)
                .or_else(|| snapshot.pml)
            {
                let holding_level =
                    (price - level).abs() / level <= self.config.level_touch_tolerance_pct;
                if holding_level
                    && snapshot.ttm_state == ybi_core::TtmState::WeakBear
                    && macro_filter(snapshot, price)
                    && starter_filter(snapshot, price)
                {
                    return Some(self.entry_intent(
                        signal_ts,
                        "D",
                        level,
                        Some(self.config.starter_fraction),
                    ));
                }
            }
        }

        if self.config.setup_e_enabled {
            if let (Some(hod), Some(ema21)) = (self.hod_before_pullback, snapshot.ema21) {
                let pullback_pct = (hod - price) / hod;
                if pullback_pct > 0.01
                    && price > ema21
                    && snapshot.momentum_sign == ybi_core::MomentumSign::Bull
                    && macro_filter(snapshot, price)
                    && micro_filter(snapshot, price)
                {
                    return Some(self.entry_intent(signal_ts, "E", ema21, None));
                }
            }
        }

        None
    }

    fn entry_intent(
        &mut self,
        signal_ts: DateTime<Utc>,
        setup_tag: &str,
        stop_base: f64,
        scale_fraction: Option<f64>,
    ) -> PendingIntent {
        PendingIntent {
            ticker: self.ticker.clone(),
            kind: IntentKind::Enter,
            reason: format!("setup_{}", setup_tag.to_lowercase()),
            signal_ts,
            stop_base: Some(stop_base),
            scale_fraction,
            setup_tag: Some(setup_tag.to_string()),
        }
    }
}
