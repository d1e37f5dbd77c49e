//! Streaming, strictly causal feature computation: one bar in, one
//! [`FeatureSnapshot`] out, aligned to that bar's close. Nothing here ever
//! reads a bar later than the one it is currently processing.

use std::collections::VecDeque;

use ybi_calendar::MarketCalendar;
use ybi_core::{DailyBar, FeatureSnapshot, MomentumSign, TtmState};

use crate::config::FeaturesConfig;
use crate::levels::{cluster, round_levels};
use crate::math::{atr, ema_step, linreg_slope, mean_std};
use crate::pivots::PivotTracker;

const SQUEEZE_WINDOW: usize = 20;

pub struct FeatureEngine {
    config: FeaturesConfig,
    bars_seen: usize,

    ema8: Option<f64>,
    ema21: Option<f64>,
    ema34: Option<f64>,
    ema55: Option<f64>,
    ema200: Option<f64>,
    sma200_window: VecDeque<f64>,

    vwap_num: f64,
    vwap_den: f64,

    pmh: Option<f64>,
    pml: Option<f64>,
    open_px: Option<f64>,
    hod_so_far: Option<f64>,
    lod_so_far: Option<f64>,

    pdh: Option<f64>,
    pdl: Option<f64>,

    closes: VecDeque<f64>,
    highs: VecDeque<f64>,
    lows: VecDeque<f64>,

    pivots: PivotTracker,
}

impl FeatureEngine {
    /// `prev_daily` supplies PDH/PDL; `None` on the first day of a ticker's
    /// history, in which case those fields stay `None` all day.
    pub fn new(config: FeaturesConfig, prev_daily: Option<&DailyBar>) -> Self {
        Self {
            bars_seen: 0,
            ema8: None,
            ema21: None,
            ema34: None,
            ema55: None,
            ema200: None,
            sma200_window: VecDeque::with_capacity(200),
            vwap_num: 0.0,
            vwap_den: 0.0,
            pmh: None,
            pml: None,
            open_px: None,
            hod_so_far: None,
            lod_so_far: None,
            pdh: prev_daily.map(|d| d.high),
            pdl: prev_daily.map(|d| d.low),
            closes: VecDeque::with_capacity(SQUEEZE_WINDOW),
            highs: VecDeque::with_capacity(SQUEEZE_WINDOW),
            lows: VecDeque::with_capacity(SQUEEZE_WINDOW),
            pivots: PivotTracker::new(config.pivot_window),
            config,
        }
    }

    pub fn update(&mut self, bar: &ybi_core::Bar, calendar: &MarketCalendar) -> FeatureSnapshot {
        self.bars_seen += 1;

        self.ema8 = Some(ema_step(self.ema8, bar.close, 8));
        self.ema21 = Some(ema_step(self.ema21, bar.close, 21));
        self.ema34 = Some(ema_step(self.ema34, bar.close, 34));
        self.ema55 = Some(ema_step(self.ema55, bar.close, 55));

        if self.config.use_ema200 {
            self.ema200 = Some(ema_step(self.ema200, bar.close, 200));
        } else {
            if self.sma200_window.len() == 200 {
                self.sma200_window.pop_front();
            }
            self.sma200_window.push_back(bar.close);
        }

        let is_rth = calendar.is_rth(bar.ts);
        let is_premarket = calendar.is_premarket(bar.ts);

        if is_rth {
            let typical = (bar.high + bar.low + bar.close) / 3.0;
            self.vwap_num += typical * bar.volume;
            self.vwap_den += bar.volume;

            if self.open_px.is_none() {
                self.open_px = Some(bar.open);
            }
            self.hod_so_far = Some(self.hod_so_far.map_or(bar.high, |h| h.max(bar.high)));
            self.lod_so_far = Some(self.lod_so_far.map_or(bar.low, |l| l.min(bar.low)));
        }

        if is_premarket {
            self.pmh = Some(self.pmh.map_or(bar.high, |h| h.max(bar.high)));
            self.pml = Some(self.pml.map_or(bar.low, |l| l.min(bar.low)));
        }

        if self.closes.len() == SQUEEZE_WINDOW {
            self.closes.pop_front();
            self.highs.pop_front();
            self.lows.pop_front();
        }
        self.closes.push_back(bar.close);
        self.highs.push_back(bar.high);
        self.lows.push_back(bar.low);

        self.pivots.push(bar.high, bar.low);

        let (ttm_state, momentum_sign) = self.squeeze_state();

        let ema200_or_sma200 = if self.config.use_ema200 {
            self.gated(self.ema200, 200)
        } else if self.sma200_window.len() >= 200 {
            Some(self.sma200_window.iter().sum::<f64>() / 200.0)
        } else {
            None
        };

        let ema8 = self.gated(self.ema8, 8);
        let extension_from_ema8 = ema8.map(|e| (bar.high - e) / e);

        let clustered = cluster(&round_levels(bar.close), self.config.level_cluster_tolerance_pct);

        FeatureSnapshot {
            ts: bar.ts,
            ema8,
            ema21: self.gated(self.ema21, 21),
            ema34: self.gated(self.ema34, 34),
            ema55: self.gated(self.ema55, 55),
            ema200_or_sma200,
            vwap_rth: if self.vwap_den > 0.0 {
                Some(self.vwap_num / self.vwap_den)
            } else {
                None
            },
            ttm_state,
            momentum_sign,
            extension_from_ema8,
            pmh: self.pmh,
            pml: self.pml,
            pdh: self.pdh,
            pdl: self.pdl,
            open_px: self.open_px,
            hod_so_far: self.hod_so_far,
            lod_so_far: self.lod_so_far,
            pivots: self.pivots.confirmed.clone(),
            round_levels: clustered,
        }
    }

    fn gated(&self, value: Option<f64>, period: usize) -> Option<f64> {
        if self.bars_seen >= period {
            value
        } else {
            None
        }
    }

    fn squeeze_state(&self) -> (TtmState, MomentumSign) {
        if self.closes.len() < SQUEEZE_WINDOW {
            return (TtmState::None, MomentumSign::None);
        }

        let closes: Vec<f64> = self.closes.iter().copied().collect();
        let highs: Vec<f64> = self.highs.iter().copied().collect();
        let lows: Vec<f64> = self.lows.iter().copied().collect();

        let (mean, std) = mean_std(&closes);
        let bb_upper = mean + 2.0 * std;
        let bb_lower = mean - 2.0 * std;

        let atr_val = atr(&highs, &lows, &closes);
        let kc_upper = mean + 1.5 * atr_val;
        let kc_lower = mean - 1.5 * atr_val;

        let squeeze_on = bb_upper <= kc_upper && bb_lower >= kc_lower;
        let slope = linreg_slope(&closes);

        let momentum_sign = if slope > 0.0 {
            MomentumSign::Bull
        } else if slope < 0.0 {
            MomentumSign::Bear
        } else {
            MomentumSign::None
        };

        let ttm_state = match (squeeze_on, momentum_sign) {
            (false, MomentumSign::Bull) => TtmState::StrongBull,
            (true, MomentumSign::Bull) => TtmState::WeakBull,
            (true, MomentumSign::Bear) => TtmState::WeakBear,
            (false, MomentumSign::Bear) => TtmState::StrongBear,
            _ => TtmState::None,
        };

        (ttm_state, momentum_sign)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use ybi_calendar::SessionConfig;
    use ybi_core::Bar;

    fn bar(minute: u32, price: f64) -> Bar {
        Bar {
            ts: Utc.with_ymd_and_hms(2024, 3, 29, 13, minute, 0).unwrap(),
            open: price,
            high: price + 0.05,
            low: price - 0.05,
            close: price,
            volume: 1000.0,
        }
    }

    #[test]
    fn ema_fields_are_none_before_warmup() {
        let calendar = MarketCalendar::new(SessionConfig::default());
        let mut engine = FeatureEngine::new(FeaturesConfig::default(), None);
        let snap = engine.update(&bar(30, 10.0), &calendar);
        assert!(snap.ema8.is_none());
        assert!(snap.ema21.is_none());
    }

    #[test]
    fn ema8_becomes_available_after_eight_bars() {
        let calendar = MarketCalendar::new(SessionConfig::default());
        let mut engine = FeatureEngine::new(FeaturesConfig::default(), None);
        let mut snap = None;
        for i in 0..8 {
            snap = Some(engine.update(&bar(30 + i, 10.0 + i as f64 * 0.01), &calendar));
        }
        assert!(snap.unwrap().ema8.is_some());
    }

    #[test]
    fn vwap_only_accumulates_during_rth() {
        let calendar = MarketCalendar::new(SessionConfig::default());
        let mut engine = FeatureEngine::new(FeaturesConfig::default(), None);
        let premarket_bar = Bar {
            ts: Utc.with_ymd_and_hms(2024, 3, 29, 8, 0, 0).unwrap(),
            ..bar(30, 10.0)
        };
        let snap = engine.update(&premarket_bar, &calendar);
        assert!(snap.vwap_rth.is_none());
    }
}
