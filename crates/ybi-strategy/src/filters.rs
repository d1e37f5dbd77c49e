//! Macro and micro entry filters.

use ybi_core::{FeatureSnapshot, MomentumSign, TtmState};

/// Required for any entry: price above the 34/55 EMAs, and above the
/// 200-period baseline when that baseline is available.
pub fn macro_filter(snapshot: &FeatureSnapshot, price: f64) -> bool {
    let above_34 = snapshot.ema34.map_or(false, |e| price > e);
    let above_55 = snapshot.ema55.map_or(false, |e| price > e);
    let above_200 = snapshot.ema200_or_sma200.map_or(true, |e| price > e);
    above_34 && above_55 && above_200
}

/// Strict micro filter: price above the 8/21 EMAs, TTM in a bullish state,
/// bull momentum.
pub fn micro_filter(snapshot: &FeatureSnapshot, price: f64) -> bool {
    let above_8 = snapshot.ema8.map_or(false, |e| price > e);
    let above_21 = snapshot.ema21.map_or(false, |e| price > e);
    let bullish_ttm = matches!(snapshot.ttm_state, TtmState::WeakBull | TtmState::StrongBull);
    above_8 && above_21 && bullish_ttm && snapshot.momentum_sign == MomentumSign::Bull
}

/// Relaxed starter variant: TTM only needs to not be in a confirmed bull
/// state already (weak_bear is acceptable), still requires bull momentum.
pub fn starter_filter(snapshot: &FeatureSnapshot, price: f64) -> bool {
    let above_8 = snapshot.ema8.map_or(false, |e| price > e);
    let above_21 = snapshot.ema21.map_or(false, |e| price > e);
    let acceptable_ttm = matches!(
        snapshot.ttm_state,
        TtmState::WeakBull | TtmState::StrongBull | TtmState::WeakBear
    );
    above_8 && above_21 && acceptable_ttm
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn snapshot() -> FeatureSnapshot {
        FeatureSnapshot {
            ts: Utc::now(),
            ema8: Some(9.0),
            ema21: Some(8.5),
            ema34: Some(8.0),
            ema55: Some(7.5),
            ema200_or_sma200: Some(7.0),
            vwap_rth: None,
            ttm_state: TtmState::WeakBull,
            momentum_sign: MomentumSign::Bull,
            extension_from_ema8: None,
            pmh: None,
            pml: None,
            pdh: None,
            pdl: None,
            open_px: None,
            hod_so_far: None,
            lod_so_far: None,
            pivots: vec![],
            round_levels: vec![],
        }
    }

    #[test]
    fn macro_filter_requires_price_above_all_baselines() {
        let s = snapshot();
        assert!(macro_filter(&s, 10.0));
        assert!(!macro_filter(&s, 6.0));
    }

    #[test]
    fn micro_filter_requires_bull_momentum_and_ttm() {
        let s = snapshot();
        assert!(micro_filter(&s, 10.0));
        let mut bearish = s.clone();
        bearish.momentum_sign = MomentumSign::Bear;
        assert!(!micro_filter(&bearish, 10.0));
    }
}
