use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub setup_a_enabled: bool,
    pub setup_b_enabled: bool,
    pub setup_c_enabled: bool,
    pub setup_d_enabled: bool,
    pub setup_e_enabled: bool,
    pub starter_fraction: f64,
    pub scale_fraction: f64,
    pub cooldown_minutes: i64,
    pub max_extension_for_entry: f64,
    pub max_extension_for_exit: f64,
    /// Minimum bars a squeeze-entry position must be held before the
    /// close-below-EMA8 full-exit signal is armed.
    pub squeeze_hold_min_bars: i64,
    /// A level is "held"/"touched" within this fraction of its price.
    pub level_touch_tolerance_pct: f64,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            setup_a_enabled: true,
            setup_b_enabled: true,
            setup_c_enabled: true,
            setup_d_enabled: true,
            setup_e_enabled: true,
            starter_fraction: 0.20,
            scale_fraction: 0.5,
            cooldown_minutes: 15,
            max_extension_for_entry: 0.05,
            max_extension_for_exit: 0.12,
            squeeze_hold_min_bars: 3,
            level_touch_tolerance_pct: 0.002,
        }
    }
}
