use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeaturesConfig {
    /// Use a 200-period EMA for the long baseline; otherwise SMA-200.
    pub use_ema200: bool,
    /// Half-width of the centered window used to confirm a fractal pivot;
    /// a pivot at bar `i` is confirmed once bar `i + pivot_window` closes.
    pub pivot_window: usize,
    /// Merge tolerance for nearby levels, as a fraction of price (e.g. 0.002 = 0.2%).
    pub level_cluster_tolerance_pct: f64,
    pub max_extension_for_entry: f64,
    pub max_extension_for_exit: f64,
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            use_ema200: false,
            pivot_window: 5,
            level_cluster_tolerance_pct: 0.002,
            max_extension_for_entry: 0.05,
            max_extension_for_exit: 0.12,
        }
    }
}
