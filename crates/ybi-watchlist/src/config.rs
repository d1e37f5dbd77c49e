use serde::{Deserialize, Serialize};
use ybi_core::SelectionMethod;

/// Watchlist-builder configuration, recorded verbatim into run metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchlistConfig {
    pub method: SelectionMethod,
    pub top_n: usize,
    pub min_prev_close: f64,
    pub max_prev_close: f64,
    pub min_premarket_pct: f64,
    pub min_premarket_volume: f64,
    pub min_premarket_dollar_volume: f64,
    pub max_candidates_to_scan: usize,
    /// When true (default), reference data resolves ambiguous suffix
    /// patterns instead of the pattern-only heuristic.
    pub use_reference_data: bool,
}

impl Default for WatchlistConfig {
    fn default() -> Self {
        Self {
            method: SelectionMethod::GapOpen,
            top_n: 10,
            min_prev_close: 1.0,
            max_prev_close: 20.0,
            min_premarket_pct: 0.10,
            min_premarket_volume: 100_000.0,
            min_premarket_dollar_volume: 500_000.0,
            max_candidates_to_scan: 500,
            use_reference_data: true,
        }
    }
}
