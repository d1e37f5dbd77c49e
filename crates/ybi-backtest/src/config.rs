use serde::{Deserialize, Serialize};
use ybi_calendar::SessionConfig;
use ybi_features::FeaturesConfig;
use ybi_strategy::StrategyConfig;
use ybi_watchlist::WatchlistConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    pub risk_per_trade_pct: f64,
    pub max_position_notional_pct: f64,
    pub max_trades_per_day: u32,
    pub max_daily_loss_dollars: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            risk_per_trade_pct: 0.01,
            max_position_notional_pct: 0.25,
            max_trades_per_day: 3,
            max_daily_loss_dollars: 500.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FillsConfig {
    pub slippage_bps: f64,
    pub spread_cents: f64,
    pub fees_per_trade: f64,
}

impl Default for FillsConfig {
    fn default() -> Self {
        Self {
            slippage_bps: 5.0,
            spread_cents: 0.01,
            fees_per_trade: 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceConfig {
    pub bootstrap_block_len: usize,
    pub n_bootstrap: u32,
    pub random_seed: u64,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            bootstrap_block_len: 5,
            n_bootstrap: 10_000,
            random_seed: 42,
        }
    }
}

/// Full resolved configuration for one run, recorded verbatim into
/// `run_metadata.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub session: SessionConfig,
    pub watchlist: WatchlistConfig,
    pub features: FeaturesConfig,
    pub strategy: StrategyConfig,
    pub risk: RiskConfig,
    pub fills: FillsConfig,
    pub inference: InferenceConfig,
    pub starting_cash: f64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            watchlist: WatchlistConfig::default(),
            features: FeaturesConfig::default(),
            strategy: StrategyConfig::default(),
            risk: RiskConfig::default(),
            fills: FillsConfig::default(),
            inference: InferenceConfig::default(),
            starting_cash: 25_000.0,
        }
    }
}
