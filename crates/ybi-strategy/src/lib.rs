//! Entry setup evaluation (A-E), macro/micro filters, and exit rules for
//! the per-ticker, per-day trading state machine.

pub mod config;
pub mod engine;
pub mod exits;
pub mod filters;

pub use config::StrategyConfig;
pub use engine::{TickerState, TickerStrategy};
