//! Per-day universe selection: deterministic candidate pre-selection,
//! universe hygiene, and ranking into a capped, ordered watchlist.

pub mod config;
pub mod hygiene;
pub mod selection;

pub use config::WatchlistConfig;
pub use selection::build_watchlist;
