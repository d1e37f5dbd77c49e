//! Per-(ticker, day) streaming feature pipeline: EMAs, RTH VWAP, a TTM
//! Squeeze proxy, extension-from-EMA8, and causal level tracking.

pub mod config;
pub mod engine;
pub mod levels;
pub mod math;
pub mod pivots;

pub use config::FeaturesConfig;
pub use engine::FeatureEngine;
