//! Historical market data access: minute bars, daily bars, grouped-daily
//! snapshots, and ticker reference metadata, fetched through a rate-limited
//! client and a content-addressed disk cache.

pub mod cache;
pub mod client;

pub use cache::HttpCache;
pub use client::PolygonDataClient;
