//! Market-state detection, opportunity scoring and buy/hold/skip decisions
//! for in-game item arbitrage.

pub mod api;
pub mod config;
pub mod detector;
pub mod error;
pub mod fetcher;
pub mod pipeline;
pub mod policy;
pub mod scorer;
pub mod state;
pub mod types;
