pub mod anomaly;
pub mod classifier;
pub mod limits;
pub mod monitor;

pub use anomaly::AnomalyScanner;
pub use classifier::MarketStateClassifier;
pub use limits::adjust_limits;
pub use monitor::MarketMonitor;
