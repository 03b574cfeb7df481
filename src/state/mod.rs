pub mod health_board;
pub mod price_history;

pub use health_board::HealthBoard;
pub use price_history::PriceHistory;
