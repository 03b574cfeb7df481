pub mod opportunity_scorer;
pub mod volatility;

pub use opportunity_scorer::{rank_opportunities, OpportunityScorer};
