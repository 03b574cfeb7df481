pub mod commission;
pub mod decision;
pub mod filters;

pub use commission::CommissionTable;
pub use decision::ArbitrageDecisionPolicy;
pub use filters::ItemFilter;
