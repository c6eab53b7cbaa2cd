//! Portfolio aggregation.
//!
//! A pure reducer from wallet records and query results to a ranked
//! summary. It performs no I/O; the engine fetches results first.

pub mod aggregator;
pub mod types;

pub use aggregator::{diversification_score, summarize};
pub use types::{NetworkSummary, PortfolioSummary, TokenSummary, WalletRecord};
