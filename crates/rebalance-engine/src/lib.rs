//! Rebalance Engine
//!
//! Produces bounded, prioritized trade recommendations that move a portfolio
//! toward its target allocation while respecting trade-count limits, minimum
//! trade sizes, exclusions, and the realized tax impact of each disposal
//! under a selectable cost-basis method (see the `tax-lots` crate).

pub mod differ;
pub mod error;
pub mod models;
pub mod planner;
pub mod turnover;
pub mod validate;

pub use differ::{AllocationDeviation, AllocationDiffer};
pub use error::EngineError;
pub use models::{
    RebalanceRecommendation, RebalanceRequest, RebalanceType, RecommendationStatus, TradeAction,
    TradeRecommendation,
};
pub use planner::RebalancePlanner;
pub use turnover::TurnoverCalculator;
pub use validate::{validate_request, ValidationIssue};
