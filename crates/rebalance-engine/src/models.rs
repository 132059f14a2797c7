use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tax_lots::AccountingMethod;

/// How aggressively a rebalance pursues the target allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RebalanceType {
    /// Every non-excluded asset with nonzero deviation trades.
    Full,
    /// Only deviations beyond the threshold trade; the rest are HOLDs.
    Threshold,
    /// Threshold candidates, prioritized by lowest realized tax cost.
    TaxEfficient,
}

impl std::fmt::Display for RebalanceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RebalanceType::Full => write!(f, "FULL"),
            RebalanceType::Threshold => write!(f, "THRESHOLD"),
            RebalanceType::TaxEfficient => write!(f, "TAX_EFFICIENT"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeAction {
    Buy,
    Sell,
    Hold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

/// Rebalance request wire contract (`RebalanceRecommendationInput`).
/// Weights are percent-style and treated as relative; they need not sum to
/// exactly 100.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RebalanceRequest {
    pub portfolio_id: i64,
    /// symbol -> target weight
    pub target_allocation: HashMap<String, Decimal>,
    /// symbol -> current weight
    pub current_allocation: HashMap<String, Decimal>,
    /// Percent, in [0, 100].
    #[serde(default = "default_deviation_threshold")]
    pub deviation_threshold: Decimal,
    pub rebalance_type: RebalanceType,
    #[serde(default = "default_include_tax_impact")]
    pub include_tax_impact: bool,
    /// Cap on the number of non-HOLD trades.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_trades: Option<usize>,
    /// Floor on trade value, in currency units.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_trade_size: Option<Decimal>,
    /// Symbols never traded.
    #[serde(default)]
    pub excluded_assets: HashSet<String>,
    /// Overrides the default accounting method from tax settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accounting_method: Option<AccountingMethod>,
}

fn default_deviation_threshold() -> Decimal {
    Decimal::from(5)
}

fn default_include_tax_impact() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeRecommendation {
    pub symbol: String,
    pub action: TradeAction,
    /// Currency value to trade; 0 for HOLD.
    pub amount: Decimal,
    pub current_weight: Decimal,
    pub target_weight: Decimal,
    pub estimated_value: Decimal,
    /// Realized gain/loss x applicable rate; null when tax impact is not
    /// requested or the action is BUY/HOLD. Negative = harvestable loss.
    pub tax_impact: Option<Decimal>,
    /// 1-based rank in final execution order.
    pub priority: u32,
    /// Why a candidate was demoted to HOLD, when it was.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Rebalance response wire contract (`RebalanceRecommendationResponse`).
/// Echoes the request's constraint fields and carries the computed trade
/// list. Lifecycle: pending -> processing -> completed | failed; the
/// recommendation list is only attached on a fully successful computation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RebalanceRecommendation {
    pub id: i64,
    pub user_id: i64,
    pub portfolio_id: i64,
    pub target_allocation: HashMap<String, Decimal>,
    pub current_allocation: HashMap<String, Decimal>,
    pub deviation_threshold: Decimal,
    pub rebalance_type: RebalanceType,
    pub include_tax_impact: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_trades: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_trade_size: Option<Decimal>,
    pub excluded_assets: HashSet<String>,
    pub status: RecommendationStatus,
    pub recommendations: Option<Vec<TradeRecommendation>>,
    pub total_value: Decimal,
    /// Sum of non-null tax impacts across SELLs.
    pub estimated_tax_impact: Option<Decimal>,
    pub estimated_turnover: Decimal,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}
