//! Request validation at the planner boundary.
//!
//! One explicit validation pass replaces the runtime schema checks of the
//! callers; the internal engine never re-validates. Excluded assets that
//! still carry deviation are not rejected here - the planner reports them as
//! HOLD entries so the constraint violation stays auditable.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::RebalanceRequest;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub field: String,
    pub message: String,
}

impl ValidationIssue {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a rebalance request, collecting every issue rather than stopping
/// at the first.
pub fn validate_request(request: &RebalanceRequest) -> Result<(), Vec<ValidationIssue>> {
    let mut issues = Vec::new();

    for (symbol, weight) in &request.current_allocation {
        if *weight < Decimal::ZERO {
            issues.push(ValidationIssue::new(
                "currentAllocation",
                format!("negative weight {} for {}", weight, symbol),
            ));
        }
    }
    for (symbol, weight) in &request.target_allocation {
        if *weight < Decimal::ZERO {
            issues.push(ValidationIssue::new(
                "targetAllocation",
                format!("negative weight {} for {}", weight, symbol),
            ));
        }
    }

    if request.deviation_threshold < Decimal::ZERO
        || request.deviation_threshold > Decimal::from(100)
    {
        issues.push(ValidationIssue::new(
            "deviationThreshold",
            format!(
                "must be within [0, 100], got {}",
                request.deviation_threshold
            ),
        ));
    }

    if request.max_trades == Some(0) {
        issues.push(ValidationIssue::new("maxTrades", "must be at least 1"));
    }

    if let Some(min_trade_size) = request.min_trade_size {
        if min_trade_size < Decimal::ZERO {
            issues.push(ValidationIssue::new(
                "minTradeSize",
                format!("must not be negative, got {}", min_trade_size),
            ));
        }
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(issues)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RebalanceType;
    use rust_decimal_macros::dec;
    use std::collections::{HashMap, HashSet};

    fn request() -> RebalanceRequest {
        RebalanceRequest {
            portfolio_id: 1,
            target_allocation: HashMap::from([("AAPL".to_string(), dec!(60))]),
            current_allocation: HashMap::from([("AAPL".to_string(), dec!(50))]),
            deviation_threshold: dec!(5),
            rebalance_type: RebalanceType::Full,
            include_tax_impact: true,
            max_trades: None,
            min_trade_size: None,
            excluded_assets: HashSet::new(),
            accounting_method: None,
        }
    }

    #[test]
    fn test_valid_request_passes() {
        assert!(validate_request(&request()).is_ok());
    }

    #[test]
    fn test_negative_weight_rejected() {
        let mut req = request();
        req.current_allocation
            .insert("MSFT".to_string(), dec!(-10));
        let issues = validate_request(&req).unwrap_err();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].field, "currentAllocation");
    }

    #[test]
    fn test_zero_max_trades_rejected() {
        let mut req = request();
        req.max_trades = Some(0);
        let issues = validate_request(&req).unwrap_err();
        assert_eq!(issues[0].field, "maxTrades");
    }

    #[test]
    fn test_out_of_range_threshold_rejected() {
        let mut req = request();
        req.deviation_threshold = dec!(101);
        assert!(validate_request(&req).is_err());
    }

    #[test]
    fn test_all_issues_collected() {
        let mut req = request();
        req.target_allocation.insert("MSFT".to_string(), dec!(-1));
        req.max_trades = Some(0);
        req.min_trade_size = Some(dec!(-5));
        let issues = validate_request(&req).unwrap_err();
        assert_eq!(issues.len(), 3);
    }
}
