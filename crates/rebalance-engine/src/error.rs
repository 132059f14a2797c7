use thiserror::Error;

use crate::validate::ValidationIssue;
use tax_lots::LedgerError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// Malformed or contradictory input, rejected before any recommendation
    /// record is created.
    #[error("invalid request: {}", format_issues(.0))]
    InvalidRequest(Vec<ValidationIssue>),

    /// The portfolio already has a recommendation in `processing`.
    #[error("portfolio {portfolio_id} already has a rebalance in progress")]
    Conflict { portfolio_id: i64 },

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("computation error: {0}")]
    Computation(String),
}

fn format_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
