//! Portfolio turnover.

use rust_decimal::Decimal;
use tracing::warn;

use crate::models::{TradeAction, TradeRecommendation};

pub struct TurnoverCalculator;

impl TurnoverCalculator {
    /// Fraction of total portfolio value implicated in trading: sum of
    /// absolute trade values over BUY/SELL recommendations divided by total
    /// value. A zero-value portfolio trivially has zero turnover, reported
    /// as 0 rather than an error.
    pub fn turnover(trades: &[TradeRecommendation], total_value: Decimal) -> Decimal {
        if total_value <= Decimal::ZERO {
            warn!(%total_value, "turnover requested for zero-value portfolio, reporting 0");
            return Decimal::ZERO;
        }

        let traded: Decimal = trades
            .iter()
            .filter(|t| t.action != TradeAction::Hold)
            .map(|t| t.estimated_value.abs())
            .sum();

        traded / total_value
    }
}
