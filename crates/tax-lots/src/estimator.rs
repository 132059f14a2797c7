//! Tax impact estimation for prospective disposals.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;
use crate::ledger::TaxLotLedger;
use crate::models::{AccountingMethod, LotSelection};
use crate::selector::LotSelector;

/// Result of estimating a prospective sale. Tax impact is signed: negative
/// means a harvestable loss (tax savings) and is preserved as-is, never
/// floored at zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxEstimate {
    pub proceeds: Decimal,
    pub cost_basis: Decimal,
    pub realized_gain_loss: Decimal,
    /// `None` when no capital gains rate is configured; realized gain/loss
    /// is still reported for prioritization.
    pub tax_impact: Option<Decimal>,
    pub selections: Vec<LotSelection>,
}

pub struct TaxImpactEstimator;

impl TaxImpactEstimator {
    /// Estimate realized gain/loss and tax cost of selling `sale_quantity`
    /// of `symbol` at `sale_price_per_unit` under `method`. Read-only
    /// against the ledger.
    pub fn estimate(
        ledger: &TaxLotLedger,
        symbol: &str,
        sale_quantity: Decimal,
        sale_price_per_unit: Decimal,
        method: AccountingMethod,
        capital_gains_rate: Option<Decimal>,
    ) -> Result<TaxEstimate, LedgerError> {
        let selections = LotSelector::select_lots(ledger, symbol, sale_quantity, method)?;

        let proceeds = sale_quantity * sale_price_per_unit;
        let cost_basis: Decimal = selections.iter().map(|s| s.cost_basis()).sum();
        let realized_gain_loss = proceeds - cost_basis;
        let tax_impact = capital_gains_rate.map(|rate| realized_gain_loss * rate);

        Ok(TaxEstimate {
            proceeds,
            cost_basis,
            realized_gain_loss,
            tax_impact,
            selections,
        })
    }
}
