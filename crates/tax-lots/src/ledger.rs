//! Open tax-lot ledger.
//!
//! Owns the set of open lots per symbol plus the derived position quantity.
//! Positions are mutated only through acquisition and consumption; the sum of
//! open lot quantities for a symbol always equals its position quantity.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::debug;

use crate::error::LedgerError;
use crate::models::{Position, TaxLot};

#[derive(Debug, Clone, Default)]
pub struct TaxLotLedger {
    /// Open lots per symbol, kept sorted by (acquired_at, lot id).
    lots: HashMap<String, Vec<TaxLot>>,
    positions: HashMap<String, Position>,
    next_lot_id: u64,
}

impl TaxLotLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an acquisition, creating a new open lot and growing the
    /// position. Returns the new lot's id.
    pub fn record_acquisition(
        &mut self,
        symbol: &str,
        quantity: Decimal,
        unit_cost: Decimal,
        acquired_at: DateTime<Utc>,
    ) -> Result<u64, LedgerError> {
        if quantity <= Decimal::ZERO {
            return Err(LedgerError::InvalidQuantity {
                symbol: symbol.to_string(),
                quantity,
                reason: "acquisition quantity must be positive".to_string(),
            });
        }
        if unit_cost < Decimal::ZERO {
            return Err(LedgerError::InvalidQuantity {
                symbol: symbol.to_string(),
                quantity: unit_cost,
                reason: "unit cost must not be negative".to_string(),
            });
        }

        self.next_lot_id += 1;
        let lot_id = self.next_lot_id;

        let lots = self.lots.entry(symbol.to_string()).or_default();
        lots.push(TaxLot {
            id: lot_id,
            symbol: symbol.to_string(),
            quantity,
            unit_cost,
            acquired_at,
        });
        lots.sort_by(|a, b| a.acquired_at.cmp(&b.acquired_at).then(a.id.cmp(&b.id)));

        let position = self
            .positions
            .entry(symbol.to_string())
            .or_insert_with(|| Position {
                symbol: symbol.to_string(),
                quantity: Decimal::ZERO,
                asset_class: None,
                account_id: None,
            });
        position.quantity += quantity;

        debug!(symbol, lot_id, %quantity, %unit_cost, "recorded acquisition");
        Ok(lot_id)
    }

    /// Attach asset class / account metadata to a position.
    pub fn set_position_details(
        &mut self,
        symbol: &str,
        asset_class: Option<String>,
        account_id: Option<String>,
    ) -> Result<(), LedgerError> {
        let position = self
            .positions
            .get_mut(symbol)
            .ok_or_else(|| LedgerError::UnknownSymbol(symbol.to_string()))?;
        position.asset_class = asset_class;
        position.account_id = account_id;
        Ok(())
    }

    /// Open lots for a symbol, ordered by (acquired_at, lot id). Empty slice
    /// for unknown symbols.
    pub fn lots_for(&self, symbol: &str) -> &[TaxLot] {
        self.lots.get(symbol).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Total open quantity across all lots for a symbol.
    pub fn available_quantity(&self, symbol: &str) -> Decimal {
        self.lots_for(symbol)
            .iter()
            .map(|lot| lot.quantity)
            .sum()
    }

    pub fn position(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }

    pub fn positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    /// Consume `quantity` against the given lots, in the given order, and
    /// return the total realized cost basis. Atomic: the full request is
    /// validated against the named lots before any lot is mutated, so a
    /// failed consume leaves the ledger untouched. Fully consumed lots are
    /// removed and never reused.
    pub fn consume(
        &mut self,
        symbol: &str,
        quantity: Decimal,
        lot_ids: &[u64],
    ) -> Result<Decimal, LedgerError> {
        if quantity <= Decimal::ZERO {
            return Err(LedgerError::InvalidQuantity {
                symbol: symbol.to_string(),
                quantity,
                reason: "disposal quantity must be positive".to_string(),
            });
        }

        if !self.lots.contains_key(symbol) {
            return Err(LedgerError::UnknownSymbol(symbol.to_string()));
        }

        let available = self.available_quantity(symbol);
        if available < quantity {
            return Err(LedgerError::InsufficientLots {
                symbol: symbol.to_string(),
                requested: quantity,
                available,
            });
        }

        // Phase 1: plan the takes without mutating anything.
        let lots = self.lots.get(symbol).expect("checked above");
        let mut remaining = quantity;
        let mut takes: Vec<(u64, Decimal)> = Vec::new();
        let mut cost_basis = Decimal::ZERO;
        for &lot_id in lot_ids {
            if remaining == Decimal::ZERO {
                break;
            }
            if takes.iter().any(|(id, _)| *id == lot_id) {
                return Err(LedgerError::InvalidQuantity {
                    symbol: symbol.to_string(),
                    quantity,
                    reason: format!("lot {} listed more than once", lot_id),
                });
            }
            let lot = lots
                .iter()
                .find(|l| l.id == lot_id)
                .ok_or(LedgerError::LotNotFound {
                    symbol: symbol.to_string(),
                    lot_id,
                })?;
            let take = lot.quantity.min(remaining);
            cost_basis += take * lot.unit_cost;
            takes.push((lot_id, take));
            remaining -= take;
        }
        if remaining > Decimal::ZERO {
            let covered = quantity - remaining;
            return Err(LedgerError::InsufficientLots {
                symbol: symbol.to_string(),
                requested: quantity,
                available: covered,
            });
        }

        // Phase 2: apply.
        let lots = self.lots.get_mut(symbol).expect("checked above");
        for (lot_id, take) in &takes {
            let lot = lots
                .iter_mut()
                .find(|l| l.id == *lot_id)
                .expect("planned against open lot");
            lot.quantity -= *take;
        }
        lots.retain(|l| l.quantity > Decimal::ZERO);

        let position = self
            .positions
            .get_mut(symbol)
            .expect("position exists for open lots");
        position.quantity -= quantity;

        debug!(symbol, %quantity, %cost_basis, "consumed lots");
        Ok(cost_basis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn ts(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, day, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_acquisition_grows_position_and_lots() {
        let mut ledger = TaxLotLedger::new();
        ledger
            .record_acquisition("AAPL", dec!(10), dec!(150), ts(1))
            .unwrap();
        ledger
            .record_acquisition("AAPL", dec!(5), dec!(170), ts(2))
            .unwrap();

        assert_eq!(ledger.available_quantity("AAPL"), dec!(15));
        assert_eq!(ledger.position("AAPL").unwrap().quantity, dec!(15));
        assert_eq!(ledger.lots_for("AAPL").len(), 2);
    }

    #[test]
    fn test_lots_ordered_by_acquired_then_id() {
        let mut ledger = TaxLotLedger::new();
        let late = ledger
            .record_acquisition("AAPL", dec!(1), dec!(20), ts(5))
            .unwrap();
        let early = ledger
            .record_acquisition("AAPL", dec!(1), dec!(10), ts(1))
            .unwrap();
        // Same timestamp as `early`: id breaks the tie.
        let early_again = ledger
            .record_acquisition("AAPL", dec!(1), dec!(15), ts(1))
            .unwrap();

        let ids: Vec<u64> = ledger.lots_for("AAPL").iter().map(|l| l.id).collect();
        assert_eq!(ids, vec![early, early_again, late]);
    }

    #[test]
    fn test_consume_returns_cost_basis_and_removes_spent_lots() {
        let mut ledger = TaxLotLedger::new();
        let lot1 = ledger
            .record_acquisition("AAPL", dec!(10), dec!(100), ts(1))
            .unwrap();
        let lot2 = ledger
            .record_acquisition("AAPL", dec!(10), dec!(120), ts(2))
            .unwrap();

        let basis = ledger.consume("AAPL", dec!(15), &[lot1, lot2]).unwrap();
        // 10 @ 100 + 5 @ 120
        assert_eq!(basis, dec!(1600));
        assert_eq!(ledger.available_quantity("AAPL"), dec!(5));
        assert_eq!(ledger.position("AAPL").unwrap().quantity, dec!(5));
        // lot1 fully consumed and gone; lot2 partially remains
        assert_eq!(ledger.lots_for("AAPL").len(), 1);
        assert_eq!(ledger.lots_for("AAPL")[0].id, lot2);
        assert_eq!(ledger.lots_for("AAPL")[0].quantity, dec!(5));
    }

    #[test]
    fn test_consume_insufficient_leaves_ledger_unchanged() {
        let mut ledger = TaxLotLedger::new();
        let lot = ledger
            .record_acquisition("AAPL", dec!(10), dec!(100), ts(1))
            .unwrap();
        let before = ledger.clone();

        let err = ledger.consume("AAPL", dec!(11), &[lot]).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InsufficientLots { requested, available, .. }
                if requested == dec!(11) && available == dec!(10)
        ));
        assert_eq!(ledger.lots_for("AAPL"), before.lots_for("AAPL"));
        assert_eq!(ledger.position("AAPL"), before.position("AAPL"));
    }

    #[test]
    fn test_consume_with_stale_lot_id_fails_atomically() {
        let mut ledger = TaxLotLedger::new();
        let lot = ledger
            .record_acquisition("AAPL", dec!(10), dec!(100), ts(1))
            .unwrap();

        let err = ledger.consume("AAPL", dec!(5), &[lot + 99]).unwrap_err();
        assert!(matches!(err, LedgerError::LotNotFound { lot_id, .. } if lot_id == lot + 99));
        assert_eq!(ledger.available_quantity("AAPL"), dec!(10));
    }

    #[test]
    fn test_position_details() {
        let mut ledger = TaxLotLedger::new();
        ledger
            .record_acquisition("AAPL", dec!(10), dec!(150), ts(1))
            .unwrap();
        ledger
            .set_position_details("AAPL", Some("equity".to_string()), Some("acct-1".to_string()))
            .unwrap();

        let position = ledger.position("AAPL").unwrap();
        assert_eq!(position.asset_class.as_deref(), Some("equity"));
        assert_eq!(position.account_id.as_deref(), Some("acct-1"));

        assert!(matches!(
            ledger.set_position_details("ZZZ", None, None),
            Err(LedgerError::UnknownSymbol(_))
        ));
    }

    #[test]
    fn test_consume_unknown_symbol() {
        let mut ledger = TaxLotLedger::new();
        let err = ledger.consume("ZZZ", dec!(1), &[1]).unwrap_err();
        assert!(matches!(err, LedgerError::UnknownSymbol(s) if s == "ZZZ"));
    }
}
