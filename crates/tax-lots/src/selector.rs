//! Lot selection.
//!
//! Given a disposal quantity and an accounting method, decides which open
//! lots are consumed and in what order. Selection is deterministic for a
//! given ledger state and method: every ordering breaks ties by lot id
//! ascending.

use rust_decimal::Decimal;

use crate::error::LedgerError;
use crate::ledger::TaxLotLedger;
use crate::models::{AccountingMethod, LotSelection, TaxLot};

pub struct LotSelector;

impl LotSelector {
    /// Select lots covering exactly `quantity` of `symbol` under `method`.
    /// Read-only: the ledger is not mutated; consumption happens separately
    /// through [`TaxLotLedger::consume`].
    pub fn select_lots(
        ledger: &TaxLotLedger,
        symbol: &str,
        quantity: Decimal,
        method: AccountingMethod,
    ) -> Result<Vec<LotSelection>, LedgerError> {
        if quantity <= Decimal::ZERO {
            return Err(LedgerError::InvalidQuantity {
                symbol: symbol.to_string(),
                quantity,
                reason: "disposal quantity must be positive".to_string(),
            });
        }

        let available = ledger.available_quantity(symbol);
        if available < quantity {
            return Err(LedgerError::InsufficientLots {
                symbol: symbol.to_string(),
                requested: quantity,
                available,
            });
        }

        let mut lots: Vec<&TaxLot> = ledger.lots_for(symbol).iter().collect();

        let booked_cost = match method {
            AccountingMethod::Fifo => {
                lots.sort_by(|a, b| a.acquired_at.cmp(&b.acquired_at).then(a.id.cmp(&b.id)));
                None
            }
            AccountingMethod::Lifo => {
                lots.sort_by(|a, b| b.acquired_at.cmp(&a.acquired_at).then(a.id.cmp(&b.id)));
                None
            }
            AccountingMethod::Hifo => {
                lots.sort_by(|a, b| b.unit_cost.cmp(&a.unit_cost).then(a.id.cmp(&b.id)));
                None
            }
            AccountingMethod::AverageCost => {
                // All lots pooled at a quantity-weighted average cost. The
                // pool has no inherent order, so quantities are drawn oldest
                // first for lot bookkeeping, each unit booked at the average.
                // Disposals leave the average unchanged.
                lots.sort_by(|a, b| a.acquired_at.cmp(&b.acquired_at).then(a.id.cmp(&b.id)));
                let total_cost: Decimal = lots.iter().map(|l| l.cost_basis()).sum();
                Some(total_cost / available)
            }
        };

        let mut remaining = quantity;
        let mut selections = Vec::new();
        for lot in lots {
            if remaining == Decimal::ZERO {
                break;
            }
            let take = lot.quantity.min(remaining);
            selections.push(LotSelection {
                lot_id: lot.id,
                quantity: take,
                unit_cost: booked_cost.unwrap_or(lot.unit_cost),
                acquired_at: lot.acquired_at,
            });
            remaining -= take;
        }

        Ok(selections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn ts(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, day, 0, 0, 0).unwrap()
    }

    fn two_lot_ledger() -> (TaxLotLedger, u64, u64) {
        // (q=1, cost=10, t=1) and (q=1, cost=20, t=2)
        let mut ledger = TaxLotLedger::new();
        let old = ledger
            .record_acquisition("AAPL", dec!(1), dec!(10), ts(1))
            .unwrap();
        let new = ledger
            .record_acquisition("AAPL", dec!(1), dec!(20), ts(2))
            .unwrap();
        (ledger, old, new)
    }

    #[test]
    fn test_fifo_takes_oldest_lot() {
        let (ledger, old, _) = two_lot_ledger();
        let sel =
            LotSelector::select_lots(&ledger, "AAPL", dec!(1), AccountingMethod::Fifo).unwrap();
        assert_eq!(sel.len(), 1);
        assert_eq!(sel[0].lot_id, old);
        assert_eq!(sel[0].unit_cost, dec!(10));
    }

    #[test]
    fn test_lifo_takes_newest_lot() {
        let (ledger, _, new) = two_lot_ledger();
        let sel =
            LotSelector::select_lots(&ledger, "AAPL", dec!(1), AccountingMethod::Lifo).unwrap();
        assert_eq!(sel[0].lot_id, new);
        assert_eq!(sel[0].unit_cost, dec!(20));
    }

    #[test]
    fn test_hifo_takes_highest_cost_lot() {
        let (ledger, _, new) = two_lot_ledger();
        let sel =
            LotSelector::select_lots(&ledger, "AAPL", dec!(1), AccountingMethod::Hifo).unwrap();
        assert_eq!(sel[0].lot_id, new);
        assert_eq!(sel[0].unit_cost, dec!(20));
    }

    #[test]
    fn test_acb_books_pooled_average_cost() {
        let (ledger, old, _) = two_lot_ledger();
        let sel = LotSelector::select_lots(&ledger, "AAPL", dec!(1), AccountingMethod::AverageCost)
            .unwrap();
        // Pool: 2 units, total cost 30 -> average 15. Drawn oldest first.
        assert_eq!(sel[0].lot_id, old);
        assert_eq!(sel[0].unit_cost, dec!(15));
    }

    #[test]
    fn test_selection_spans_multiple_lots() {
        let (ledger, old, new) = two_lot_ledger();
        let sel =
            LotSelector::select_lots(&ledger, "AAPL", dec!(1.5), AccountingMethod::Fifo).unwrap();
        assert_eq!(sel.len(), 2);
        assert_eq!(sel[0].lot_id, old);
        assert_eq!(sel[0].quantity, dec!(1));
        assert_eq!(sel[1].lot_id, new);
        assert_eq!(sel[1].quantity, dec!(0.5));
    }

    #[test]
    fn test_same_timestamp_ties_break_by_lot_id() {
        let mut ledger = TaxLotLedger::new();
        let first = ledger
            .record_acquisition("AAPL", dec!(1), dec!(10), ts(1))
            .unwrap();
        let second = ledger
            .record_acquisition("AAPL", dec!(1), dec!(10), ts(1))
            .unwrap();

        let fifo =
            LotSelector::select_lots(&ledger, "AAPL", dec!(1), AccountingMethod::Fifo).unwrap();
        assert_eq!(fifo[0].lot_id, first);

        // Same unit cost under HIFO: id ascending as well.
        let hifo =
            LotSelector::select_lots(&ledger, "AAPL", dec!(1), AccountingMethod::Hifo).unwrap();
        assert_eq!(hifo[0].lot_id, first);
        let _ = second;
    }

    #[test]
    fn test_insufficient_quantity_fails() {
        let (ledger, _, _) = two_lot_ledger();
        let err =
            LotSelector::select_lots(&ledger, "AAPL", dec!(3), AccountingMethod::Fifo).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InsufficientLots { requested, available, .. }
                if requested == dec!(3) && available == dec!(2)
        ));
    }

    #[test]
    fn test_unknown_symbol_reports_zero_available() {
        let ledger = TaxLotLedger::new();
        let err =
            LotSelector::select_lots(&ledger, "ZZZ", dec!(1), AccountingMethod::Fifo).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InsufficientLots { available, .. } if available == Decimal::ZERO
        ));
    }
}
