//! Allocation drift.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};

/// Per-asset gap between target and current weight. Positive deviation means
/// underweight (candidate BUY), negative means overweight (candidate SELL).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationDeviation {
    pub symbol: String,
    pub current_weight: Decimal,
    pub target_weight: Decimal,
    pub deviation: Decimal,
}

pub struct AllocationDiffer;

impl AllocationDiffer {
    /// Compute per-symbol deviations between current and target weights.
    /// A symbol present in only one map has weight 0 in the other. Excluded
    /// symbols are omitted. Output is ordered by absolute deviation
    /// descending, ties broken by symbol ascending, so identical inputs
    /// always produce identical orderings.
    pub fn diff(
        current: &HashMap<String, Decimal>,
        target: &HashMap<String, Decimal>,
        excluded: &HashSet<String>,
    ) -> Vec<AllocationDeviation> {
        let symbols: BTreeSet<&String> = current.keys().chain(target.keys()).collect();

        let mut deviations: Vec<AllocationDeviation> = symbols
            .into_iter()
            .filter(|symbol| !excluded.contains(*symbol))
            .map(|symbol| {
                let current_weight = current.get(symbol).copied().unwrap_or(Decimal::ZERO);
                let target_weight = target.get(symbol).copied().unwrap_or(Decimal::ZERO);
                AllocationDeviation {
                    symbol: symbol.clone(),
                    current_weight,
                    target_weight,
                    deviation: target_weight - current_weight,
                }
            })
            .collect();

        deviations.sort_by(|a, b| {
            b.deviation
                .abs()
                .cmp(&a.deviation.abs())
                .then_with(|| a.symbol.cmp(&b.symbol))
        });

        deviations
    }
}
