use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Cost-basis accounting method used when selecting lots for a disposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountingMethod {
    /// First in, first out - oldest lots consumed first.
    #[serde(rename = "FIFO")]
    Fifo,
    /// Last in, first out - newest lots consumed first.
    #[serde(rename = "LIFO")]
    Lifo,
    /// Highest cost basis first - minimizes realized gain.
    #[serde(rename = "HIFO")]
    Hifo,
    /// Average cost basis - all lots pooled at a quantity-weighted average cost.
    #[serde(rename = "ACB")]
    AverageCost,
}

impl Default for AccountingMethod {
    fn default() -> Self {
        Self::Fifo
    }
}

impl std::fmt::Display for AccountingMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccountingMethod::Fifo => write!(f, "FIFO"),
            AccountingMethod::Lifo => write!(f, "LIFO"),
            AccountingMethod::Hifo => write!(f, "HIFO"),
            AccountingMethod::AverageCost => write!(f, "ACB"),
        }
    }
}

/// An open tax lot: one discrete acquisition of an asset, tracked separately
/// for capital-gains accounting. Immutable until consumed; a fully consumed
/// lot is removed from the ledger and never reused.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxLot {
    pub id: u64,
    pub symbol: String,
    /// Quantity remaining in the lot. Invariant: never negative.
    pub quantity: Decimal,
    pub unit_cost: Decimal,
    pub acquired_at: DateTime<Utc>,
}

impl TaxLot {
    pub fn cost_basis(&self) -> Decimal {
        self.quantity * self.unit_cost
    }
}

/// A holding in the ledger. Quantity is derived from open lots and mutated
/// only by acquisition/disposal, never edited directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub quantity: Decimal,
    pub asset_class: Option<String>,
    pub account_id: Option<String>,
}

/// One slice of a disposal: a lot and the quantity taken from it, at the
/// unit cost the disposal is booked against (the lot's own cost, or the
/// pooled average under ACB).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LotSelection {
    pub lot_id: u64,
    pub quantity: Decimal,
    pub unit_cost: Decimal,
    pub acquired_at: DateTime<Utc>,
}

impl LotSelection {
    pub fn cost_basis(&self) -> Decimal {
        self.quantity * self.unit_cost
    }
}

/// Tax accounting settings supplied by the external settings collaborator,
/// read once at the start of planning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxSettings {
    /// Default lot-selection method when a request does not override it.
    pub accounting_method: AccountingMethod,
    /// Applicable capital gains rate as a fraction (e.g. 0.20). When unset,
    /// tax impact is reported as null but realized gain/loss is still
    /// computed for prioritization.
    pub capital_gains_rate: Option<Decimal>,
}

impl Default for TaxSettings {
    fn default() -> Self {
        Self {
            accounting_method: AccountingMethod::Fifo,
            capital_gains_rate: None,
        }
    }
}
