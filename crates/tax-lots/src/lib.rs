//! Tax Lots
//!
//! Tax-lot accounting for portfolio disposals: an open-lot ledger per asset,
//! deterministic lot selection under FIFO/LIFO/HIFO/ACB cost-basis methods,
//! and realized gain/loss + tax impact estimation for prospective sales.

pub mod error;
pub mod estimator;
pub mod ledger;
pub mod models;
pub mod selector;

pub use error::LedgerError;
pub use estimator::{TaxEstimate, TaxImpactEstimator};
pub use ledger::TaxLotLedger;
pub use models::{AccountingMethod, LotSelection, Position, TaxLot, TaxSettings};
pub use selector::LotSelector;
