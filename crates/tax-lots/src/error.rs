use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LedgerError {
    #[error("insufficient lots for {symbol}: requested {requested}, available {available}")]
    InsufficientLots {
        symbol: String,
        requested: Decimal,
        available: Decimal,
    },

    #[error("unknown symbol: {0}")]
    UnknownSymbol(String),

    #[error("invalid quantity {quantity} for {symbol}: {reason}")]
    InvalidQuantity {
        symbol: String,
        quantity: Decimal,
        reason: String,
    },

    #[error("lot {lot_id} not found for {symbol}")]
    LotNotFound { symbol: String, lot_id: u64 },
}
