//! FX error types.

use fxwallet_common::{Classify, Currency, ErrorKind, StoreError};
use rust_decimal::Decimal;
use thiserror::Error;

/// Errors that can occur in the rate store and broadcaster.
#[derive(Debug, Error)]
pub enum FxError {
    /// No rates are quoted from this currency.
    #[error("unsupported currency: {0}")]
    UnsupportedCurrency(Currency),

    /// The base currency is known but the quote currency is not.
    #[error("unsupported currency pair: {from}/{to}")]
    UnsupportedPair { from: Currency, to: Currency },

    /// Rates must be positive and never quoted from a currency to itself.
    #[error("invalid rate {rate} for {from}/{to}")]
    InvalidRate {
        from: Currency,
        to: Currency,
        rate: Decimal,
    },

    /// A rate log entry could not be persisted.
    #[error("rate log write failed: {0}")]
    RateLogWrite(#[from] StoreError),

    /// The broadcaster has been shut down.
    #[error("rate broadcaster is shut down")]
    BroadcasterClosed,
}

impl Classify for FxError {
    fn kind(&self) -> ErrorKind {
        match self {
            FxError::UnsupportedCurrency(_)
            | FxError::UnsupportedPair { .. }
            | FxError::InvalidRate { .. } => ErrorKind::Validation,
            FxError::RateLogWrite(_) => ErrorKind::Persistence,
            FxError::BroadcasterClosed => ErrorKind::Unavailable,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            FxError::UnsupportedCurrency(_) => "UNSUPPORTED_CURRENCY",
            FxError::UnsupportedPair { .. } => "UNSUPPORTED_PAIR",
            FxError::InvalidRate { .. } => "INVALID_RATE",
            FxError::RateLogWrite(_) => "RATE_LOG_WRITE_FAILED",
            FxError::BroadcasterClosed => "BROADCASTER_CLOSED",
        }
    }
}

/// Result type for FX operations.
pub type FxResult<T> = Result<T, FxError>;
