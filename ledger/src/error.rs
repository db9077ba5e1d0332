//! Ledger error types.

use fxwallet_common::{Classify, Currency, ErrorKind, OwnerId, StoreError, WalletId};
use fxwallet_fx::FxError;
use rust_decimal::Decimal;
use thiserror::Error;

/// Errors returned by ledger operations. An operation that returns an error
/// has left no balance change and no journal entry behind.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Amount must be strictly positive.
    #[error("invalid amount: {0}")]
    InvalidAmount(Decimal),

    /// The wallet does not hold this currency.
    #[error("unsupported currency {currency} for wallet {wallet_id}")]
    UnsupportedCurrency {
        wallet_id: WalletId,
        currency: Currency,
    },

    /// Owner identifier failed basic validation.
    #[error("invalid owner id: {0}")]
    InvalidOwner(String),

    /// The result would not fit in a `Decimal`.
    #[error("amount overflow in {currency}")]
    AmountOverflow { currency: Currency },

    /// Sender and receiver are the same wallet.
    #[error("cannot transfer from wallet {0} to itself")]
    SelfTransfer(WalletId),

    /// Rate lookup failed.
    #[error(transparent)]
    Fx(#[from] FxError),

    #[error("wallet not found: {0}")]
    WalletNotFound(WalletId),

    #[error("no wallet for owner: {0}")]
    OwnerNotFound(OwnerId),

    /// Debit would take the balance below zero.
    #[error("insufficient {currency} balance in wallet {wallet_id}: required {required}, available {available}")]
    InsufficientBalance {
        wallet_id: WalletId,
        currency: Currency,
        required: Decimal,
        available: Decimal,
    },

    /// The owner already has a wallet.
    #[error("wallet already exists for owner {0}")]
    WalletAlreadyExists(OwnerId),

    /// The journal entry could not be written; the operation was rolled back.
    #[error("journal write failed: {0}")]
    Journal(StoreError),

    /// Wallet record storage failed.
    #[error("wallet storage failed: {0}")]
    Store(StoreError),

    /// A wallet lock was not acquired in time.
    #[error("timed out after {timeout_ms}ms waiting for wallet {wallet_id}")]
    LockTimeout { wallet_id: WalletId, timeout_ms: u64 },

    /// The ledger is draining and refuses new operations.
    #[error("ledger is shutting down")]
    ShuttingDown,
}

impl Classify for LedgerError {
    fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::InvalidAmount(_)
            | LedgerError::UnsupportedCurrency { .. }
            | LedgerError::InvalidOwner(_)
            | LedgerError::AmountOverflow { .. }
            | LedgerError::SelfTransfer(_) => ErrorKind::Validation,
            LedgerError::Fx(e) => e.kind(),
            LedgerError::WalletNotFound(_) | LedgerError::OwnerNotFound(_) => ErrorKind::NotFound,
            LedgerError::InsufficientBalance { .. } | LedgerError::WalletAlreadyExists(_) => {
                ErrorKind::Conflict
            }
            LedgerError::Journal(_) => ErrorKind::Persistence,
            LedgerError::Store(e) => e.kind(),
            LedgerError::LockTimeout { .. } => ErrorKind::ConcurrencyTimeout,
            LedgerError::ShuttingDown => ErrorKind::Unavailable,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            LedgerError::InvalidAmount(_) => "INVALID_AMOUNT",
            LedgerError::UnsupportedCurrency { .. } => "UNSUPPORTED_CURRENCY",
            LedgerError::InvalidOwner(_) => "INVALID_OWNER",
            LedgerError::AmountOverflow { .. } => "AMOUNT_OVERFLOW",
            LedgerError::SelfTransfer(_) => "SELF_TRANSFER",
            LedgerError::Fx(e) => e.error_code(),
            LedgerError::WalletNotFound(_) => "WALLET_NOT_FOUND",
            LedgerError::OwnerNotFound(_) => "OWNER_NOT_FOUND",
            LedgerError::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            LedgerError::WalletAlreadyExists(_) => "WALLET_ALREADY_EXISTS",
            LedgerError::Journal(_) => "JOURNAL_WRITE_FAILED",
            LedgerError::Store(e) => e.error_code(),
            LedgerError::LockTimeout { .. } => "LOCK_TIMEOUT",
            LedgerError::ShuttingDown => "SHUTTING_DOWN",
        }
    }
}

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(
            LedgerError::InvalidAmount(Decimal::ZERO).kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            LedgerError::WalletNotFound(WalletId::new()).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            LedgerError::Fx(FxError::UnsupportedPair {
                from: Currency::usdx(),
                to: Currency::new("GBPx"),
            })
            .kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            LedgerError::Journal(StoreError::WriteFailed("x".into())).kind(),
            ErrorKind::Persistence
        );
        assert_eq!(
            LedgerError::AmountOverflow {
                currency: Currency::usdx()
            }
            .kind(),
            ErrorKind::Validation
        );
        assert!(LedgerError::LockTimeout {
            wallet_id: WalletId::new(),
            timeout_ms: 10
        }
        .kind()
        .is_retryable());
    }

    #[test]
    fn test_report_carries_code_and_message() {
        let report = LedgerError::InsufficientBalance {
            wallet_id: WalletId::new(),
            currency: Currency::usdx(),
            required: Decimal::from(10),
            available: Decimal::from(5),
        }
        .report();
        assert_eq!(report.kind, ErrorKind::Conflict);
        assert_eq!(report.code, "INSUFFICIENT_BALANCE");
        assert!(report.message.contains("required 10, available 5"));
    }
}
