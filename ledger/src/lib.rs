//! FxWallet Ledger
//!
//! Multi-currency wallets with per-wallet locking, an append-only
//! transaction journal, and the engine that applies deposits, swaps and
//! transfers atomically.

pub mod engine;
pub mod error;
pub mod journal;
pub mod lock_manager;
pub mod metrics;
pub mod store;
pub mod wallet;

pub use engine::{
    BalanceSummary, ConversionReceipt, LedgerConfig, TransactionEngine, TransferRequest,
};
pub use error::{LedgerError, LedgerResult};
pub use journal::{InMemoryJournal, Journal, Transaction, TransactionType};
pub use lock_manager::{LockConfig, LockManager, LockedWallets};
pub use metrics::{LedgerMetrics, MetricsSnapshot};
pub use store::{WalletSlot, WalletStore};
pub use wallet::Wallet;
