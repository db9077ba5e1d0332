//! Append-only transaction journal.

use std::collections::HashSet;
use std::fmt;

use async_trait::async_trait;
use fxwallet_common::{Currency, StoreError, Timestamp, TransactionId, WalletId};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Kind of balance-mutating operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Deposit,
    Swap,
    Transfer,
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransactionType::Deposit => "deposit",
            TransactionType::Swap => "swap",
            TransactionType::Transfer => "transfer",
        };
        f.write_str(name)
    }
}

/// One journal entry. Written once per committed operation, never edited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    /// Wallet the entry is recorded against (the sender for transfers).
    pub wallet_id: WalletId,
    #[serde(rename = "type")]
    pub tx_type: TransactionType,
    pub from_currency: Option<Currency>,
    pub to_currency: Option<Currency>,
    pub amount: Option<Decimal>,
    pub converted_amount: Option<Decimal>,
    pub rate: Option<Decimal>,
    /// Receiving wallet of a transfer.
    pub counterparty_id: Option<WalletId>,
    pub timestamp: Timestamp,
}

impl Transaction {
    pub fn deposit(wallet_id: WalletId, currency: Currency, amount: Decimal) -> Self {
        Self {
            id: TransactionId::new(),
            wallet_id,
            tx_type: TransactionType::Deposit,
            from_currency: None,
            to_currency: Some(currency),
            amount: Some(amount),
            converted_amount: None,
            rate: None,
            counterparty_id: None,
            timestamp: fxwallet_common::now(),
        }
    }

    pub fn swap(
        wallet_id: WalletId,
        from: Currency,
        to: Currency,
        amount: Decimal,
        converted_amount: Decimal,
        rate: Decimal,
    ) -> Self {
        Self {
            id: TransactionId::new(),
            wallet_id,
            tx_type: TransactionType::Swap,
            from_currency: Some(from),
            to_currency: Some(to),
            amount: Some(amount),
            converted_amount: Some(converted_amount),
            rate: Some(rate),
            counterparty_id: None,
            timestamp: fxwallet_common::now(),
        }
    }

    pub fn transfer(
        sender: WalletId,
        receiver: WalletId,
        from: Currency,
        to: Currency,
        amount: Decimal,
        converted_amount: Decimal,
        rate: Decimal,
    ) -> Self {
        Self {
            id: TransactionId::new(),
            wallet_id: sender,
            tx_type: TransactionType::Transfer,
            from_currency: Some(from),
            to_currency: Some(to),
            amount: Some(amount),
            converted_amount: Some(converted_amount),
            rate: Some(rate),
            counterparty_id: Some(receiver),
            timestamp: fxwallet_common::now(),
        }
    }
}

/// Persistence backend for the journal.
#[async_trait]
pub trait Journal: Send + Sync {
    /// Append one entry. A failure here aborts the operation being committed.
    async fn append(&self, entry: Transaction) -> Result<(), StoreError>;

    /// Entries recorded against `wallet_id`, newest first.
    async fn history(&self, wallet_id: &WalletId) -> Result<Vec<Transaction>, StoreError>;

    /// Total number of entries.
    async fn len(&self) -> Result<usize, StoreError>;
}

/// In-process journal.
#[derive(Default)]
pub struct InMemoryJournal {
    inner: RwLock<JournalEntries>,
}

#[derive(Default)]
struct JournalEntries {
    entries: Vec<Transaction>,
    ids: HashSet<TransactionId>,
}

impl InMemoryJournal {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Journal for InMemoryJournal {
    async fn append(&self, entry: Transaction) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        if !inner.ids.insert(entry.id) {
            return Err(StoreError::duplicate("transaction", entry.id));
        }
        inner.entries.push(entry);
        Ok(())
    }

    async fn history(&self, wallet_id: &WalletId) -> Result<Vec<Transaction>, StoreError> {
        // Append order is commit order, so reversing it gives newest first.
        Ok(self
            .inner
            .read()
            .entries
            .iter()
            .rev()
            .filter(|e| &e.wallet_id == wallet_id)
            .cloned()
            .collect())
    }

    async fn len(&self) -> Result<usize, StoreError> {
        Ok(self.inner.read().entries.len())
    }
}
