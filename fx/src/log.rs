//! Append-only log of rate mutations.

use std::collections::HashSet;

use async_trait::async_trait;
use fxwallet_common::{Currency, RateLogId, StoreError, Timestamp};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One persisted rate mutation. Never edited once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLogEntry {
    pub id: RateLogId,
    pub from: Currency,
    pub to: Currency,
    pub rate: Decimal,
    pub timestamp: Timestamp,
}

impl RateLogEntry {
    /// Create a new entry stamped now.
    pub fn new(from: Currency, to: Currency, rate: Decimal) -> Self {
        Self {
            id: RateLogId::new(),
            from,
            to,
            rate,
            timestamp: fxwallet_common::now(),
        }
    }
}

/// Persistence backend for the rate log.
#[async_trait]
pub trait RateLog: Send + Sync {
    /// Append one entry.
    async fn append(&self, entry: RateLogEntry) -> Result<(), StoreError>;

    /// The most recently logged rate for `from -> to`, if any.
    async fn latest_rate(
        &self,
        from: &Currency,
        to: &Currency,
    ) -> Result<Option<Decimal>, StoreError>;

    /// All entries, oldest first.
    async fn entries(&self) -> Result<Vec<RateLogEntry>, StoreError>;
}

/// In-process rate log.
#[derive(Default)]
pub struct InMemoryRateLog {
    inner: RwLock<LogEntries>,
}

#[derive(Default)]
struct LogEntries {
    entries: Vec<RateLogEntry>,
    ids: HashSet<RateLogId>,
}

impl InMemoryRateLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of logged entries.
    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().entries.is_empty()
    }
}

#[async_trait]
impl RateLog for InMemoryRateLog {
    async fn append(&self, entry: RateLogEntry) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        if !inner.ids.insert(entry.id) {
            return Err(StoreError::duplicate("rate log entry", entry.id));
        }
        inner.entries.push(entry);
        Ok(())
    }

    async fn latest_rate(
        &self,
        from: &Currency,
        to: &Currency,
    ) -> Result<Option<Decimal>, StoreError> {
        Ok(self
            .inner
            .read()
            .entries
            .iter()
            .rev()
            .find(|e| &e.from == from && &e.to == to)
            .map(|e| e.rate))
    }

    async fn entries(&self) -> Result<Vec<RateLogEntry>, StoreError> {
        Ok(self.inner.read().entries.clone())
    }
}
