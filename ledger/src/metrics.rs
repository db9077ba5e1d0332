//! Operation counters for the ledger.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Ledger metrics.
#[derive(Debug, Default)]
pub struct LedgerMetrics {
    /// Committed deposits.
    pub deposits: AtomicU64,
    /// Committed swaps.
    pub swaps: AtomicU64,
    /// Committed transfers.
    pub transfers: AtomicU64,
    /// Operations that returned an error.
    pub failed: AtomicU64,
    /// Failures caused by lock acquisition timing out.
    pub lock_timeouts: AtomicU64,
    /// Operations currently executing.
    pub in_flight: AtomicU64,
}

impl LedgerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deposit_committed(&self) {
        self.deposits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn swap_committed(&self) {
        self.swaps.fetch_add(1, Ordering::Relaxed);
    }

    pub fn transfer_committed(&self) {
        self.transfers.fetch_add(1, Ordering::Relaxed);
    }

    pub fn operation_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn lock_timeout(&self) {
        self.lock_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            deposits: self.deposits.load(Ordering::Relaxed),
            swaps: self.swaps.load(Ordering::Relaxed),
            transfers: self.transfers.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            lock_timeouts: self.lock_timeouts.load(Ordering::Relaxed),
            in_flight: self.in_flight.load(Ordering::SeqCst),
        }
    }
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub deposits: u64,
    pub swaps: u64,
    pub transfers: u64,
    pub failed: u64,
    pub lock_timeouts: u64,
    pub in_flight: u64,
}

impl MetricsSnapshot {
    /// Operations that committed.
    pub fn committed(&self) -> u64 {
        self.deposits + self.swaps + self.transfers
    }
}
