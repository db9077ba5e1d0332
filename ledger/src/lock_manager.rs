//! Ordered acquisition of wallet locks.
//!
//! Every operation locks all the wallets it touches up front, in ascending
//! wallet-id order, under one deadline. Two transfers over the same pair of
//! wallets therefore always contend on the same first lock and can never
//! deadlock. Giving up at the deadline drops the guards already taken, so an
//! abandoned wait leaves nothing behind.

use std::time::Duration;

use fxwallet_common::{constants, WalletId};
use tokio::sync::OwnedMutexGuard;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::{LedgerError, LedgerResult};
use crate::store::WalletStore;
use crate::wallet::Wallet;

/// Wallets held exclusively for the duration of one operation.
pub struct LockedWallets {
    guards: Vec<(WalletId, OwnedMutexGuard<Wallet>)>,
}

impl LockedWallets {
    pub fn get(&self, id: &WalletId) -> LedgerResult<&Wallet> {
        self.guards
            .iter()
            .find(|(held, _)| held == id)
            .map(|(_, guard)| &**guard)
            .ok_or(LedgerError::WalletNotFound(*id))
    }

    pub fn get_mut(&mut self, id: &WalletId) -> LedgerResult<&mut Wallet> {
        self.guards
            .iter_mut()
            .find(|(held, _)| held == id)
            .map(|(_, guard)| &mut **guard)
            .ok_or(LedgerError::WalletNotFound(*id))
    }

    /// Ids in the order they were locked.
    pub fn ids(&self) -> Vec<WalletId> {
        self.guards.iter().map(|(id, _)| *id).collect()
    }
}

/// Lock manager configuration.
#[derive(Debug, Clone)]
pub struct LockConfig {
    /// Bound on waiting for all of an operation's locks.
    pub acquisition_timeout: Duration,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            acquisition_timeout: constants::DEFAULT_LOCK_TIMEOUT,
        }
    }
}

/// Acquires wallet locks in a fixed global order.
pub struct LockManager {
    config: LockConfig,
}

impl LockManager {
    pub fn new(config: LockConfig) -> Self {
        Self { config }
    }

    /// Lock every wallet in `ids` (duplicates ignored) in ascending order.
    pub async fn acquire(
        &self,
        store: &WalletStore,
        ids: &[WalletId],
    ) -> LedgerResult<LockedWallets> {
        let mut ordered = ids.to_vec();
        ordered.sort();
        ordered.dedup();

        let deadline = Instant::now() + self.config.acquisition_timeout;
        let mut guards = Vec::with_capacity(ordered.len());

        for id in ordered {
            let slot = store.slot(&id).ok_or(LedgerError::WalletNotFound(id))?;
            match tokio::time::timeout_at(deadline, slot.state.lock_owned()).await {
                Ok(guard) => guards.push((id, guard)),
                Err(_) => {
                    let timeout_ms = self.config.acquisition_timeout.as_millis() as u64;
                    warn!(wallet_id = %id, timeout_ms, "Wallet lock acquisition timed out");
                    return Err(LedgerError::LockTimeout {
                        wallet_id: id,
                        timeout_ms,
                    });
                }
            }
        }

        debug!(wallets = guards.len(), "Wallet locks acquired");
        Ok(LockedWallets { guards })
    }
}
