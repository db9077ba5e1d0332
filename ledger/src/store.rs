//! In-process wallet records.
//!
//! Each wallet lives behind its own async mutex, standing in for a database
//! row lock. The currency set is copied out beside the mutex because it never
//! changes after creation and can be read without locking.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use fxwallet_common::{Currency, OwnerId, StoreError, WalletId};
use tokio::sync::Mutex;
use tracing::info;

use crate::wallet::Wallet;

/// A wallet's lock and its immutable metadata.
#[derive(Clone)]
pub struct WalletSlot {
    pub id: WalletId,
    pub owner_id: OwnerId,
    /// Supported currencies in code order.
    pub currencies: Arc<[Currency]>,
    pub(crate) state: Arc<Mutex<Wallet>>,
}

impl WalletSlot {
    pub fn supports(&self, currency: &Currency) -> bool {
        self.currencies.binary_search(currency).is_ok()
    }
}

/// Registry of all wallets, indexed by id and by owner.
#[derive(Default)]
pub struct WalletStore {
    wallets: DashMap<WalletId, WalletSlot>,
    by_owner: DashMap<OwnerId, WalletId>,
}

impl WalletStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the owner's wallet. Each owner has at most one.
    pub fn create(&self, owner_id: OwnerId, currencies: &[Currency]) -> Result<Wallet, StoreError> {
        match self.by_owner.entry(owner_id.clone()) {
            Entry::Occupied(_) => Err(StoreError::duplicate("wallet", owner_id)),
            Entry::Vacant(vacant) => {
                let wallet = Wallet::new(owner_id.clone(), currencies);
                let slot = WalletSlot {
                    id: wallet.id,
                    owner_id,
                    currencies: wallet.currencies().cloned().collect(),
                    state: Arc::new(Mutex::new(wallet.clone())),
                };
                self.wallets.insert(wallet.id, slot);
                vacant.insert(wallet.id);

                info!(wallet_id = %wallet.id, owner = %wallet.owner_id, "Wallet created");
                Ok(wallet)
            }
        }
    }

    /// Look up a wallet's slot. The clone shares the wallet's lock.
    pub fn slot(&self, id: &WalletId) -> Option<WalletSlot> {
        self.wallets.get(id).map(|s| s.clone())
    }

    pub fn wallet_id_for_owner(&self, owner_id: &OwnerId) -> Option<WalletId> {
        self.by_owner.get(owner_id).map(|id| *id)
    }

    pub fn contains(&self, id: &WalletId) -> bool {
        self.wallets.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.wallets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wallets.is_empty()
    }
}
