//! Concurrency tests
//!
//! Many tasks hammering the same wallets must neither lose updates nor
//! deadlock, and a wallet held too long surfaces as a lock timeout.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use fxwallet_common::{Classify, Currency, ErrorKind, OwnerId, StoreError, WalletId};
use fxwallet_fx::{InMemoryRateLog, RateStore, RateStoreConfig};
use fxwallet_ledger::{
    InMemoryJournal, Journal, LedgerConfig, LedgerError, TransactionEngine, Transaction,
    TransferRequest,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::sync::{Notify, Semaphore};

/// Journal whose appends wait for a permit, announcing each arrival.
struct GatedJournal {
    gate: Semaphore,
    entered: Notify,
    inner: InMemoryJournal,
}

impl Default for GatedJournal {
    fn default() -> Self {
        Self {
            gate: Semaphore::new(0),
            entered: Notify::new(),
            inner: InMemoryJournal::new(),
        }
    }
}

#[async_trait]
impl Journal for GatedJournal {
    async fn append(&self, entry: Transaction) -> Result<(), StoreError> {
        self.entered.notify_one();
        let permit = self
            .gate
            .acquire()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        permit.forget();
        self.inner.append(entry).await
    }

    async fn history(&self, wallet_id: &WalletId) -> Result<Vec<Transaction>, StoreError> {
        self.inner.history(wallet_id).await
    }

    async fn len(&self) -> Result<usize, StoreError> {
        self.inner.len().await
    }
}

fn engine_with(journal: Arc<dyn Journal>, lock_timeout: Duration) -> Arc<TransactionEngine> {
    let rates = Arc::new(RateStore::new(
        Arc::new(InMemoryRateLog::new()),
        RateStoreConfig::default(),
    ));
    Arc::new(TransactionEngine::new(
        rates,
        journal,
        LedgerConfig {
            lock_timeout,
            ..Default::default()
        },
    ))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_deposits_lose_no_updates() {
    const TASKS: usize = 64;
    let journal = Arc::new(InMemoryJournal::new());
    let engine = engine_with(journal.clone(), Duration::from_secs(5));
    let wallet_id = engine.create_wallet(OwnerId::new("alice")).await.unwrap().id;

    let handles: Vec<_> = (0..TASKS)
        .map(|_| {
            let engine = engine.clone();
            tokio::spawn(async move {
                engine
                    .deposit(wallet_id, Currency::usdx(), dec!(2.5))
                    .await
            })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let wallet = engine.get_wallet(wallet_id).await.unwrap();
    assert_eq!(
        wallet.balance(&Currency::usdx()),
        Some(dec!(2.5) * Decimal::from(TASKS))
    );
    assert_eq!(journal.len().await.unwrap(), TASKS);
    assert_eq!(engine.metrics().deposits, TASKS as u64);
    assert_eq!(engine.in_flight(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_opposite_transfers_do_not_deadlock() {
    const ROUNDS: usize = 50;
    let journal = Arc::new(InMemoryJournal::new());
    let engine = engine_with(journal.clone(), Duration::from_secs(5));
    let a = engine.create_wallet(OwnerId::new("a")).await.unwrap();
    let b = engine.create_wallet(OwnerId::new("b")).await.unwrap();
    engine.deposit(a.id, Currency::usdx(), dec!(1000)).await.unwrap();
    engine.deposit(b.id, Currency::usdx(), dec!(1000)).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..ROUNDS {
        for (from, to) in [(a.id, b.id), (b.id, a.id)] {
            let engine = engine.clone();
            handles.push(tokio::spawn(async move {
                engine
                    .transfer(TransferRequest::new(from, to, Currency::usdx(), dec!(1)))
                    .await
            }));
        }
    }

    let all = async {
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
    };
    tokio::time::timeout(Duration::from_secs(10), all)
        .await
        .expect("transfers deadlocked");

    let a = engine.get_wallet(a.id).await.unwrap();
    let b = engine.get_wallet(b.id).await.unwrap();
    assert_eq!(a.balance(&Currency::usdx()), Some(dec!(1000)));
    assert_eq!(b.balance(&Currency::usdx()), Some(dec!(1000)));
    assert_eq!(journal.len().await.unwrap(), 2 + 2 * ROUNDS);
}

#[tokio::test]
async fn test_held_wallet_times_out() {
    let journal = Arc::new(GatedJournal::default());
    let engine = engine_with(journal.clone(), Duration::from_millis(50));
    let wallet_id = engine.create_wallet(OwnerId::new("alice")).await.unwrap().id;

    // The first deposit stalls inside its journal append while holding the wallet.
    let first = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.deposit(wallet_id, Currency::usdx(), dec!(10)).await })
    };
    journal.entered.notified().await;

    let err = engine
        .deposit(wallet_id, Currency::usdx(), dec!(1))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::LockTimeout { wallet_id: held, .. } if held == wallet_id));
    assert_eq!(err.kind(), ErrorKind::ConcurrencyTimeout);
    assert!(err.kind().is_retryable());

    journal.gate.add_permits(1);
    first.await.unwrap().unwrap();

    let wallet = engine.get_wallet(wallet_id).await.unwrap();
    assert_eq!(wallet.balance(&Currency::usdx()), Some(dec!(10)));
    assert_eq!(journal.len().await.unwrap(), 1);

    let metrics = engine.metrics();
    assert_eq!(metrics.lock_timeouts, 1);
    assert_eq!(metrics.failed, 1);
    assert_eq!(metrics.deposits, 1);
}
