//! Transaction engine: the only writer of wallet balances.
//!
//! Every mutating operation follows the same path: validate what can be
//! checked without locks, read the rate it needs, lock every wallet involved
//! in ascending id order, apply the change to working copies, append the
//! journal entry, and only then write the copies back. An error at any step
//! leaves balances and the journal untouched.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use fxwallet_common::{
    constants, is_positive_amount, Balances, Classify, Currency, OwnerId, WalletId,
};
use fxwallet_fx::RateStore;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};

use crate::error::{LedgerError, LedgerResult};
use crate::journal::{Journal, Transaction};
use crate::lock_manager::{LockConfig, LockManager};
use crate::metrics::{LedgerMetrics, MetricsSnapshot};
use crate::store::{WalletSlot, WalletStore};
use crate::wallet::Wallet;

/// Ledger configuration.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// Bound on waiting for an operation's wallet locks.
    pub lock_timeout: Duration,
    /// Currencies every new wallet holds.
    pub supported_currencies: Vec<Currency>,
    /// Currency balances are valued in by `balances_with_usd`.
    pub reference_currency: Currency,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            lock_timeout: constants::DEFAULT_LOCK_TIMEOUT,
            supported_currencies: Currency::defaults(),
            reference_currency: Currency::usdx(),
        }
    }
}

/// Parameters of a wallet-to-wallet transfer.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub sender: WalletId,
    pub receiver: WalletId,
    /// Currency debited from the sender.
    pub currency: Currency,
    pub amount: Decimal,
    /// Currency credited to the receiver. When absent the receiver is
    /// credited in `currency` if it holds it, else in its first currency.
    pub target_currency: Option<Currency>,
}

impl TransferRequest {
    pub fn new(sender: WalletId, receiver: WalletId, currency: Currency, amount: Decimal) -> Self {
        Self {
            sender,
            receiver,
            currency,
            amount,
            target_currency: None,
        }
    }

    pub fn with_target_currency(mut self, currency: Currency) -> Self {
        self.target_currency = Some(currency);
        self
    }
}

/// Result of a committed swap or transfer.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionReceipt {
    pub transaction: Transaction,
    /// Amount credited, in the target currency.
    pub converted_amount: Decimal,
    /// Rate applied to the debited amount.
    pub rate: Decimal,
}

/// Balances plus their value in the reference currency.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BalanceSummary {
    pub wallet_id: WalletId,
    pub balances: Balances,
    pub total_usd: Decimal,
    pub reference_currency: Currency,
    /// Currencies left out of the total for lack of a logged rate.
    pub unpriced: Vec<Currency>,
}

/// Marks one operation as in flight until dropped.
struct OperationGuard<'a> {
    metrics: &'a LedgerMetrics,
}

impl Drop for OperationGuard<'_> {
    fn drop(&mut self) {
        self.metrics.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Applies deposits, swaps and transfers to wallets.
pub struct TransactionEngine {
    store: WalletStore,
    locks: LockManager,
    journal: Arc<dyn Journal>,
    rates: Arc<RateStore>,
    config: LedgerConfig,
    metrics: LedgerMetrics,
    accepting: AtomicBool,
}

impl TransactionEngine {
    pub fn new(rates: Arc<RateStore>, journal: Arc<dyn Journal>, config: LedgerConfig) -> Self {
        Self {
            store: WalletStore::new(),
            locks: LockManager::new(LockConfig {
                acquisition_timeout: config.lock_timeout,
            }),
            journal,
            rates,
            config,
            metrics: LedgerMetrics::new(),
            accepting: AtomicBool::new(true),
        }
    }

    /// Create the wallet for `owner_id`, zeroed in every supported currency.
    #[instrument(skip(self))]
    pub async fn create_wallet(&self, owner_id: OwnerId) -> LedgerResult<Wallet> {
        let _op = self.begin()?;
        let result = if owner_id.is_valid() {
            self.store
                .create(owner_id.clone(), &self.config.supported_currencies)
                .map_err(|e| {
                    if e.is_duplicate() {
                        LedgerError::WalletAlreadyExists(owner_id)
                    } else {
                        LedgerError::Store(e)
                    }
                })
        } else {
            Err(LedgerError::InvalidOwner(owner_id.as_str().to_string()))
        };
        self.observe(result)
    }

    /// Consistent copy of a wallet, taken under its lock.
    pub async fn get_wallet(&self, wallet_id: WalletId) -> LedgerResult<Wallet> {
        let _op = self.begin()?;
        let result = self.read_wallet(wallet_id).await;
        self.observe(result)
    }

    pub async fn get_wallet_by_owner(&self, owner_id: &OwnerId) -> LedgerResult<Wallet> {
        let _op = self.begin()?;
        let result = match self.store.wallet_id_for_owner(owner_id) {
            Some(wallet_id) => self.read_wallet(wallet_id).await,
            None => Err(LedgerError::OwnerNotFound(owner_id.clone())),
        };
        self.observe(result)
    }

    /// Credit `amount` of `currency` to a wallet.
    #[instrument(skip(self))]
    pub async fn deposit(
        &self,
        wallet_id: WalletId,
        currency: Currency,
        amount: Decimal,
    ) -> LedgerResult<Transaction> {
        let _op = self.begin()?;
        let result = self.apply_deposit(wallet_id, currency, amount).await;
        self.observe(result)
    }

    /// Convert `amount` of `from` into `to` within one wallet at the current rate.
    #[instrument(skip(self))]
    pub async fn swap(
        &self,
        wallet_id: WalletId,
        from: Currency,
        to: Currency,
        amount: Decimal,
    ) -> LedgerResult<ConversionReceipt> {
        let _op = self.begin()?;
        let result = self.apply_swap(wallet_id, from, to, amount).await;
        self.observe(result)
    }

    /// Move funds between two wallets, converting into the receiver's
    /// currency when needed. The journal entry is recorded against the sender.
    #[instrument(
        skip(self, request),
        fields(sender = %request.sender, receiver = %request.receiver)
    )]
    pub async fn transfer(&self, request: TransferRequest) -> LedgerResult<ConversionReceipt> {
        let _op = self.begin()?;
        let result = self.apply_transfer(request).await;
        self.observe(result)
    }

    /// Journal entries recorded against a wallet, newest first.
    pub async fn transaction_history(&self, wallet_id: WalletId) -> LedgerResult<Vec<Transaction>> {
        let _op = self.begin()?;
        let result = match self.slot(wallet_id) {
            Ok(_) => self
                .journal
                .history(&wallet_id)
                .await
                .map_err(LedgerError::Journal),
            Err(e) => Err(e),
        };
        self.observe(result)
    }

    /// Current balances and their total in the reference currency.
    ///
    /// Each balance is valued at the most recently logged rate into the
    /// reference currency, not the live table. A currency with no logged
    /// rate is left out of the total and listed in `unpriced`.
    #[instrument(skip(self))]
    pub async fn balances_with_usd(&self, wallet_id: WalletId) -> LedgerResult<BalanceSummary> {
        let _op = self.begin()?;
        let result = self.summarize(wallet_id).await;
        self.observe(result)
    }

    /// Refuse new operations. Operations already running finish normally.
    pub fn shutdown(&self) {
        if self.accepting.swap(false, Ordering::SeqCst) {
            info!(in_flight = self.in_flight(), "Ledger stopped accepting operations");
        }
    }

    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::SeqCst)
    }

    pub fn in_flight(&self) -> u64 {
        self.metrics.in_flight.load(Ordering::SeqCst)
    }

    /// Wait until no operation is in flight. Returns false on timeout.
    pub async fn wait_idle(&self, timeout: Duration) -> bool {
        let drained = tokio::time::timeout(timeout, async {
            loop {
                let pending = self.in_flight();
                if pending == 0 {
                    break;
                }
                debug!(pending, "Waiting for in-flight ledger operations");
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        drained.is_ok()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Count the operation in flight, then check admission. In that order a
    /// drain that observes zero in flight cannot miss an admitted operation.
    fn begin(&self) -> LedgerResult<OperationGuard<'_>> {
        self.metrics.in_flight.fetch_add(1, Ordering::SeqCst);
        let guard = OperationGuard {
            metrics: &self.metrics,
        };
        if !self.accepting.load(Ordering::SeqCst) {
            return Err(LedgerError::ShuttingDown);
        }
        Ok(guard)
    }

    fn observe<T>(&self, result: LedgerResult<T>) -> LedgerResult<T> {
        if let Err(e) = &result {
            self.metrics.operation_failed();
            if matches!(e, LedgerError::LockTimeout { .. }) {
                self.metrics.lock_timeout();
            }
            debug!(code = e.error_code(), error = %e, "Ledger operation failed");
        }
        result
    }

    fn slot(&self, wallet_id: WalletId) -> LedgerResult<WalletSlot> {
        self.store
            .slot(&wallet_id)
            .ok_or(LedgerError::WalletNotFound(wallet_id))
    }

    async fn apply_deposit(
        &self,
        wallet_id: WalletId,
        currency: Currency,
        amount: Decimal,
    ) -> LedgerResult<Transaction> {
        validate_amount(amount)?;
        let slot = self.slot(wallet_id)?;
        require_currency(&slot, &currency)?;

        let mut locked = self.locks.acquire(&self.store, &[wallet_id]).await?;
        let mut wallet = locked.get(&wallet_id)?.clone();
        let balance = wallet.credit(&currency, amount)?;

        let entry = Transaction::deposit(wallet_id, currency.clone(), amount);
        self.append_journal(&entry).await?;
        *locked.get_mut(&wallet_id)? = wallet;

        info!(
            wallet_id = %wallet_id,
            currency = %currency,
            amount = %amount,
            balance = %balance,
            "Deposit committed"
        );
        self.metrics.deposit_committed();
        Ok(entry)
    }

    async fn apply_swap(
        &self,
        wallet_id: WalletId,
        from: Currency,
        to: Currency,
        amount: Decimal,
    ) -> LedgerResult<ConversionReceipt> {
        validate_amount(amount)?;
        let slot = self.slot(wallet_id)?;
        require_currency(&slot, &from)?;
        require_currency(&slot, &to)?;

        // Read before locking: no wallet lock is ever held across a rate read.
        let rate = self.rates.get_rate(&from, &to).await?;
        let converted_amount = convert(amount, rate, &to)?;

        let mut locked = self.locks.acquire(&self.store, &[wallet_id]).await?;
        let mut wallet = locked.get(&wallet_id)?.clone();
        wallet.debit(&from, amount)?;
        wallet.credit(&to, converted_amount)?;

        let entry = Transaction::swap(
            wallet_id,
            from.clone(),
            to.clone(),
            amount,
            converted_amount,
            rate,
        );
        self.append_journal(&entry).await?;
        *locked.get_mut(&wallet_id)? = wallet;

        info!(
            wallet_id = %wallet_id,
            from = %from,
            to = %to,
            amount = %amount,
            converted_amount = %converted_amount,
            rate = %rate,
            "Swap committed"
        );
        self.metrics.swap_committed();
        Ok(ConversionReceipt {
            transaction: entry,
            converted_amount,
            rate,
        })
    }

    async fn apply_transfer(&self, request: TransferRequest) -> LedgerResult<ConversionReceipt> {
        let TransferRequest {
            sender,
            receiver,
            currency,
            amount,
            target_currency,
        } = request;

        validate_amount(amount)?;
        if sender == receiver {
            return Err(LedgerError::SelfTransfer(sender));
        }
        let sender_slot = self.slot(sender)?;
        let receiver_slot = self.slot(receiver)?;
        require_currency(&sender_slot, &currency)?;
        let target = resolve_target(&receiver_slot, &currency, target_currency)?;

        let rate = self.rates.get_rate(&currency, &target).await?;
        let converted_amount = convert(amount, rate, &target)?;

        let mut locked = self.locks.acquire(&self.store, &[sender, receiver]).await?;
        let mut from_wallet = locked.get(&sender)?.clone();
        let mut to_wallet = locked.get(&receiver)?.clone();
        from_wallet.debit(&currency, amount)?;
        to_wallet.credit(&target, converted_amount)?;

        let entry = Transaction::transfer(
            sender,
            receiver,
            currency.clone(),
            target.clone(),
            amount,
            converted_amount,
            rate,
        );
        self.append_journal(&entry).await?;
        *locked.get_mut(&sender)? = from_wallet;
        *locked.get_mut(&receiver)? = to_wallet;

        info!(
            currency = %currency,
            target_currency = %target,
            amount = %amount,
            converted_amount = %converted_amount,
            rate = %rate,
            "Transfer committed"
        );
        self.metrics.transfer_committed();
        Ok(ConversionReceipt {
            transaction: entry,
            converted_amount,
            rate,
        })
    }

    async fn summarize(&self, wallet_id: WalletId) -> LedgerResult<BalanceSummary> {
        let wallet = self.read_wallet(wallet_id).await?;
        let reference = &self.config.reference_currency;

        let mut total_usd = Decimal::ZERO;
        let mut unpriced = Vec::new();
        for (currency, balance) in wallet.balances() {
            let value = if currency == reference {
                *balance
            } else {
                match self.rates.log().latest_rate(currency, reference).await {
                    Ok(Some(rate)) => convert(*balance, rate, reference)?,
                    Ok(None) => {
                        unpriced.push(currency.clone());
                        continue;
                    }
                    Err(e) => {
                        warn!(currency = %currency, error = %e, "Logged rate unavailable");
                        unpriced.push(currency.clone());
                        continue;
                    }
                }
            };
            total_usd = total_usd
                .checked_add(value)
                .ok_or_else(|| LedgerError::AmountOverflow {
                    currency: reference.clone(),
                })?;
        }

        Ok(BalanceSummary {
            wallet_id,
            balances: wallet.balances().clone(),
            total_usd,
            reference_currency: reference.clone(),
            unpriced,
        })
    }

    async fn read_wallet(&self, wallet_id: WalletId) -> LedgerResult<Wallet> {
        let locked = self.locks.acquire(&self.store, &[wallet_id]).await?;
        Ok(locked.get(&wallet_id)?.clone())
    }

    async fn append_journal(&self, entry: &Transaction) -> LedgerResult<()> {
        self.journal.append(entry.clone()).await.map_err(|e| {
            error!(
                transaction_id = %entry.id,
                wallet_id = %entry.wallet_id,
                tx_type = %entry.tx_type,
                error = %e,
                "Journal append failed, operation rolled back"
            );
            LedgerError::Journal(e)
        })
    }
}

fn validate_amount(amount: Decimal) -> LedgerResult<()> {
    if is_positive_amount(amount) {
        Ok(())
    } else {
        Err(LedgerError::InvalidAmount(amount))
    }
}

fn require_currency(slot: &WalletSlot, currency: &Currency) -> LedgerResult<()> {
    if slot.supports(currency) {
        Ok(())
    } else {
        Err(LedgerError::UnsupportedCurrency {
            wallet_id: slot.id,
            currency: currency.clone(),
        })
    }
}

/// `amount` converted at `rate`, or `AmountOverflow` if it exceeds `Decimal::MAX`.
fn convert(amount: Decimal, rate: Decimal, into: &Currency) -> LedgerResult<Decimal> {
    amount
        .checked_mul(rate)
        .ok_or_else(|| LedgerError::AmountOverflow {
            currency: into.clone(),
        })
}

/// Currency the receiver of a transfer is credited in.
fn resolve_target(
    receiver: &WalletSlot,
    currency: &Currency,
    requested: Option<Currency>,
) -> LedgerResult<Currency> {
    match requested {
        Some(target) => {
            require_currency(receiver, &target)?;
            Ok(target)
        }
        None if receiver.supports(currency) => Ok(currency.clone()),
        None => receiver
            .currencies
            .first()
            .cloned()
            .ok_or_else(|| LedgerError::UnsupportedCurrency {
                wallet_id: receiver.id,
                currency: currency.clone(),
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journal::{InMemoryJournal, TransactionType};
    use async_trait::async_trait;
    use fxwallet_common::{ErrorKind, StoreError};
    use fxwallet_fx::{InMemoryRateLog, RateLog, RateLogEntry, RateStoreConfig};
    use rust_decimal_macros::dec;

    fn rates() -> Arc<RateStore> {
        Arc::new(RateStore::new(
            Arc::new(InMemoryRateLog::new()),
            RateStoreConfig {
                seed: Some(1),
                ..Default::default()
            },
        ))
    }

    fn engine() -> TransactionEngine {
        TransactionEngine::new(rates(), Arc::new(InMemoryJournal::new()), LedgerConfig::default())
    }

    /// Refuses every append.
    struct FailingJournal;

    #[async_trait]
    impl Journal for FailingJournal {
        async fn append(&self, _entry: Transaction) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("journal offline".into()))
        }

        async fn history(&self, _wallet_id: &WalletId) -> Result<Vec<Transaction>, StoreError> {
            Ok(Vec::new())
        }

        async fn len(&self) -> Result<usize, StoreError> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn test_deposit_then_swap() {
        let engine = engine();
        let wallet = engine.create_wallet(OwnerId::new("alice")).await.unwrap();

        let deposit = engine
            .deposit(wallet.id, Currency::usdx(), dec!(100))
            .await
            .unwrap();
        assert_eq!(deposit.tx_type, TransactionType::Deposit);

        let receipt = engine
            .swap(wallet.id, Currency::usdx(), Currency::cngn(), dec!(10))
            .await
            .unwrap();
        assert_eq!(receipt.rate, dec!(1666.67));
        assert_eq!(receipt.converted_amount, dec!(16666.70));
        assert_eq!(receipt.transaction.rate, Some(dec!(1666.67)));

        let wallet = engine.get_wallet(wallet.id).await.unwrap();
        assert_eq!(wallet.balance(&Currency::usdx()), Some(dec!(90)));
        assert_eq!(wallet.balance(&Currency::cngn()), Some(dec!(16666.70)));

        let history = engine.transaction_history(wallet.id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].tx_type, TransactionType::Swap);
        assert_eq!(history[1].tx_type, TransactionType::Deposit);
    }

    #[tokio::test]
    async fn test_transfer_falls_back_to_receiver_currency() {
        let engine = TransactionEngine::new(
            rates(),
            Arc::new(InMemoryJournal::new()),
            LedgerConfig::default(),
        );
        let sender = engine.create_wallet(OwnerId::new("sender")).await.unwrap();
        // A receiver without USDx, created directly in the store.
        let receiver = engine
            .store
            .create(OwnerId::new("receiver"), &[Currency::cngn()])
            .unwrap();
        engine
            .deposit(sender.id, Currency::usdx(), dec!(20))
            .await
            .unwrap();

        let receipt = engine
            .transfer(TransferRequest::new(
                sender.id,
                receiver.id,
                Currency::usdx(),
                dec!(5),
            ))
            .await
            .unwrap();

        assert_eq!(receipt.rate, dec!(1666.67));
        assert_eq!(receipt.converted_amount, dec!(8333.35));
        assert_eq!(receipt.transaction.counterparty_id, Some(receiver.id));
        assert_eq!(receipt.transaction.to_currency, Some(Currency::cngn()));

        let sender = engine.get_wallet(sender.id).await.unwrap();
        let receiver = engine.get_wallet(receiver.id).await.unwrap();
        assert_eq!(sender.balance(&Currency::usdx()), Some(dec!(15)));
        assert_eq!(receiver.balance(&Currency::cngn()), Some(dec!(8333.35)));
    }

    #[tokio::test]
    async fn test_transfer_in_shared_currency_uses_unit_rate() {
        let engine = engine();
        let a = engine.create_wallet(OwnerId::new("a")).await.unwrap();
        let b = engine.create_wallet(OwnerId::new("b")).await.unwrap();
        engine.deposit(a.id, Currency::eurx(), dec!(10)).await.unwrap();

        let receipt = engine
            .transfer(TransferRequest::new(a.id, b.id, Currency::eurx(), dec!(4)))
            .await
            .unwrap();
        assert_eq!(receipt.rate, Decimal::ONE);
        assert_eq!(
            engine.get_wallet(b.id).await.unwrap().balance(&Currency::eurx()),
            Some(dec!(4))
        );
    }

    #[tokio::test]
    async fn test_transfer_explicit_target() {
        let engine = engine();
        let a = engine.create_wallet(OwnerId::new("a")).await.unwrap();
        let b = engine.create_wallet(OwnerId::new("b")).await.unwrap();
        engine.deposit(a.id, Currency::usdx(), dec!(10)).await.unwrap();

        let receipt = engine
            .transfer(
                TransferRequest::new(a.id, b.id, Currency::usdx(), dec!(10))
                    .with_target_currency(Currency::eurx()),
            )
            .await
            .unwrap();
        assert_eq!(receipt.converted_amount, dec!(8.80));

        let err = engine
            .transfer(
                TransferRequest::new(b.id, a.id, Currency::eurx(), dec!(1))
                    .with_target_currency(Currency::new("GBPx")),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::UnsupportedCurrency { wallet_id, .. } if wallet_id == a.id
        ));
    }

    #[tokio::test]
    async fn test_self_transfer_rejected() {
        let engine = engine();
        let a = engine.create_wallet(OwnerId::new("a")).await.unwrap();
        let err = engine
            .transfer(TransferRequest::new(a.id, a.id, Currency::usdx(), dec!(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::SelfTransfer(_)));
    }

    #[tokio::test]
    async fn test_journal_failure_rolls_back() {
        let engine =
            TransactionEngine::new(rates(), Arc::new(FailingJournal), LedgerConfig::default());
        let wallet = engine.create_wallet(OwnerId::new("alice")).await.unwrap();

        let err = engine
            .deposit(wallet.id, Currency::usdx(), dec!(100))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Journal(_)));
        assert_eq!(err.kind(), ErrorKind::Persistence);

        let wallet = engine.get_wallet(wallet.id).await.unwrap();
        assert_eq!(wallet.balance(&Currency::usdx()), Some(Decimal::ZERO));
        assert_eq!(engine.metrics().failed, 1);
        assert_eq!(engine.metrics().deposits, 0);
    }

    #[tokio::test]
    async fn test_validation_errors_leave_no_trace() {
        let journal = Arc::new(InMemoryJournal::new());
        let engine = TransactionEngine::new(rates(), journal.clone(), LedgerConfig::default());
        let wallet = engine.create_wallet(OwnerId::new("alice")).await.unwrap();
        engine.deposit(wallet.id, Currency::usdx(), dec!(5)).await.unwrap();

        let err = engine
            .deposit(wallet.id, Currency::usdx(), dec!(0))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidAmount(_)));

        let err = engine
            .deposit(wallet.id, Currency::new("GBPx"), dec!(1))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::UnsupportedCurrency { .. }));

        let err = engine
            .swap(wallet.id, Currency::usdx(), Currency::cngn(), dec!(6))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientBalance { .. }));
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let err = engine
            .deposit(WalletId::new(), Currency::usdx(), dec!(1))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::WalletNotFound(_)));

        assert_eq!(journal.len().await.unwrap(), 1);
        let wallet = engine.get_wallet(wallet.id).await.unwrap();
        assert_eq!(wallet.balance(&Currency::usdx()), Some(dec!(5)));
        assert_eq!(wallet.balance(&Currency::cngn()), Some(Decimal::ZERO));
    }

    #[tokio::test]
    async fn test_overflowing_deposit_is_rejected() {
        let journal = Arc::new(InMemoryJournal::new());
        let engine = TransactionEngine::new(rates(), journal.clone(), LedgerConfig::default());
        let wallet = engine.create_wallet(OwnerId::new("alice")).await.unwrap();
        engine
            .deposit(wallet.id, Currency::usdx(), Decimal::MAX)
            .await
            .unwrap();

        let err = engine
            .deposit(wallet.id, Currency::usdx(), dec!(1))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::AmountOverflow { .. }));
        assert_eq!(err.kind(), ErrorKind::Validation);

        assert_eq!(journal.len().await.unwrap(), 1);
        let wallet = engine.get_wallet(wallet.id).await.unwrap();
        assert_eq!(wallet.balance(&Currency::usdx()), Some(Decimal::MAX));
        assert_eq!(engine.metrics().deposits, 1);
        assert_eq!(engine.metrics().failed, 1);
    }

    #[tokio::test]
    async fn test_overflowing_swap_is_rejected() {
        let journal = Arc::new(InMemoryJournal::new());
        let engine = TransactionEngine::new(rates(), journal.clone(), LedgerConfig::default());
        let wallet = engine.create_wallet(OwnerId::new("alice")).await.unwrap();
        engine
            .deposit(wallet.id, Currency::usdx(), Decimal::MAX)
            .await
            .unwrap();

        // MAX * 1666.67 does not fit.
        let err = engine
            .swap(wallet.id, Currency::usdx(), Currency::cngn(), Decimal::MAX)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::AmountOverflow { ref currency } if *currency == Currency::cngn()
        ));

        // The product fits, but the credit pushes cNGN past MAX.
        engine
            .deposit(wallet.id, Currency::cngn(), Decimal::MAX)
            .await
            .unwrap();
        let err = engine
            .swap(wallet.id, Currency::usdx(), Currency::cngn(), dec!(1))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::AmountOverflow { .. }));

        assert_eq!(journal.len().await.unwrap(), 2);
        let wallet = engine.get_wallet(wallet.id).await.unwrap();
        assert_eq!(wallet.balance(&Currency::usdx()), Some(Decimal::MAX));
        assert_eq!(wallet.balance(&Currency::cngn()), Some(Decimal::MAX));
        assert_eq!(engine.metrics().swaps, 0);
    }

    #[tokio::test]
    async fn test_overflowing_transfer_is_rejected() {
        let journal = Arc::new(InMemoryJournal::new());
        let engine = TransactionEngine::new(rates(), journal.clone(), LedgerConfig::default());
        let a = engine.create_wallet(OwnerId::new("a")).await.unwrap();
        let b = engine.create_wallet(OwnerId::new("b")).await.unwrap();
        engine
            .deposit(a.id, Currency::usdx(), Decimal::MAX)
            .await
            .unwrap();
        engine
            .deposit(b.id, Currency::usdx(), Decimal::MAX)
            .await
            .unwrap();

        let err = engine
            .transfer(
                TransferRequest::new(a.id, b.id, Currency::usdx(), Decimal::MAX)
                    .with_target_currency(Currency::cngn()),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::AmountOverflow { .. }));

        let err = engine
            .transfer(TransferRequest::new(a.id, b.id, Currency::usdx(), dec!(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::AmountOverflow { .. }));

        assert_eq!(journal.len().await.unwrap(), 2);
        for id in [a.id, b.id] {
            let wallet = engine.get_wallet(id).await.unwrap();
            assert_eq!(wallet.balance(&Currency::usdx()), Some(Decimal::MAX));
            assert_eq!(wallet.balance(&Currency::cngn()), Some(Decimal::ZERO));
        }
        assert_eq!(engine.metrics().transfers, 0);
    }

    #[tokio::test]
    async fn test_balances_with_usd_overflow_is_an_error() {
        let log = Arc::new(InMemoryRateLog::new());
        let rates = Arc::new(RateStore::new(log.clone(), RateStoreConfig::default()));
        let engine = TransactionEngine::new(
            rates,
            Arc::new(InMemoryJournal::new()),
            LedgerConfig::default(),
        );
        let wallet = engine.create_wallet(OwnerId::new("alice")).await.unwrap();
        engine
            .deposit(wallet.id, Currency::usdx(), Decimal::MAX)
            .await
            .unwrap();
        engine
            .deposit(wallet.id, Currency::eurx(), Decimal::MAX)
            .await
            .unwrap();
        log.append(RateLogEntry::new(Currency::eurx(), Currency::usdx(), dec!(1.14)))
            .await
            .unwrap();

        let err = engine.balances_with_usd(wallet.id).await.unwrap_err();
        assert!(matches!(err, LedgerError::AmountOverflow { .. }));
    }

    #[tokio::test]
    async fn test_one_wallet_per_owner() {
        let engine = engine();
        let wallet = engine.create_wallet(OwnerId::new("alice")).await.unwrap();

        let err = engine.create_wallet(OwnerId::new("alice")).await.unwrap_err();
        assert!(matches!(err, LedgerError::WalletAlreadyExists(_)));

        let found = engine.get_wallet_by_owner(&OwnerId::new("alice")).await.unwrap();
        assert_eq!(found.id, wallet.id);

        let err = engine.get_wallet_by_owner(&OwnerId::new("bob")).await.unwrap_err();
        assert!(matches!(err, LedgerError::OwnerNotFound(_)));

        let err = engine.create_wallet(OwnerId::new("  ")).await.unwrap_err();
        assert!(matches!(err, LedgerError::InvalidOwner(_)));
    }

    #[tokio::test]
    async fn test_balances_with_usd_uses_logged_rates() {
        let log = Arc::new(InMemoryRateLog::new());
        let rates = Arc::new(RateStore::new(log.clone(), RateStoreConfig::default()));
        let engine = TransactionEngine::new(
            rates,
            Arc::new(InMemoryJournal::new()),
            LedgerConfig::default(),
        );
        let wallet = engine.create_wallet(OwnerId::new("alice")).await.unwrap();
        engine.deposit(wallet.id, Currency::usdx(), dec!(90)).await.unwrap();
        engine.deposit(wallet.id, Currency::cngn(), dec!(10000)).await.unwrap();
        engine.deposit(wallet.id, Currency::eurx(), dec!(10)).await.unwrap();

        log.append(RateLogEntry::new(Currency::cngn(), Currency::usdx(), dec!(0.0007)))
            .await
            .unwrap();
        log.append(RateLogEntry::new(Currency::cngn(), Currency::usdx(), dec!(0.0006)))
            .await
            .unwrap();

        let summary = engine.balances_with_usd(wallet.id).await.unwrap();
        // 90 + 10000 * 0.0006; EURx and cXAF have no logged rate.
        assert_eq!(summary.total_usd, dec!(96));
        assert_eq!(summary.unpriced, vec![Currency::eurx(), Currency::cxaf()]);
        assert_eq!(summary.balances.get(&Currency::eurx()), Some(&dec!(10)));

        let again = engine.balances_with_usd(wallet.id).await.unwrap();
        assert_eq!(again, summary);
    }

    #[tokio::test]
    async fn test_shutdown_refuses_new_operations() {
        let engine = engine();
        let wallet = engine.create_wallet(OwnerId::new("alice")).await.unwrap();

        engine.shutdown();
        engine.shutdown();
        assert!(!engine.is_accepting());

        let err = engine
            .deposit(wallet.id, Currency::usdx(), dec!(1))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::ShuttingDown));
        assert!(err.kind().is_retryable());
        assert_eq!(engine.in_flight(), 0);
        assert!(engine.wait_idle(Duration::from_millis(50)).await);
    }
}
