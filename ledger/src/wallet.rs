//! Wallet records.

use fxwallet_common::{Balances, Currency, OwnerId, Timestamp, WalletId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, LedgerResult};

/// A multi-currency wallet.
///
/// The set of currencies is fixed at creation and no balance is ever
/// negative: `debit` refuses to go below zero and `credit` refuses
/// currencies the wallet does not hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wallet {
    /// Unique wallet identifier.
    pub id: WalletId,
    /// Owner the boundary resolved for this wallet.
    pub owner_id: OwnerId,
    balances: Balances,
    /// When the wallet was created.
    pub created_at: Timestamp,
}

impl Wallet {
    /// Create a wallet holding each currency at zero.
    pub fn new(owner_id: OwnerId, currencies: &[Currency]) -> Self {
        Self {
            id: WalletId::new(),
            owner_id,
            balances: currencies
                .iter()
                .cloned()
                .map(|c| (c, Decimal::ZERO))
                .collect(),
            created_at: fxwallet_common::now(),
        }
    }

    pub fn balances(&self) -> &Balances {
        &self.balances
    }

    /// Balance in `currency`, or `None` if the wallet does not hold it.
    pub fn balance(&self, currency: &Currency) -> Option<Decimal> {
        self.balances.get(currency).copied()
    }

    pub fn supports(&self, currency: &Currency) -> bool {
        self.balances.contains_key(currency)
    }

    /// Supported currencies in code order.
    pub fn currencies(&self) -> impl Iterator<Item = &Currency> {
        self.balances.keys()
    }

    /// Add `amount` to `currency`. Returns the new balance, or
    /// `AmountOverflow` with the balance unchanged.
    pub fn credit(&mut self, currency: &Currency, amount: Decimal) -> LedgerResult<Decimal> {
        let id = self.id;
        let balance = self
            .balances
            .get_mut(currency)
            .ok_or_else(|| LedgerError::UnsupportedCurrency {
                wallet_id: id,
                currency: currency.clone(),
            })?;
        *balance = balance
            .checked_add(amount)
            .ok_or_else(|| LedgerError::AmountOverflow {
                currency: currency.clone(),
            })?;
        Ok(*balance)
    }

    /// Subtract `amount` from `currency`. Returns the new balance.
    pub fn debit(&mut self, currency: &Currency, amount: Decimal) -> LedgerResult<Decimal> {
        let id = self.id;
        let balance = self
            .balances
            .get_mut(currency)
            .ok_or_else(|| LedgerError::UnsupportedCurrency {
                wallet_id: id,
                currency: currency.clone(),
            })?;
        if *balance < amount {
            return Err(LedgerError::InsufficientBalance {
                wallet_id: id,
                currency: currency.clone(),
                required: amount,
                available: *balance,
            });
        }
        *balance -= amount;
        Ok(*balance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn wallet() -> Wallet {
        Wallet::new(OwnerId::new("owner-1"), &Currency::defaults())
    }

    #[test]
    fn test_new_wallet_is_zeroed() {
        let wallet = wallet();
        assert_eq!(wallet.balances().len(), 4);
        assert!(wallet.balances().values().all(|b| b.is_zero()));
        assert!(wallet.supports(&Currency::cngn()));
        assert!(!wallet.supports(&Currency::new("GBPx")));
    }

    #[test]
    fn test_credit_and_debit() {
        let mut wallet = wallet();
        assert_eq!(wallet.credit(&Currency::usdx(), dec!(100)).unwrap(), dec!(100));
        assert_eq!(wallet.debit(&Currency::usdx(), dec!(40)).unwrap(), dec!(60));
        assert_eq!(wallet.balance(&Currency::usdx()), Some(dec!(60)));
    }

    #[test]
    fn test_debit_never_goes_negative() {
        let mut wallet = wallet();
        wallet.credit(&Currency::usdx(), dec!(5)).unwrap();

        let err = wallet.debit(&Currency::usdx(), dec!(5.01)).unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientBalance { .. }));
        assert_eq!(wallet.balance(&Currency::usdx()), Some(dec!(5)));

        assert_eq!(wallet.debit(&Currency::usdx(), dec!(5)).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn test_credit_overflow_leaves_balance() {
        let mut wallet = wallet();
        wallet.credit(&Currency::usdx(), Decimal::MAX).unwrap();

        let err = wallet.credit(&Currency::usdx(), dec!(1)).unwrap_err();
        assert!(matches!(err, LedgerError::AmountOverflow { .. }));
        assert_eq!(wallet.balance(&Currency::usdx()), Some(Decimal::MAX));
    }

    #[test]
    fn test_unsupported_currency() {
        let mut wallet = wallet();
        let err = wallet.credit(&Currency::new("GBPx"), dec!(1)).unwrap_err();
        assert!(matches!(err, LedgerError::UnsupportedCurrency { .. }));
        assert_eq!(wallet.balances().len(), 4);
    }
}
