//! Monetary types for FxWallet.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A currency code such as `USDx` or `cNGN`.
///
/// Codes are case-sensitive and kept exactly as given: the stablecoin-style
/// codes used by the exchange mix cases.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Currency(String);

impl Currency {
    /// Create a new currency from code.
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Get the currency code.
    pub fn code(&self) -> &str {
        &self.0
    }

    /// Non-empty, ASCII alphanumeric, at most 12 characters.
    pub fn is_valid(&self) -> bool {
        !self.0.is_empty()
            && self.0.len() <= 12
            && self.0.chars().all(|c| c.is_ascii_alphanumeric())
    }

    pub fn usdx() -> Self {
        Self::new("USDx")
    }

    pub fn eurx() -> Self {
        Self::new("EURx")
    }

    pub fn cngn() -> Self {
        Self::new("cNGN")
    }

    pub fn cxaf() -> Self {
        Self::new("cXAF")
    }

    /// Currencies every new wallet holds by default.
    pub fn defaults() -> Vec<Currency> {
        vec![Self::cngn(), Self::cxaf(), Self::usdx(), Self::eurx()]
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Currency {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Currency {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Per-currency balances of a wallet, ordered by currency code.
pub type Balances = BTreeMap<Currency, Decimal>;

/// Check that an operation amount is strictly positive.
pub fn is_positive_amount(amount: Decimal) -> bool {
    amount > Decimal::ZERO
}
