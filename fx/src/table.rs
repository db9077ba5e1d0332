//! Rate table and immutable snapshots of it.

use std::collections::BTreeMap;

use fxwallet_common::{Currency, Timestamp};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::{FxError, FxResult};

/// Mapping of base currency to quote currency to a positive rate.
///
/// `X -> X` is never stored; lookups answer it with 1.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RateTable {
    rates: BTreeMap<Currency, BTreeMap<Currency, Decimal>>,
}

impl RateTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Table seeded with the exchange's base rates.
    pub fn seeded() -> Self {
        let seed: [(&str, [(&str, Decimal); 3]); 4] = [
            ("cNGN", [("USDx", dec!(0.0006)), ("EURx", dec!(0.0005)), ("cXAF", dec!(0.36))]),
            ("cXAF", [("USDx", dec!(0.0017)), ("EURx", dec!(0.0015)), ("cNGN", dec!(2.78))]),
            ("USDx", [("cNGN", dec!(1666.67)), ("cXAF", dec!(588.24)), ("EURx", dec!(0.88))]),
            ("EURx", [("cNGN", dec!(2000.0)), ("cXAF", dec!(666.67)), ("USDx", dec!(1.14))]),
        ];

        let mut table = Self::new();
        for (from, quotes) in seed {
            table.rates.insert(
                Currency::new(from),
                quotes
                    .into_iter()
                    .map(|(to, rate)| (Currency::new(to), rate))
                    .collect(),
            );
        }
        table
    }

    /// Look up the rate for `from -> to`.
    pub fn get_rate(&self, from: &Currency, to: &Currency) -> FxResult<Decimal> {
        if from == to {
            return Ok(Decimal::ONE);
        }
        let quotes = self
            .rates
            .get(from)
            .ok_or_else(|| FxError::UnsupportedCurrency(from.clone()))?;
        quotes
            .get(to)
            .copied()
            .ok_or_else(|| FxError::UnsupportedPair {
                from: from.clone(),
                to: to.clone(),
            })
    }

    /// Insert or replace a rate.
    pub fn set_rate(&mut self, from: Currency, to: Currency, rate: Decimal) -> FxResult<()> {
        if from == to || rate <= Decimal::ZERO {
            return Err(FxError::InvalidRate { from, to, rate });
        }
        self.rates.entry(from).or_default().insert(to, rate);
        Ok(())
    }

    /// All stored `(from, to)` pairs in code order.
    pub fn pairs(&self) -> Vec<(Currency, Currency)> {
        self.rates
            .iter()
            .flat_map(|(from, quotes)| quotes.keys().map(move |to| (from.clone(), to.clone())))
            .collect()
    }

    /// Mutable access to every stored rate, used by the tick pass.
    pub(crate) fn iter_mut(
        &mut self,
    ) -> impl Iterator<Item = (&Currency, &Currency, &mut Decimal)> {
        self.rates
            .iter_mut()
            .flat_map(|(from, quotes)| quotes.iter_mut().map(move |(to, rate)| (from, to, rate)))
    }

    /// Number of stored pairs.
    pub fn len(&self) -> usize {
        self.rates.values().map(BTreeMap::len).sum()
    }

    /// Check if no rates are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Immutable point-in-time copy of the rate table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateSnapshot {
    /// Deep copy of the table.
    pub rates: RateTable,
    /// When the copy was taken.
    pub taken_at: Timestamp,
}

impl RateSnapshot {
    pub fn new(rates: RateTable, taken_at: Timestamp) -> Self {
        Self { rates, taken_at }
    }

    /// Rate lookup against the frozen copy.
    pub fn get_rate(&self, from: &Currency, to: &Currency) -> FxResult<Decimal> {
        self.rates.get_rate(from, to)
    }

    /// Wire form for streaming: `{ base: { quote: rate } }` with numeric rates.
    pub fn to_json(&self) -> serde_json::Value {
        let mut out = serde_json::Map::new();
        for (from, quotes) in &self.rates.rates {
            let quotes: serde_json::Map<String, serde_json::Value> = quotes
                .iter()
                .map(|(to, rate)| {
                    let value = rate
                        .to_f64()
                        .and_then(serde_json::Number::from_f64)
                        .map(serde_json::Value::Number)
                        .unwrap_or(serde_json::Value::Null);
                    (to.code().to_string(), value)
                })
                .collect();
            out.insert(from.code().to_string(), serde_json::Value::Object(quotes));
        }
        serde_json::Value::Object(out)
    }
}
