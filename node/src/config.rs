//! Node configuration.

use std::time::Duration;

use fxwallet_common::{constants, parse_duration};
use fxwallet_fx::RateStoreConfig;
use fxwallet_ledger::LedgerConfig;

/// Main node configuration.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Node ID. Generated at startup when absent.
    pub node_id: Option<String>,
    /// Rate store and ticker configuration.
    pub rate_store: RateStoreConfig,
    /// Ledger configuration.
    pub ledger: LedgerConfig,
    /// How long `stop` waits for in-flight ledger operations.
    pub drain_timeout: Duration,
    /// Log level.
    pub log_level: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            node_id: None,
            rate_store: RateStoreConfig::default(),
            ledger: LedgerConfig::default(),
            drain_timeout: constants::DEFAULT_DRAIN_TIMEOUT,
            log_level: "info".to_string(),
        }
    }
}

impl NodeConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup`. Unparsable values keep their default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(id) = lookup("NODE_ID").filter(|id| !id.trim().is_empty()) {
            config.node_id = Some(id);
        }

        if let Some(interval) = lookup("FX_TICK_INTERVAL_SECS")
            .and_then(|v| parse_duration(&v, Duration::from_secs(1)))
        {
            config.rate_store.tick_interval = interval;
        }

        if let Some(dynamic) = lookup("FX_DYNAMIC_RATES").and_then(|v| parse_flag(&v)) {
            config.rate_store.dynamic = dynamic;
        }

        if let Some(seed) = lookup("FX_RATE_SEED").and_then(|v| v.trim().parse().ok()) {
            config.rate_store.seed = Some(seed);
        }

        if let Some(timeout) = lookup("LEDGER_LOCK_TIMEOUT_MS")
            .and_then(|v| parse_duration(&v, Duration::from_millis(1)))
        {
            config.ledger.lock_timeout = timeout;
        }

        if let Some(timeout) = lookup("NODE_DRAIN_TIMEOUT_SECS")
            .and_then(|v| parse_duration(&v, Duration::from_secs(1)))
        {
            config.drain_timeout = timeout;
        }

        if let Some(level) = lookup("LOG_LEVEL") {
            config.log_level = level;
        }

        config
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.rate_store.tick_interval.is_zero() {
            return Err("Tick interval cannot be 0".to_string());
        }

        if self.ledger.lock_timeout.is_zero() {
            return Err("Lock timeout cannot be 0".to_string());
        }

        if self.ledger.supported_currencies.is_empty() {
            return Err("Supported currency set cannot be empty".to_string());
        }

        if let Some(bad) = self
            .ledger
            .supported_currencies
            .iter()
            .find(|c| !c.is_valid())
        {
            return Err(format!("Invalid currency code: {bad}"));
        }

        if !self
            .ledger
            .supported_currencies
            .contains(&self.ledger.reference_currency)
        {
            return Err(format!(
                "Reference currency {} is not a supported currency",
                self.ledger.reference_currency
            ));
        }

        Ok(())
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
