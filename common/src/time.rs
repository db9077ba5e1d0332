//! Time utilities and constants for FxWallet.

use chrono::{DateTime, Utc};
use std::time::Duration;

/// Timing constants.
pub mod constants {
    use super::Duration;

    /// Default interval between rate store ticks (5 hours).
    pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(5 * 60 * 60);

    /// Default bound on waiting for a contended wallet lock (5 seconds).
    pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

    /// Default time to wait for in-flight ledger operations on shutdown (30 seconds).
    pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);
}

/// A UTC timestamp.
pub type Timestamp = DateTime<Utc>;

/// Get the current timestamp.
pub fn now() -> Timestamp {
    Utc::now()
}

/// Parse a whole number of units from an environment value, ignoring blanks.
pub fn parse_duration(value: &str, unit: Duration) -> Option<Duration> {
    let n: u32 = value.trim().parse().ok()?;
    Some(unit * n)
}
