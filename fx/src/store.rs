//! The authoritative in-memory rate table and its periodic mutation.

use std::sync::Arc;
use std::time::Duration;

use fxwallet_common::{constants, Currency};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use tokio::sync::{watch, RwLock};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};

use crate::broadcaster::{RateBroadcaster, RateSubscription};
use crate::error::FxResult;
use crate::log::{RateLog, RateLogEntry};
use crate::table::{RateSnapshot, RateTable};

/// Decimal places kept on fluctuated rates.
pub const RATE_SCALE: u32 = 10;

/// Configuration for the rate store.
#[derive(Debug, Clone)]
pub struct RateStoreConfig {
    /// Interval between ticks.
    pub tick_interval: Duration,
    /// Whether ticks mutate rates. When off, ticks only re-publish.
    pub dynamic: bool,
    /// Half-width of the fluctuation band in basis points (50 = ±0.5%).
    pub fluctuation_bps: u32,
    /// Fixed RNG seed for reproducible runs.
    pub seed: Option<u64>,
}

impl Default for RateStoreConfig {
    fn default() -> Self {
        Self {
            tick_interval: constants::DEFAULT_TICK_INTERVAL,
            dynamic: true,
            fluctuation_bps: 50,
            seed: None,
        }
    }
}

/// Outcome of one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Pairs whose rate was fluctuated.
    pub pairs_updated: usize,
    /// Log entries that failed to persist (mutation kept).
    pub log_failures: usize,
    /// Subscribers that received the snapshot.
    pub delivered: usize,
    /// Subscribers evicted during the publish.
    pub evicted: usize,
}

/// Holds current rates behind a table-wide read/write lock.
///
/// Reads share the lock; a tick holds it exclusively for its whole pass, so
/// ticks never overlap and readers never see a half-updated table.
pub struct RateStore {
    table: RwLock<RateTable>,
    log: Arc<dyn RateLog>,
    broadcaster: RateBroadcaster,
    rng: Mutex<StdRng>,
    config: RateStoreConfig,
}

impl RateStore {
    /// Create a store seeded with the default rate table.
    pub fn new(log: Arc<dyn RateLog>, config: RateStoreConfig) -> Self {
        Self::with_table(RateTable::seeded(), log, config)
    }

    /// Create a store over an explicit table.
    pub fn with_table(table: RateTable, log: Arc<dyn RateLog>, config: RateStoreConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            table: RwLock::new(table),
            log,
            broadcaster: RateBroadcaster::new(),
            rng: Mutex::new(rng),
            config,
        }
    }

    /// Current rate for `from -> to`. `from == to` is always 1.
    #[instrument(level = "debug", skip(self))]
    pub async fn get_rate(&self, from: &Currency, to: &Currency) -> FxResult<Decimal> {
        if from == to {
            return Ok(Decimal::ONE);
        }
        self.table.read().await.get_rate(from, to)
    }

    /// Immutable copy of the current table.
    pub async fn snapshot(&self) -> RateSnapshot {
        let table = self.table.read().await;
        RateSnapshot::new(table.clone(), fxwallet_common::now())
    }

    /// Register a snapshot subscriber.
    pub fn subscribe(&self) -> FxResult<RateSubscription> {
        self.broadcaster.subscribe()
    }

    pub fn broadcaster(&self) -> &RateBroadcaster {
        &self.broadcaster
    }

    /// The rate log this store persists into.
    pub fn log(&self) -> &Arc<dyn RateLog> {
        &self.log
    }

    pub fn config(&self) -> &RateStoreConfig {
        &self.config
    }

    /// One scheduled pass: fluctuate every pair, log each new rate, then
    /// publish a snapshot.
    ///
    /// A failed log write is logged and skipped; the in-memory rate keeps
    /// its new value and the pass continues.
    pub async fn tick(&self) -> TickReport {
        let mut report = TickReport::default();
        let mut table = self.table.write().await;

        if self.config.dynamic {
            for (from, to, rate) in table.iter_mut() {
                let next = (*rate * self.next_fluctuation()).round_dp(RATE_SCALE);
                if next > Decimal::ZERO {
                    *rate = next;
                }
                report.pairs_updated += 1;

                let entry = RateLogEntry::new(from.clone(), to.clone(), *rate);
                if let Err(e) = self.log.append(entry).await {
                    report.log_failures += 1;
                    warn!(from = %from, to = %to, error = %e, "Failed to log FX rate");
                }
            }
        }

        let snapshot = Arc::new(RateSnapshot::new(table.clone(), fxwallet_common::now()));
        drop(table);

        match self.broadcaster.publish(snapshot) {
            Ok(outcome) => {
                report.delivered = outcome.delivered;
                report.evicted = outcome.evicted;
            }
            Err(e) => debug!(error = %e, "Snapshot not published"),
        }

        debug!(
            pairs_updated = report.pairs_updated,
            log_failures = report.log_failures,
            delivered = report.delivered,
            "Rate tick complete"
        );

        report
    }

    /// Drive `tick` on the configured interval until `shutdown` flips to
    /// true or its sender is dropped, then close every subscriber queue.
    pub async fn run_ticker(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.config.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick fires immediately; rates first move one interval after start.
        ticker.tick().await;

        info!(
            interval_ms = self.config.tick_interval.as_millis() as u64,
            dynamic = self.config.dynamic,
            "Rate ticker started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        let closed = self.broadcaster.shutdown();
        info!(closed, "Rate ticker stopped");
    }

    /// Multiplicative factor drawn uniformly from the configured band.
    fn next_fluctuation(&self) -> Decimal {
        let half_width = i64::from(self.config.fluctuation_bps) * 1_000;
        let offset = self.rng.lock().gen_range(-half_width..=half_width);
        // 1.0 at scale 7, shifted by the offset: 50 bps -> [0.995, 1.005].
        Decimal::new(10_000_000 + offset, 7)
    }
}
