//! Node lifecycle: wires the rate store, its ticker and the ledger together
//! and tears them down in order.

use std::sync::Arc;

use fxwallet_fx::{InMemoryRateLog, RateLog, RateStore};
use fxwallet_ledger::{InMemoryJournal, Journal, TransactionEngine};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};

use crate::config::NodeConfig;
use crate::error::{NodeError, NodeResult};
use crate::state::NodeState;

/// What `stop` observed while shutting down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ShutdownReport {
    /// Every in-flight ledger operation finished within the drain timeout.
    pub drained: bool,
    /// Operations still running when the drain gave up.
    pub in_flight_remaining: u64,
}

/// One FxWallet process.
pub struct Node {
    config: NodeConfig,
    node_id: String,
    state: Arc<RwLock<NodeState>>,
    rates: Arc<RateStore>,
    engine: Arc<TransactionEngine>,
    shutdown_tx: watch::Sender<bool>,
    ticker: Mutex<Option<JoinHandle<()>>>,
}

impl Node {
    /// Create a node over in-memory persistence.
    pub fn new(config: NodeConfig, node_id: String) -> NodeResult<Self> {
        Self::with_backends(
            config,
            node_id,
            Arc::new(InMemoryRateLog::new()),
            Arc::new(InMemoryJournal::new()),
        )
    }

    /// Create a node over the given rate log and journal.
    pub fn with_backends(
        config: NodeConfig,
        node_id: String,
        rate_log: Arc<dyn RateLog>,
        journal: Arc<dyn Journal>,
    ) -> NodeResult<Self> {
        config.validate().map_err(NodeError::InvalidConfig)?;

        let rates = Arc::new(RateStore::new(rate_log, config.rate_store.clone()));
        let engine = Arc::new(TransactionEngine::new(
            rates.clone(),
            journal,
            config.ledger.clone(),
        ));
        let (shutdown_tx, _) = watch::channel(false);

        Ok(Self {
            config,
            node_id,
            state: Arc::new(RwLock::new(NodeState::Starting)),
            rates,
            engine,
            shutdown_tx,
            ticker: Mutex::new(None),
        })
    }

    /// Start the rate ticker and begin accepting ledger operations.
    #[instrument(skip(self), fields(node_id = %self.node_id))]
    pub fn start(&self) -> NodeResult<()> {
        {
            let mut state = self.state.write();
            if *state != NodeState::Starting {
                return Err(NodeError::InvalidState {
                    state: *state,
                    action: "start",
                });
            }
            *state = NodeState::Running;
        }

        let handle = tokio::spawn(self.rates.clone().run_ticker(self.shutdown_tx.subscribe()));
        *self.ticker.lock() = Some(handle);

        info!(
            tick_interval_ms = self.config.rate_store.tick_interval.as_millis() as u64,
            dynamic = self.config.rate_store.dynamic,
            "Node started"
        );
        Ok(())
    }

    /// Stop gracefully: refuse new operations, stop the ticker (which closes
    /// every subscriber queue), then wait for in-flight operations to finish.
    #[instrument(skip(self), fields(node_id = %self.node_id))]
    pub async fn stop(&self) -> NodeResult<ShutdownReport> {
        {
            let mut state = self.state.write();
            match *state {
                NodeState::ShuttingDown | NodeState::Stopped => {
                    return Err(NodeError::InvalidState {
                        state: *state,
                        action: "stop",
                    });
                }
                _ => *state = NodeState::ShuttingDown,
            }
        }
        info!("Stopping node");

        self.engine.shutdown();

        // No receivers means the ticker never started.
        let _ = self.shutdown_tx.send(true);
        let ticker = self.ticker.lock().take();
        if let Some(handle) = ticker {
            if let Err(e) = handle.await {
                error!(error = %e, "Rate ticker task failed");
            }
        }
        // Idempotent; covers a node stopped before it started.
        self.rates.broadcaster().shutdown();

        let drained = self.engine.wait_idle(self.config.drain_timeout).await;
        let report = ShutdownReport {
            drained,
            in_flight_remaining: self.engine.in_flight(),
        };
        if !drained {
            warn!(
                in_flight = report.in_flight_remaining,
                drain_timeout_ms = self.config.drain_timeout.as_millis() as u64,
                "Drain timed out with ledger operations still running"
            );
        }

        *self.state.write() = NodeState::Stopped;
        info!(drained, "Node stopped");
        Ok(report)
    }

    pub fn state(&self) -> NodeState {
        *self.state.read()
    }

    pub fn is_accepting_requests(&self) -> bool {
        self.state().accepts_requests()
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// The rate store, for rate reads and snapshot subscriptions.
    pub fn rates(&self) -> &Arc<RateStore> {
        &self.rates
    }

    /// The ledger engine.
    pub fn ledger(&self) -> &Arc<TransactionEngine> {
        &self.engine
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = NodeConfig::default();
        config.rate_store.tick_interval = Duration::ZERO;

        let result = Node::new(config, "node-test".to_string());
        assert!(matches!(result, Err(NodeError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_lifecycle_states() {
        let node = Node::new(NodeConfig::default(), "node-test".to_string()).unwrap();
        assert_eq!(node.state(), NodeState::Starting);
        assert!(!node.is_accepting_requests());

        node.start().unwrap();
        assert_eq!(node.state(), NodeState::Running);
        assert!(matches!(
            node.start(),
            Err(NodeError::InvalidState { state: NodeState::Running, .. })
        ));

        let report = node.stop().await.unwrap();
        assert!(report.drained);
        assert_eq!(node.state(), NodeState::Stopped);
        assert!(node.state().is_terminal());
        assert!(node.stop().await.is_err());
    }

    #[tokio::test]
    async fn test_stop_before_start_closes_subscribers() {
        let node = Node::new(NodeConfig::default(), "node-test".to_string()).unwrap();
        let mut sub = node.rates().subscribe().unwrap();

        node.stop().await.unwrap();

        assert!(sub.recv().await.is_none());
        assert!(node.rates().broadcaster().is_shut_down());
        assert!(!node.ledger().is_accepting());
    }
}
