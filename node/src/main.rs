//! FxWallet Node Binary
//!
//! Runs the rate ticker and the wallet ledger until Ctrl+C, then shuts down
//! gracefully.

use std::sync::Arc;

use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fxwallet_fx::RateStore;
use fxwallet_node::{Node, NodeConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = NodeConfig::from_env();

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| config.log_level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting FxWallet node");

    if let Err(e) = config.validate() {
        error!(error = %e, "Invalid configuration");
        return Err(anyhow::anyhow!("Configuration error: {}", e));
    }

    // Generate node ID if not provided
    let node_id = config
        .node_id
        .clone()
        .unwrap_or_else(|| format!("fxwallet-node-{}", uuid::Uuid::new_v4()));

    info!(node_id = %node_id, "Node ID assigned");

    let node = Arc::new(Node::new(config, node_id.clone())?);
    node.start()?;

    let feed = tokio::spawn(log_snapshots(node.rates().clone()));

    info!(
        node_id = %node_id,
        currencies = node.config().ledger.supported_currencies.len(),
        "Node running"
    );

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    let report = node.stop().await?;
    if let Err(e) = feed.await {
        warn!(error = %e, "Snapshot feed task failed");
    }

    info!(
        drained = report.drained,
        in_flight_remaining = report.in_flight_remaining,
        "Node shutdown complete"
    );
    Ok(())
}

/// Log every published snapshot, resubscribing after an eviction, until the
/// broadcaster shuts down.
async fn log_snapshots(rates: Arc<RateStore>) {
    loop {
        let mut subscription = match rates.subscribe() {
            Ok(subscription) => subscription,
            Err(e) => {
                debug!(error = %e, "Snapshot feed closed");
                return;
            }
        };

        while let Some(snapshot) = subscription.recv().await {
            debug!(
                taken_at = %snapshot.taken_at,
                rates = %snapshot.to_json(),
                "Rate snapshot"
            );
        }

        if rates.broadcaster().is_shut_down() {
            return;
        }
        warn!(subscriber = %subscription.id(), "Snapshot feed evicted, resubscribing");
    }
}
