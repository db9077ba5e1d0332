//! FxWallet Node
//!
//! Runs the FX rate store with its scheduled ticker, the snapshot
//! broadcaster and the wallet ledger in one process, and shuts them down in
//! order: new operations refused, ticker stopped, subscriber queues closed,
//! in-flight ledger operations drained.

pub mod config;
pub mod error;
pub mod node;
pub mod state;

pub use config::NodeConfig;
pub use error::{NodeError, NodeResult};
pub use node::{Node, ShutdownReport};
pub use state::NodeState;
