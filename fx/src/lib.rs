//! FxWallet FX Engine
//!
//! In-memory FX rate store with scheduled fluctuation, an append-only rate
//! log, and a broadcaster that fans snapshots out to subscribers.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use fxwallet_fx::{InMemoryRateLog, RateStore, RateStoreConfig};
//! use fxwallet_common::Currency;
//!
//! let store = RateStore::new(Arc::new(InMemoryRateLog::new()), RateStoreConfig::default());
//! let rate = store.get_rate(&Currency::usdx(), &Currency::cngn()).await?;
//!
//! let mut updates = store.subscribe()?;
//! while let Some(snapshot) = updates.recv().await {
//!     println!("{}", snapshot.to_json());
//! }
//! ```

pub mod broadcaster;
pub mod error;
pub mod log;
pub mod store;
pub mod table;

pub use broadcaster::{
    BroadcastStats, PublishOutcome, RateBroadcaster, RateSubscription, SubscriberId,
};
pub use error::{FxError, FxResult};
pub use log::{InMemoryRateLog, RateLog, RateLogEntry};
pub use store::{RateStore, RateStoreConfig, TickReport};
pub use table::{RateSnapshot, RateTable};
