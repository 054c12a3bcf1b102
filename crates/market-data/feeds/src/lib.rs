//! Exchange depth feeds and order book synchronization
//!
//! - [`source`]: snapshot and diff-stream traits
//! - [`binance`]: Binance REST snapshot + WebSocket diff stream
//! - [`sync`]: the per-symbol synchronizer and the live session driving it

#![deny(clippy::all)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod binance;
pub mod config;
pub mod error;
pub mod source;
pub mod sync;

pub use binance::BinanceFeed;
pub use config::{FeedConfig, MIN_RECONNECT_DELAY_MS};
pub use error::{FeedError, SessionError, SyncError, SyncViolation};
pub use source::{DiffStream, DiffStreamSource, SnapshotSource};
pub use sync::{
    DiffOutcome, DrainReport, SessionReport, SyncSession, SyncState, SyncStats, Synchronizer,
};
