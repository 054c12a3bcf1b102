//! Limit order book state for depth-diff reconstruction
//!
//! Exact-decimal price levels in ordered maps; snapshots replace a side
//! wholesale, diffs overwrite or remove individual levels.

#![deny(clippy::all)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod book;
pub mod price_levels;

pub use book::{BookDepth, OrderBook};
pub use price_levels::SideBook;
