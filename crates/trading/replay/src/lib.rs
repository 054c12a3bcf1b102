//! Deterministic order book reconstruction from a depth journal
//!
//! Records are trusted as validated when they were written: snapshots replace
//! the book, diffs are merged in file order, nothing is re-checked.

#![deny(clippy::all)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod replayer;

pub use error::ReplayError;
pub use replayer::{ReplayConfig, ReplaySummary, Replayer};
