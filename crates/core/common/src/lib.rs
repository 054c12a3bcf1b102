//! Common types for the depth-diff order book synchronizer
//!
//! Prices and quantities are exact decimals; sequence ids are `u64`.

#![deny(clippy::all)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod market;
pub mod types;

pub use market::{DEPTH_UPDATE_EVENT, DepthDiff, DepthSnapshot, PriceLevel};
pub use types::*;
