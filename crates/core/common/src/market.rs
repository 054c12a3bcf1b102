//! Depth snapshot and depth-diff events in the exchange wire format

use crate::{Px, Qty};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Event tag carried by every diff on the depth stream
pub const DEPTH_UPDATE_EVENT: &str = "depthUpdate";

/// A (price, aggregate quantity) pair
///
/// On the wire this is a two-element array of decimal strings,
/// e.g. `["64250.01000000", "0.50000000"]`. Quantity zero in an update
/// means "remove this level".
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "(Px, Qty)", into = "(Px, Qty)")]
pub struct PriceLevel {
    /// Level price
    pub price: Px,
    /// Aggregate quantity at the price
    pub qty: Qty,
}

impl PriceLevel {
    /// Create a new price level
    #[must_use]
    pub const fn new(price: Decimal, qty: Decimal) -> Self {
        Self {
            price: Px::new(price),
            qty: Qty::new(qty),
        }
    }
}

impl From<(Px, Qty)> for PriceLevel {
    fn from((price, qty): (Px, Qty)) -> Self {
        Self { price, qty }
    }
}

impl From<PriceLevel> for (Px, Qty) {
    fn from(level: PriceLevel) -> Self {
        (level.price, level.qty)
    }
}

/// Full order book as of `last_update_id` (REST depth endpoint)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepthSnapshot {
    /// Sequence id the snapshot is current as of
    #[serde(rename = "lastUpdateId")]
    pub last_update_id: u64,
    /// Bid levels
    pub bids: Vec<PriceLevel>,
    /// Ask levels
    pub asks: Vec<PriceLevel>,
}

/// Incremental depth change covering sequence range `[U, u]`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepthDiff {
    /// Event type, always `depthUpdate`
    #[serde(rename = "e", default = "depth_update_tag")]
    pub event_type: String,
    /// Exchange event time in milliseconds
    #[serde(rename = "E", default)]
    pub event_time: u64,
    /// Exchange symbol
    #[serde(rename = "s", default)]
    pub symbol: String,
    /// First update id in the event (`U`)
    #[serde(rename = "U")]
    pub first_update_id: u64,
    /// Final update id in the event (`u`)
    #[serde(rename = "u")]
    pub final_update_id: u64,
    /// Changed bid levels
    #[serde(rename = "b", default)]
    pub bids: Vec<PriceLevel>,
    /// Changed ask levels
    #[serde(rename = "a", default)]
    pub asks: Vec<PriceLevel>,
}

fn depth_update_tag() -> String {
    DEPTH_UPDATE_EVENT.to_string()
}

impl DepthDiff {
    /// Create a diff covering `[first_update_id, final_update_id]`
    #[must_use]
    pub fn new(
        first_update_id: u64,
        final_update_id: u64,
        bids: Vec<PriceLevel>,
        asks: Vec<PriceLevel>,
    ) -> Self {
        Self {
            event_type: depth_update_tag(),
            event_time: 0,
            symbol: String::new(),
            first_update_id,
            final_update_id,
            bids,
            asks,
        }
    }

    /// `U <= u`
    #[must_use]
    pub const fn is_well_formed(&self) -> bool {
        self.first_update_id <= self.final_update_id
    }
}
