//! Core order book implementation

use crate::price_levels::SideBook;
use common::{DepthDiff, PriceLevel, Side};
use tracing::trace;

/// Top-of-book view: best `n` bids (descending) and asks (ascending)
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BookDepth {
    /// Bid levels, highest price first
    pub bids: Vec<PriceLevel>,
    /// Ask levels, lowest price first
    pub asks: Vec<PriceLevel>,
}

/// Full order book for a single symbol
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderBook {
    /// Bid side (buyers)
    pub bids: SideBook,
    /// Ask side (sellers)
    pub asks: SideBook,
}

impl Default for OrderBook {
    fn default() -> Self {
        Self::new()
    }
}

impl OrderBook {
    /// Create a new empty order book
    #[must_use]
    pub const fn new() -> Self {
        Self {
            bids: SideBook::new(Side::Bid),
            asks: SideBook::new(Side::Ask),
        }
    }

    /// Replace both sides wholesale with a snapshot's levels
    pub fn apply_snapshot(&mut self, bids: &[PriceLevel], asks: &[PriceLevel]) {
        self.bids.replace(bids);
        self.asks.replace(asks);
        trace!(
            "Loaded snapshot levels: {} bids, {} asks",
            self.bids.len(),
            self.asks.len()
        );
    }

    /// Apply a depth diff: each change overwrites its level, zero removes it
    ///
    /// Sequence ids are not checked here; continuity is the caller's job.
    pub fn apply_diff(&mut self, diff: &DepthDiff) {
        for level in &diff.bids {
            self.bids.set(level.price, level.qty);
        }
        for level in &diff.asks {
            self.asks.set(level.price, level.qty);
        }
    }

    /// The `n` best levels on each side
    #[must_use]
    pub fn top_levels(&self, n: usize) -> BookDepth {
        BookDepth {
            bids: self.bids.top(n),
            asks: self.asks.top(n),
        }
    }

    /// Get the best bid
    #[must_use]
    pub fn best_bid(&self) -> Option<PriceLevel> {
        self.bids.best()
    }

    /// Get the best ask
    #[must_use]
    pub fn best_ask(&self) -> Option<PriceLevel> {
        self.asks.best()
    }

    /// Check if both sides are empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }

    /// Clear the entire book
    pub fn clear(&mut self) {
        self.bids.clear();
        self.asks.clear();
    }
}
