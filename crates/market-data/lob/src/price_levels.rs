//! Price level management for one side of the order book

use common::{PriceLevel, Px, Qty, Side};
use std::collections::BTreeMap;

/// One side of the order book (bid or ask)
///
/// Levels are kept in a `BTreeMap` keyed by exact-decimal price, so
/// best-first iteration never re-sorts the side. Bids are walked from the
/// highest key, asks from the lowest. Every stored quantity is strictly
/// positive.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SideBook {
    side: Side,
    levels: BTreeMap<Px, Qty>,
}

impl SideBook {
    /// Create a new empty side book
    #[must_use]
    pub const fn new(side: Side) -> Self {
        Self {
            side,
            levels: BTreeMap::new(),
        }
    }

    /// Clear all levels
    pub fn clear(&mut self) {
        self.levels.clear();
    }

    /// Replace every level; non-positive quantities are not stored
    pub fn replace(&mut self, levels: &[PriceLevel]) {
        self.levels.clear();
        for level in levels {
            if level.qty.is_positive() {
                self.levels.insert(level.price, level.qty);
            }
        }
    }

    /// Set a level (absolute replace); zero removes it
    ///
    /// Removing a price that is not present is a no-op.
    pub fn set(&mut self, price: Px, qty: Qty) {
        if qty.is_positive() {
            self.levels.insert(price, qty);
        } else {
            self.levels.remove(&price);
        }
    }

    /// Quantity resting at `price`
    #[must_use]
    pub fn get(&self, price: Px) -> Option<Qty> {
        self.levels.get(&price).copied()
    }

    /// Best level on this side
    #[must_use]
    pub fn best(&self) -> Option<PriceLevel> {
        self.iter_best().next()
    }

    /// Up to `n` levels, best first
    #[must_use]
    pub fn top(&self, n: usize) -> Vec<PriceLevel> {
        self.iter_best().take(n).collect()
    }

    /// Iterate levels best first
    pub fn iter_best(&self) -> Box<dyn Iterator<Item = PriceLevel> + '_> {
        let levels = self.levels.iter().map(|(&price, &qty)| PriceLevel { price, qty });
        match self.side {
            Side::Bid => Box::new(levels.rev()),
            Side::Ask => Box::new(levels),
        }
    }

    /// Number of price levels
    #[must_use]
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    /// Check if the side has no levels
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}
