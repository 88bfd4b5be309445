//! Bounded-depth level-2 book for one instrument.
//!
//! Both sides are kept sorted by price ascending. Bids are therefore best at
//! the back and asks best at the front; trimming drops from the opposite end.

use rust_decimal::Decimal;
use smallvec::SmallVec;

use super::types::{BookSide, BookTop, Level, SideSummary};
use crate::error::MarketDataError;
use crate::market::BookMessage;

/// Default number of retained levels per side.
pub const DEFAULT_DEPTH: usize = 10;

type Ladder = SmallVec<[Level; 16]>;

/// Bid and ask ladders bounded to `depth` levels each.
#[derive(Debug, Clone, PartialEq)]
pub struct BookModel {
    bids: Ladder,
    asks: Ladder,
    depth: usize,
}

impl Default for BookModel {
    fn default() -> Self {
        Self::new(DEFAULT_DEPTH)
    }
}

impl BookModel {
    /// Create an empty book retaining at most `depth` levels per side.
    pub fn new(depth: usize) -> Self {
        Self {
            bids: Ladder::new(),
            asks: Ladder::new(),
            depth,
        }
    }

    /// Configured depth.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Bid levels, ascending by price.
    pub fn bids(&self) -> &[Level] {
        &self.bids
    }

    /// Ask levels, ascending by price.
    pub fn asks(&self) -> &[Level] {
        &self.asks
    }

    /// Discard every level and load the given ones.
    ///
    /// Zero-volume levels in a snapshot are ignored.
    pub fn apply_snapshot(&mut self, bids: &[Level], asks: &[Level]) {
        self.bids.clear();
        self.asks.clear();

        for level in bids {
            self.upsert(BookSide::Bid, level.price, level.volume);
        }
        for level in asks {
            self.upsert(BookSide::Ask, level.price, level.volume);
        }
    }

    /// Insert, overwrite or (for volume 0) remove the level at `price`.
    pub fn upsert(&mut self, side: BookSide, price: Decimal, volume: Decimal) {
        let ladder = self.ladder_mut(side);
        let found = ladder.binary_search_by(|level| level.price.cmp(&price));

        match (found, volume.is_zero()) {
            (Ok(idx), true) => {
                ladder.remove(idx);
            }
            (Err(_), true) => {}
            (Ok(idx), false) => ladder[idx].volume = volume,
            (Err(idx), false) => ladder.insert(idx, Level::new(price, volume)),
        }

        self.trim(self.depth);
    }

    /// Drop the worst-priced excess so each side holds at most `depth` levels.
    pub fn trim(&mut self, depth: usize) {
        if self.bids.len() > depth {
            let excess = self.bids.len() - depth;
            self.bids.drain(..excess);
        }
        if self.asks.len() > depth {
            self.asks.truncate(depth);
        }
    }

    /// Highest bid and total bid volume.
    pub fn best_bid(&self) -> SideSummary {
        SideSummary {
            best: self.bids.last().map(|l| l.price),
            total_volume: self.bids.iter().map(|l| l.volume).sum(),
        }
    }

    /// Lowest ask and total ask volume.
    pub fn best_ask(&self) -> SideSummary {
        SideSummary {
            best: self.asks.first().map(|l| l.price),
            total_volume: self.asks.iter().map(|l| l.volume).sum(),
        }
    }

    /// Both sides' aggregates.
    pub fn top(&self) -> BookTop {
        BookTop::from_sides(self.best_bid(), self.best_ask())
    }

    /// Apply a feed message.
    ///
    /// Every level is validated before the book is touched, so a rejected
    /// message leaves the book unchanged.
    pub fn apply(&mut self, message: &BookMessage) -> Result<(), MarketDataError> {
        for level in message.bids.iter().chain(&message.asks) {
            if level.price <= Decimal::ZERO || level.volume < Decimal::ZERO {
                return Err(MarketDataError::InvalidLevel {
                    symbol: message.symbol.clone(),
                    price: level.price,
                    volume: level.volume,
                });
            }
        }

        if message.is_snapshot {
            self.apply_snapshot(&message.bids, &message.asks);
            return Ok(());
        }

        for level in &message.bids {
            self.upsert(BookSide::Bid, level.price, level.volume);
        }
        for level in &message.asks {
            self.upsert(BookSide::Ask, level.price, level.volume);
        }

        Ok(())
    }

    fn ladder_mut(&mut self, side: BookSide) -> &mut Ladder {
        match side {
            BookSide::Bid => &mut self.bids,
            BookSide::Ask => &mut self.asks,
        }
    }
}
