//! Order book types and data structures.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Single price level in an order book.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Level {
    /// Price at this level. Unique within one side of a book.
    pub price: Decimal,
    /// Total volume resting at this price.
    pub volume: Decimal,
}

impl Level {
    /// Create a new price level.
    pub fn new(price: Decimal, volume: Decimal) -> Self {
        Self { price, volume }
    }

    /// Whether this level signals removal.
    pub fn is_empty(&self) -> bool {
        self.volume.is_zero()
    }
}

/// Side of the book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum BookSide {
    /// Resting buy interest.
    Bid,
    /// Resting sell interest.
    Ask,
}

/// Best price and aggregate volume of one book side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SideSummary {
    /// Best price on the side, `None` when the side is empty.
    pub best: Option<Decimal>,
    /// Sum of volume over every retained level.
    pub total_volume: Decimal,
}

/// Aggregates the position rules are evaluated against.
///
/// A best price is `None` while its side holds no level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BookTop {
    /// Highest bid price.
    pub best_bid: Option<Decimal>,
    /// Total bid volume.
    pub total_bid_volume: Decimal,
    /// Lowest ask price.
    pub best_ask: Option<Decimal>,
    /// Total ask volume.
    pub total_ask_volume: Decimal,
}

impl BookTop {
    /// Combine two side summaries.
    pub fn from_sides(bid: SideSummary, ask: SideSummary) -> Self {
        Self {
            best_bid: bid.best,
            total_bid_volume: bid.total_volume,
            best_ask: ask.best,
            total_ask_volume: ask.total_volume,
        }
    }

    /// Whether both sides hold at least one level.
    pub fn is_two_sided(&self) -> bool {
        self.best_bid.is_some() && self.best_ask.is_some()
    }

    /// Bid volume minus ask volume; positive means buying pressure.
    pub fn imbalance(&self) -> Decimal {
        self.total_bid_volume - self.total_ask_volume
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn level_creation() {
        let level = Level::new(dec!(100.5), dec!(3));
        assert_eq!(level.price, dec!(100.5));
        assert_eq!(level.volume, dec!(3));
        assert!(!level.is_empty());
        assert!(Level::new(dec!(100.5), dec!(0)).is_empty());
    }

    #[test]
    fn one_sided_top_keeps_the_present_side() {
        let bid = SideSummary {
            best: Some(dec!(99)),
            total_volume: dec!(50),
        };
        let top = BookTop::from_sides(bid, SideSummary::default());

        assert!(!top.is_two_sided());
        assert_eq!(top.best_bid, Some(dec!(99)));
        assert_eq!(top.best_ask, None);
        assert_eq!(top.imbalance(), dec!(50));
    }

    #[test]
    fn book_top_imbalance() {
        let bid = SideSummary {
            best: Some(dec!(99)),
            total_volume: dec!(50),
        };
        let ask = SideSummary {
            best: Some(dec!(100)),
            total_volume: dec!(10),
        };
        let top = BookTop::from_sides(bid, ask);

        assert!(top.is_two_sided());
        assert_eq!(top.imbalance(), dec!(40));
    }
}
