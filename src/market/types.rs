//! Market data types: currency pairs, the currency basket and feed events.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, MarketDataError};
use crate::orderbook::Level;
use crate::trading::Side;

/// Quoted pair: `instrument` priced in `base` (e.g. `BTC/USD`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pair {
    /// Currency being priced.
    pub instrument: String,
    /// Currency the price is expressed in.
    pub base: String,
}

impl Pair {
    /// Create a pair from its two legs.
    pub fn new(instrument: impl Into<String>, base: impl Into<String>) -> Self {
        Self {
            instrument: instrument.into(),
            base: base.into(),
        }
    }

    /// Wire symbol, `INSTRUMENT/BASE`.
    pub fn symbol(&self) -> String {
        format!("{}/{}", self.instrument, self.base)
    }
}

impl fmt::Display for Pair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.instrument, self.base)
    }
}

impl FromStr for Pair {
    type Err = MarketDataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split('/');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(instrument), Some(base), None) if !instrument.is_empty() && !base.is_empty() => {
                Ok(Pair::new(instrument, base))
            }
            _ => Err(MarketDataError::InvalidPair(s.to_string())),
        }
    }
}

/// Route for converting one basket currency into another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversion {
    /// Pair the conversion trades.
    pub pair: Pair,
    /// Buy when acquiring the pair's instrument, sell when disposing of it.
    pub side: Side,
}

/// Ordered, fixed set of currencies fixed at startup.
///
/// The order defines the rate matrix indices and the orientation of
/// subscribed pairs: for `i < j` the pair is `symbols[j]/symbols[i]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Basket {
    symbols: Vec<String>,
}

impl Basket {
    /// Build a basket, rejecting empty or duplicate symbols.
    pub fn new<I, S>(symbols: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut out: Vec<String> = Vec::new();
        for symbol in symbols {
            let symbol = symbol.into().trim().to_uppercase();
            if symbol.is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "SYMBOLS",
                    reason: "empty currency symbol".to_string(),
                });
            }
            if out.contains(&symbol) {
                return Err(ConfigError::InvalidValue {
                    field: "SYMBOLS",
                    reason: format!("duplicate currency {}", symbol),
                });
            }
            out.push(symbol);
        }

        if out.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "SYMBOLS",
                reason: "basket is empty".to_string(),
            });
        }

        Ok(Self { symbols: out })
    }

    /// Number of currencies (the rate matrix dimension).
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// Whether the basket has no currencies. Never true for a constructed basket.
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Index of a currency.
    pub fn index(&self, symbol: &str) -> Option<usize> {
        self.symbols.iter().position(|s| s == symbol)
    }

    /// Currency at an index.
    pub fn symbol(&self, index: usize) -> Option<&str> {
        self.symbols.get(index).map(String::as_str)
    }

    /// All currencies in basket order.
    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    /// Every unordered pair exactly once, `N×(N−1)/2` in total.
    pub fn subscription_pairs(&self) -> Vec<Pair> {
        let mut pairs = Vec::with_capacity(self.len() * self.len().saturating_sub(1) / 2);
        for (i, base) in self.symbols.iter().enumerate() {
            for instrument in &self.symbols[i + 1..] {
                pairs.push(Pair::new(instrument.clone(), base.clone()));
            }
        }
        pairs
    }

    /// How to trade from one basket index into another over a subscribed pair.
    pub fn conversion(&self, from: usize, to: usize) -> Option<Conversion> {
        let from_symbol = self.symbol(from)?;
        let to_symbol = self.symbol(to)?;

        match from.cmp(&to) {
            std::cmp::Ordering::Equal => None,
            std::cmp::Ordering::Less => Some(Conversion {
                pair: Pair::new(to_symbol, from_symbol),
                side: Side::Buy,
            }),
            std::cmp::Ordering::Greater => Some(Conversion {
                pair: Pair::new(from_symbol, to_symbol),
                side: Side::Sell,
            }),
        }
    }
}

/// Best bid/ask for one pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tick {
    /// Pair symbol as delivered by the feed, `INSTRUMENT/BASE`.
    pub symbol: String,
    /// Best bid price.
    pub bid: Decimal,
    /// Quantity at best bid.
    pub bid_qty: Decimal,
    /// Best ask price.
    pub ask: Decimal,
    /// Quantity at best ask.
    pub ask_qty: Decimal,
}

/// Level-2 book message for one instrument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookMessage {
    /// Pair symbol, `INSTRUMENT/BASE`.
    pub symbol: String,
    /// Full replacement when true, incremental levels otherwise.
    pub is_snapshot: bool,
    /// Bid levels. Volume 0 removes the level on incremental messages.
    pub bids: Vec<Level>,
    /// Ask levels. Volume 0 removes the level on incremental messages.
    pub asks: Vec<Level>,
}

/// Feed channel a subscription is made on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Best bid/ask ticks.
    Ticker,
    /// Level-2 book at the given depth.
    Book {
        /// Levels per side requested from the exchange.
        depth: usize,
    },
}

impl Channel {
    /// Channel name on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            Channel::Ticker => "ticker",
            Channel::Book { .. } => "book",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn basket() -> Basket {
        Basket::new(["USD", "BTC", "ETH"]).unwrap()
    }

    #[test]
    fn pair_parses_instrument_and_base() {
        let pair: Pair = "BTC/USD".parse().unwrap();
        assert_eq!(pair.instrument, "BTC");
        assert_eq!(pair.base, "USD");
        assert_eq!(pair.symbol(), "BTC/USD");
    }

    #[test]
    fn pair_rejects_malformed_symbols() {
        for bad in ["ETHBTC", "BTC/", "/USD", "A/B/C", ""] {
            assert!(
                matches!(bad.parse::<Pair>(), Err(MarketDataError::InvalidPair(_))),
                "{bad:?} should not parse"
            );
        }
    }

    #[test]
    fn basket_indexes_symbols() {
        let basket = basket();
        assert_eq!(basket.index("BTC"), Some(1));
        assert_eq!(basket.index("ETH"), Some(2));
        assert_eq!(basket.index("SOL"), None);
        assert_eq!(basket.symbol(0), Some("USD"));
    }

    #[test]
    fn basket_rejects_duplicates_and_empty() {
        assert!(Basket::new(["USD", "usd"]).is_err());
        assert!(Basket::new(Vec::<String>::new()).is_err());
        assert!(Basket::new(["USD", " "]).is_err());
    }

    #[test]
    fn subscription_pairs_cover_each_unordered_pair_once() {
        let basket = Basket::new(["USD", "BTC", "ETH", "SOL"]).unwrap();
        let pairs: Vec<String> = basket.subscription_pairs().iter().map(Pair::symbol).collect();

        assert_eq!(pairs.len(), 6);
        assert_eq!(
            pairs,
            vec!["BTC/USD", "ETH/USD", "SOL/USD", "ETH/BTC", "SOL/BTC", "SOL/ETH"]
        );
    }

    #[test]
    fn conversion_orients_against_subscribed_pair() {
        let basket = basket();

        let buy = basket.conversion(0, 1).unwrap();
        assert_eq!(buy.pair.symbol(), "BTC/USD");
        assert_eq!(buy.side, Side::Buy);

        let sell = basket.conversion(2, 1).unwrap();
        assert_eq!(sell.pair.symbol(), "ETH/BTC");
        assert_eq!(sell.side, Side::Sell);

        assert!(basket.conversion(1, 1).is_none());
        assert!(basket.conversion(0, 7).is_none());
    }
}
