//! Strategy context shared by both engines.
//!
//! Built once at startup (usually from [`crate::config::Config::context`])
//! and passed by reference into every engine constructor.

use std::time::Duration;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::error::ConfigError;
use crate::market::Basket;
use crate::orderbook::DEFAULT_DEPTH;

/// Immutable parameters for the arbitrage and pressure engines.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyContext {
    /// Currency basket, fixed for the process lifetime.
    pub basket: Basket,
    /// Settlement currency every cycle starts and ends in.
    pub base_currency: String,
    /// Minimum compounded return, as a percentage, to emit a signal.
    pub tradeable_threshold: Decimal,
    /// Minimum book imbalance to open a position.
    pub entry_threshold: Decimal,
    /// Notional per trade, in the quote currency.
    pub trade_size: Decimal,
    /// Proportional fee charged per fill.
    pub fee: Decimal,
    /// Take-profit distance as a fraction of entry price.
    pub target_fraction: Decimal,
    /// Retained book levels per side.
    pub book_depth: usize,
    /// Minimum gap between two executed cycles.
    pub cooldown: Duration,
    base_index: usize,
}

impl StrategyContext {
    /// Start building a context with default thresholds.
    pub fn builder(basket: Basket, base_currency: impl Into<String>) -> StrategyContextBuilder {
        StrategyContextBuilder {
            basket,
            base_currency: base_currency.into().trim().to_uppercase(),
            tradeable_threshold: dec!(100.2),
            entry_threshold: dec!(30),
            trade_size: dec!(1000),
            fee: dec!(0.0025),
            target_fraction: dec!(0.008),
            book_depth: DEFAULT_DEPTH,
            cooldown: Duration::from_secs(10),
        }
    }

    /// Basket index of the settlement currency.
    pub fn base_index(&self) -> usize {
        self.base_index
    }

    /// Fee charged on one trade of `trade_size`.
    pub fn fee_cost(&self) -> Decimal {
        self.trade_size * self.fee
    }
}

/// Builder for [`StrategyContext`].
#[derive(Debug, Clone)]
pub struct StrategyContextBuilder {
    basket: Basket,
    base_currency: String,
    tradeable_threshold: Decimal,
    entry_threshold: Decimal,
    trade_size: Decimal,
    fee: Decimal,
    target_fraction: Decimal,
    book_depth: usize,
    cooldown: Duration,
}

impl StrategyContextBuilder {
    /// Set the tradeable threshold percentage.
    pub fn tradeable_threshold(mut self, value: Decimal) -> Self {
        self.tradeable_threshold = value;
        self
    }

    /// Set the entry imbalance threshold.
    pub fn entry_threshold(mut self, value: Decimal) -> Self {
        self.entry_threshold = value;
        self
    }

    /// Set the trade size.
    pub fn trade_size(mut self, value: Decimal) -> Self {
        self.trade_size = value;
        self
    }

    /// Set the per-fill fee.
    pub fn fee(mut self, value: Decimal) -> Self {
        self.fee = value;
        self
    }

    /// Set the take-profit fraction.
    pub fn target_fraction(mut self, value: Decimal) -> Self {
        self.target_fraction = value;
        self
    }

    /// Set the book depth.
    pub fn book_depth(mut self, value: usize) -> Self {
        self.book_depth = value;
        self
    }

    /// Set the execution cooldown.
    pub fn cooldown(mut self, value: Duration) -> Self {
        self.cooldown = value;
        self
    }

    /// Validate and build.
    pub fn build(self) -> Result<StrategyContext, ConfigError> {
        let base_index =
            self.basket
                .index(&self.base_currency)
                .ok_or_else(|| ConfigError::InvalidValue {
                    field: "BASE_CURRENCY",
                    reason: format!("{} is not in the basket", self.base_currency),
                })?;

        if self.basket.len() < 3 {
            return Err(ConfigError::InvalidValue {
                field: "SYMBOLS",
                reason: format!(
                    "at least 3 currencies are needed for a cycle, got {}",
                    self.basket.len()
                ),
            });
        }
        if self.trade_size <= Decimal::ZERO {
            return Err(ConfigError::InvalidValue {
                field: "TRADE_SIZE",
                reason: "must be positive".to_string(),
            });
        }
        if self.fee < Decimal::ZERO {
            return Err(ConfigError::InvalidValue {
                field: "FEE",
                reason: "must not be negative".to_string(),
            });
        }
        if self.target_fraction < Decimal::ZERO {
            return Err(ConfigError::InvalidValue {
                field: "TARGET_FRACTION",
                reason: "must not be negative".to_string(),
            });
        }
        if self.book_depth == 0 {
            return Err(ConfigError::InvalidValue {
                field: "BOOK_DEPTH",
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(StrategyContext {
            basket: self.basket,
            base_currency: self.base_currency,
            tradeable_threshold: self.tradeable_threshold,
            entry_threshold: self.entry_threshold,
            trade_size: self.trade_size,
            fee: self.fee,
            target_fraction: self.target_fraction,
            book_depth: self.book_depth,
            cooldown: self.cooldown,
            base_index,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn basket() -> Basket {
        Basket::new(["USD", "BTC", "ETH"]).unwrap()
    }

    #[test]
    fn defaults() {
        let ctx = StrategyContext::builder(basket(), "usd").build().unwrap();

        assert_eq!(ctx.base_currency, "USD");
        assert_eq!(ctx.base_index(), 0);
        assert_eq!(ctx.tradeable_threshold, dec!(100.2));
        assert_eq!(ctx.entry_threshold, dec!(30));
        assert_eq!(ctx.fee_cost(), dec!(2.5));
        assert_eq!(ctx.target_fraction, dec!(0.008));
        assert_eq!(ctx.book_depth, 10);
    }

    #[test]
    fn base_must_be_in_basket() {
        let err = StrategyContext::builder(basket(), "EUR").build().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { field: "BASE_CURRENCY", .. }
        ));
    }

    #[test]
    fn rejects_unusable_parameters() {
        let small = Basket::new(["USD", "BTC"]).unwrap();
        assert!(StrategyContext::builder(small, "USD").build().is_err());
        assert!(StrategyContext::builder(basket(), "USD")
            .trade_size(Decimal::ZERO)
            .build()
            .is_err());
        assert!(StrategyContext::builder(basket(), "USD")
            .fee(dec!(-0.1))
            .build()
            .is_err());
        assert!(StrategyContext::builder(basket(), "USD")
            .book_depth(0)
            .build()
            .is_err());
    }
}
