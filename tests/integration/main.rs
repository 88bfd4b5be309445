//! Integration tests driving the engine hosts through the mock provider.
//!
//! Run with: cargo test --test integration

mod pressure;
mod triangle;

use kraken_signals::market::Basket;
use kraken_signals::StrategyContext;

/// USD/BTC/ETH context with default parameters.
pub fn test_context() -> StrategyContext {
    StrategyContext::builder(Basket::new(["USD", "BTC", "ETH"]).unwrap(), "USD")
        .build()
        .unwrap()
}
