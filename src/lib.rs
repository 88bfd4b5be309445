//! Signal engines over Kraken spot market data.
//!
//! Two independent engines consume a shared market data feed:
//!
//! - **Triangular arbitrage**: maintains an N×N conversion-rate matrix over a
//!   currency basket from ticker quotes and reports every three-currency
//!   cycle, starting at the base currency, whose compounded rate beats the
//!   tradeable threshold.
//! - **Order-book pressure**: maintains a depth-limited book per instrument
//!   and runs a long/short/flat position state machine driven by bid/ask
//!   volume imbalance, with take-profit and stop-loss exits.
//!
//! ```text
//! rate(USD→BTC) = 1 / 50010
//! rate(BTC→ETH) = 1 / 0.0501
//! rate(ETH→USD) = 2600
//! ─────────────────────────────
//! product ≈ 1.0377 → 103.77% > 100.2% → signal
//! ```
//!
//! # Modules
//!
//! - [`config`]: Configuration loading from environment
//! - [`context`]: Immutable strategy parameters shared by the engines
//! - [`error`]: Unified error types
//! - [`market`]: Pairs, feed events, providers (Kraken and mock)
//! - [`orderbook`]: Depth-limited order book model
//! - [`arbitrage`]: Rate matrix, cycle detection and execution
//! - [`pressure`]: Position rules and state machine
//! - [`trading`]: Orders, positions and the paper portfolio
//! - [`bot`]: Engine host loops
//! - [`metrics`]: Prometheus counters and latency histograms
//! - [`utils`]: Shutdown and cancellation helpers

pub mod arbitrage;
pub mod bot;
pub mod config;
pub mod context;
pub mod error;
pub mod market;
pub mod metrics;
pub mod orderbook;
pub mod pressure;
pub mod trading;
pub mod utils;

pub use config::Config;
pub use context::StrategyContext;
pub use error::{BotError, Result};
