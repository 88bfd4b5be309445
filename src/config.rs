//! Application configuration loaded from environment variables.

use std::time::Duration;

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::context::StrategyContext;
use crate::error::ConfigError;
use crate::market::kraken::{ReconnectConfig, KRAKEN_WS_URL};
use crate::market::{Basket, Pair};
use crate::orderbook::DEFAULT_DEPTH;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // === Market Data ===
    /// Kraken WebSocket URL.
    #[serde(default = "default_ws_url")]
    pub kraken_ws_url: String,

    /// Currency basket for the arbitrage engine, comma separated.
    #[serde(default = "default_symbols")]
    pub symbols: String,

    /// Settlement currency every cycle starts from.
    #[serde(default = "default_base_currency")]
    pub base_currency: String,

    /// Instruments for the pressure engine, comma separated `INSTRUMENT/BASE`.
    #[serde(default = "default_pressure_symbols")]
    pub pressure_symbols: String,

    // === Strategy Parameters ===
    /// Minimum compounded return percentage for a signal (e.g., 100.2).
    #[serde(default = "default_tradeable_threshold")]
    pub tradeable_threshold: Decimal,

    /// Minimum bid/ask volume imbalance to open a position.
    #[serde(default = "default_entry_threshold")]
    pub entry_threshold: Decimal,

    /// Notional per trade in the quote currency.
    #[serde(default = "default_trade_size")]
    pub trade_size: Decimal,

    /// Fee per fill as a fraction (0.0025 = 25 bps).
    #[serde(default = "default_fee")]
    pub fee: Decimal,

    /// Take-profit distance as a fraction of entry price.
    #[serde(default = "default_target_fraction")]
    pub target_fraction: Decimal,

    /// Retained book levels per side.
    #[serde(default = "default_book_depth")]
    pub book_depth: usize,

    // === Operation Modes ===
    /// Execute arbitrage cycles against the paper portfolio.
    #[serde(default)]
    pub execute: bool,

    /// Starting settlement-currency balance of the paper portfolio.
    #[serde(default = "default_sim_capital")]
    pub sim_capital: Decimal,

    /// Minimum seconds between executed cycles.
    #[serde(default = "default_cooldown")]
    pub cooldown_seconds: u64,

    // === WebSocket Configuration ===
    /// Maximum reconnect backoff in seconds.
    #[serde(default = "default_reconnect_max_delay")]
    pub ws_reconnect_max_delay_s: u64,

    /// Ping interval in seconds.
    #[serde(default = "default_heartbeat_interval")]
    pub ws_heartbeat_interval_s: u64,

    // === Observability ===
    /// Prometheus scrape port; no exporter when unset.
    #[serde(default)]
    pub metrics_port: Option<u16>,

    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub rust_log: String,
}

fn default_ws_url() -> String {
    KRAKEN_WS_URL.to_string()
}

fn default_symbols() -> String {
    "USD,BTC,ETH".to_string()
}

fn default_base_currency() -> String {
    "USD".to_string()
}

fn default_pressure_symbols() -> String {
    "BTC/USD".to_string()
}

fn default_tradeable_threshold() -> Decimal {
    Decimal::new(1002, 1) // 100.2
}

fn default_entry_threshold() -> Decimal {
    Decimal::new(30, 0)
}

fn default_trade_size() -> Decimal {
    Decimal::new(1000, 0)
}

fn default_fee() -> Decimal {
    Decimal::new(25, 4) // 0.0025
}

fn default_target_fraction() -> Decimal {
    Decimal::new(8, 3) // 0.008
}

fn default_book_depth() -> usize {
    DEFAULT_DEPTH
}

fn default_sim_capital() -> Decimal {
    Decimal::new(10_000, 0)
}

fn default_cooldown() -> u64 {
    10
}

fn default_reconnect_max_delay() -> u64 {
    30
}

fn default_heartbeat_interval() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty())
}

impl Config {
    /// Load configuration from environment, reading .env file first.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Ok(envy::from_env()?)
    }

    /// Check that the engines can run with this configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.context()?;
        self.pressure_pairs()?;
        Ok(())
    }

    /// Build the strategy context shared by both engines.
    pub fn context(&self) -> Result<StrategyContext, ConfigError> {
        let basket = Basket::new(split_list(&self.symbols))?;

        StrategyContext::builder(basket, self.base_currency.trim().to_uppercase())
            .tradeable_threshold(self.tradeable_threshold)
            .entry_threshold(self.entry_threshold)
            .trade_size(self.trade_size)
            .fee(self.fee)
            .target_fraction(self.target_fraction)
            .book_depth(self.book_depth)
            .cooldown(Duration::from_secs(self.cooldown_seconds))
            .build()
    }

    /// Instruments traded by the pressure engine.
    pub fn pressure_pairs(&self) -> Result<Vec<Pair>, ConfigError> {
        let pairs = split_list(&self.pressure_symbols)
            .map(|s| {
                s.to_uppercase()
                    .parse::<Pair>()
                    .map_err(|e| ConfigError::InvalidValue {
                        field: "PRESSURE_SYMBOLS",
                        reason: e.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        if pairs.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "PRESSURE_SYMBOLS",
                reason: "no instruments configured".to_string(),
            });
        }
        Ok(pairs)
    }

    /// Reconnect settings for the WebSocket feed.
    pub fn reconnect(&self) -> ReconnectConfig {
        ReconnectConfig::from_config(self.ws_reconnect_max_delay_s, self.ws_heartbeat_interval_s)
    }
}
