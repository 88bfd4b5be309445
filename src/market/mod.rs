//! Market module for Kraken spot market data.
//!
//! This module handles:
//! - Pair, basket and feed event types
//! - The market data provider interface
//! - The Kraken WebSocket feed
//! - Mock provider for testing

pub mod kraken;
pub mod mock;
pub mod provider;
pub mod types;

pub use kraken::{decode_message, FeedEvent, KrakenFeed, ReconnectConfig, KRAKEN_WS_URL};
pub use mock::{mock_tick, MockBookBuilder, MockCall, MockMarketData};
pub use provider::{feed_channels, FeedSenders, FeedStreams, MarketDataProvider, STREAM_CAPACITY};
pub use types::{Basket, BookMessage, Channel, Conversion, Pair, Tick};
