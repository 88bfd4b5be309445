//! In-memory market data provider for tests.
//!
//! Records every subscribe/unsubscribe call, can be told to refuse
//! specific pairs, and lets the test push ticks and book messages into the
//! same streams a live feed would use.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use rust_decimal::Decimal;

use super::provider::{feed_channels, FeedSenders, FeedStreams, MarketDataProvider, STREAM_CAPACITY};
use super::types::{BookMessage, Channel, Pair, Tick};
use crate::error::MarketDataError;
use crate::orderbook::Level;

/// Subscription call recorded by [`MockMarketData`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    /// `subscribe(channel, pair)`.
    Subscribe(Channel, String),
    /// `unsubscribe(channel, pair)`.
    Unsubscribe(Channel, String),
}

/// Mock market data provider.
#[derive(Debug, Clone)]
pub struct MockMarketData {
    senders: FeedSenders,
    calls: Arc<Mutex<Vec<MockCall>>>,
    failing: Arc<Mutex<HashSet<String>>>,
}

impl MockMarketData {
    /// Create a provider and the streams it feeds.
    pub fn new() -> (Self, FeedStreams) {
        let (senders, streams) = feed_channels(STREAM_CAPACITY);
        let mock = Self {
            senders,
            calls: Arc::new(Mutex::new(Vec::new())),
            failing: Arc::new(Mutex::new(HashSet::new())),
        };
        (mock, streams)
    }

    /// Refuse subscriptions for `pair` from now on.
    pub fn fail_pair(&self, pair: &str) {
        self.failing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(pair.to_string());
    }

    /// Every recorded call, oldest first.
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Pairs currently subscribed on `channel`. Refused pairs never count.
    pub fn active(&self, channel: Channel) -> Vec<String> {
        let failing = self
            .failing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let mut active: Vec<String> = Vec::new();
        for call in self.calls() {
            match call {
                MockCall::Subscribe(c, pair) if c == channel => {
                    if !failing.contains(&pair) && !active.contains(&pair) {
                        active.push(pair);
                    }
                }
                MockCall::Unsubscribe(c, pair) if c == channel => active.retain(|p| *p != pair),
                _ => {}
            }
        }
        active
    }

    /// Deliver a tick.
    pub async fn push_tick(&self, tick: Tick) -> Result<(), MarketDataError> {
        self.senders
            .ticks
            .send(tick)
            .await
            .map_err(|_| MarketDataError::FeedClosed)
    }

    /// Deliver a book message.
    pub async fn push_book(&self, book: BookMessage) -> Result<(), MarketDataError> {
        self.senders
            .books
            .send(book)
            .await
            .map_err(|_| MarketDataError::FeedClosed)
    }

    fn record(&self, call: MockCall, pair: &Pair) -> Result<(), MarketDataError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);

        let symbol = pair.symbol();
        if self
            .failing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&symbol)
        {
            return Err(MarketDataError::SubscriptionFailed {
                pair: symbol,
                reason: "refused by mock".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl MarketDataProvider for MockMarketData {
    async fn subscribe(&self, channel: Channel, pair: &Pair) -> Result<(), MarketDataError> {
        self.record(MockCall::Subscribe(channel, pair.symbol()), pair)
    }

    async fn unsubscribe(&self, channel: Channel, pair: &Pair) -> Result<(), MarketDataError> {
        self.record(MockCall::Unsubscribe(channel, pair.symbol()), pair)
    }
}

/// Tick with unit quantities.
pub fn mock_tick(symbol: &str, bid: Decimal, ask: Decimal) -> Tick {
    Tick {
        symbol: symbol.to_string(),
        bid,
        bid_qty: Decimal::ONE,
        ask,
        ask_qty: Decimal::ONE,
    }
}

/// Builder for book messages.
#[derive(Debug, Clone)]
pub struct MockBookBuilder {
    message: BookMessage,
}

impl MockBookBuilder {
    /// Start a snapshot for `symbol`.
    pub fn snapshot(symbol: &str) -> Self {
        Self::new(symbol, true)
    }

    /// Start an incremental update for `symbol`.
    pub fn update(symbol: &str) -> Self {
        Self::new(symbol, false)
    }

    fn new(symbol: &str, is_snapshot: bool) -> Self {
        Self {
            message: BookMessage {
                symbol: symbol.to_string(),
                is_snapshot,
                bids: Vec::new(),
                asks: Vec::new(),
            },
        }
    }

    /// Add a bid level.
    pub fn bid(mut self, price: Decimal, volume: Decimal) -> Self {
        self.message.bids.push(Level::new(price, volume));
        self
    }

    /// Add an ask level.
    pub fn ask(mut self, price: Decimal, volume: Decimal) -> Self {
        self.message.asks.push(Level::new(price, volume));
        self
    }

    /// Build the message.
    pub fn build(self) -> BookMessage {
        self.message
    }
}
