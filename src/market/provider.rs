//! Market data provider interface.

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::types::{BookMessage, Channel, Pair, Tick};
use crate::error::MarketDataError;

/// Capacity of each event channel between a feed and its consumers.
pub const STREAM_CAPACITY: usize = 1024;

/// Subscription side of a market data source.
///
/// Events for subscribed pairs arrive on the receivers in [`FeedStreams`],
/// handed out once when the provider is created.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Start receiving `channel` events for `pair`.
    async fn subscribe(&self, channel: Channel, pair: &Pair) -> Result<(), MarketDataError>;

    /// Stop receiving `channel` events for `pair`.
    async fn unsubscribe(&self, channel: Channel, pair: &Pair) -> Result<(), MarketDataError>;
}

/// Receiving ends of a provider's tick and book streams.
#[derive(Debug)]
pub struct FeedStreams {
    /// Ticker events, ordered per pair by arrival.
    pub ticks: mpsc::Receiver<Tick>,
    /// Book events, ordered per instrument by arrival.
    pub books: mpsc::Receiver<BookMessage>,
}

/// Sending ends matching a [`FeedStreams`].
#[derive(Debug, Clone)]
pub struct FeedSenders {
    /// Ticker sender.
    pub ticks: mpsc::Sender<Tick>,
    /// Book sender.
    pub books: mpsc::Sender<BookMessage>,
}

impl FeedSenders {
    /// Whether every consumer has gone away.
    pub fn is_closed(&self) -> bool {
        self.ticks.is_closed() && self.books.is_closed()
    }
}

/// Create a connected sender/receiver set.
pub fn feed_channels(capacity: usize) -> (FeedSenders, FeedStreams) {
    let (tick_tx, tick_rx) = mpsc::channel(capacity);
    let (book_tx, book_rx) = mpsc::channel(capacity);
    (
        FeedSenders {
            ticks: tick_tx,
            books: book_tx,
        },
        FeedStreams {
            ticks: tick_rx,
            books: book_rx,
        },
    )
}
