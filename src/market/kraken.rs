//! Kraken v2 public WebSocket feed.
//!
//! Features:
//! - One background connection task fed by a command channel
//! - Automatic reconnection with exponential backoff
//! - Active subscriptions re-sent after every reconnect
//! - Heartbeat/ping handling with stale-connection detection

use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use super::provider::{feed_channels, FeedSenders, FeedStreams, MarketDataProvider, STREAM_CAPACITY};
use super::types::{BookMessage, Channel, Pair, Tick};
use crate::error::{MarketDataError, WsError};
use crate::metrics;
use crate::orderbook::Level;

/// Default Kraken v2 public endpoint.
pub const KRAKEN_WS_URL: &str = "wss://ws.kraken.com/v2";

/// Book depths Kraken accepts on the `book` channel.
const BOOK_DEPTHS: [usize; 5] = [10, 25, 100, 500, 1000];

/// Smallest Kraken book depth covering `depth` levels.
pub fn kraken_depth(depth: usize) -> usize {
    BOOK_DEPTHS
        .iter()
        .copied()
        .find(|&d| d >= depth)
        .unwrap_or(BOOK_DEPTHS[BOOK_DEPTHS.len() - 1])
}

/// Reconnection configuration for WebSocket.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Initial backoff delay in milliseconds.
    pub initial_delay_ms: u64,
    /// Maximum backoff delay in seconds.
    pub max_delay_s: u64,
    /// Backoff multiplier (e.g., 2.0 for exponential).
    pub backoff_multiplier: f64,
    /// Heartbeat interval in seconds.
    pub heartbeat_interval_s: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 1000,
            max_delay_s: 30,
            backoff_multiplier: 2.0,
            heartbeat_interval_s: 30,
        }
    }
}

impl ReconnectConfig {
    /// Create from config values.
    pub fn from_config(max_delay_s: u64, heartbeat_interval_s: u64) -> Self {
        Self {
            max_delay_s,
            heartbeat_interval_s,
            ..Default::default()
        }
    }

    /// Calculate next delay with exponential backoff.
    pub fn next_delay(&self, attempt: u32) -> Duration {
        let delay_ms = self.initial_delay_ms as f64 * self.backoff_multiplier.powi(attempt as i32);
        let max_delay_ms = self.max_delay_s * 1000;
        let clamped_ms = delay_ms.min(max_delay_ms as f64) as u64;
        Duration::from_millis(clamped_ms)
    }

    fn heartbeat(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_s.max(1))
    }
}

/// Subscribe/unsubscribe request.
#[derive(Debug, Serialize)]
struct WsRequest<'a> {
    method: &'static str,
    params: WsParams<'a>,
    req_id: u64,
}

#[derive(Debug, Serialize)]
struct WsParams<'a> {
    channel: &'static str,
    symbol: Vec<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    depth: Option<usize>,
}

/// Envelope shared by every inbound message.
#[derive(Debug, Deserialize)]
struct WsEnvelope {
    channel: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    method: Option<String>,
    success: Option<bool>,
    error: Option<String>,
    symbol: Option<String>,
    result: Option<WsAckResult>,
    #[serde(default)]
    data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct WsAckResult {
    channel: Option<String>,
    symbol: Option<String>,
}

/// Entry of a `ticker` message.
#[derive(Debug, Deserialize)]
struct WsTicker {
    symbol: String,
    #[serde(with = "rust_decimal::serde::float")]
    bid: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    bid_qty: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    ask: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    ask_qty: Decimal,
}

/// Entry of a `book` message.
#[derive(Debug, Deserialize)]
struct WsBook {
    symbol: String,
    #[serde(default)]
    bids: Vec<WsLevel>,
    #[serde(default)]
    asks: Vec<WsLevel>,
}

/// Price level from WebSocket.
#[derive(Debug, Deserialize)]
struct WsLevel {
    #[serde(with = "rust_decimal::serde::float")]
    price: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    qty: Decimal,
}

impl From<WsLevel> for Level {
    fn from(level: WsLevel) -> Self {
        Level::new(level.price, level.qty)
    }
}

/// Decoded inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    /// Ticker entry.
    Tick(Tick),
    /// Book snapshot or update.
    Book(BookMessage),
    /// Subscription acknowledged.
    Subscribed {
        /// Channel name.
        channel: String,
        /// Pair symbol.
        symbol: String,
    },
    /// Subscribe or unsubscribe request refused.
    SubscriptionFailed(MarketDataError),
    /// Heartbeat, pong, status and other keep-alive traffic.
    KeepAlive,
}

/// Decode one text frame into feed events.
pub fn decode_message(text: &str) -> Result<Vec<FeedEvent>, WsError> {
    let envelope: WsEnvelope =
        serde_json::from_str(text).map_err(|e| WsError::ParseError(e.to_string()))?;

    if let Some(method) = envelope.method.as_deref() {
        return Ok(vec![decode_ack(method, &envelope)]);
    }

    match envelope.channel.as_deref() {
        Some("ticker") => {
            let entries: Vec<WsTicker> = serde_json::from_value(envelope.data)
                .map_err(|e| WsError::ParseError(format!("ticker: {e}")))?;
            Ok(entries
                .into_iter()
                .map(|t| {
                    FeedEvent::Tick(Tick {
                        symbol: t.symbol,
                        bid: t.bid,
                        bid_qty: t.bid_qty,
                        ask: t.ask,
                        ask_qty: t.ask_qty,
                    })
                })
                .collect())
        }
        Some("book") => {
            let is_snapshot = envelope.kind.as_deref() == Some("snapshot");
            let entries: Vec<WsBook> = serde_json::from_value(envelope.data)
                .map_err(|e| WsError::ParseError(format!("book: {e}")))?;
            Ok(entries
                .into_iter()
                .map(|b| {
                    FeedEvent::Book(BookMessage {
                        symbol: b.symbol,
                        is_snapshot,
                        bids: b.bids.into_iter().map(Level::from).collect(),
                        asks: b.asks.into_iter().map(Level::from).collect(),
                    })
                })
                .collect())
        }
        _ => Ok(vec![FeedEvent::KeepAlive]),
    }
}

fn decode_ack(method: &str, envelope: &WsEnvelope) -> FeedEvent {
    if !matches!(method, "subscribe" | "unsubscribe") {
        return FeedEvent::KeepAlive;
    }

    let result_symbol = envelope.result.as_ref().and_then(|r| r.symbol.clone());
    let symbol = envelope
        .symbol
        .clone()
        .or(result_symbol)
        .unwrap_or_default();

    if envelope.success == Some(true) {
        let channel = envelope
            .result
            .as_ref()
            .and_then(|r| r.channel.clone())
            .unwrap_or_default();
        return FeedEvent::Subscribed { channel, symbol };
    }

    FeedEvent::SubscriptionFailed(MarketDataError::SubscriptionFailed {
        pair: symbol,
        reason: envelope
            .error
            .clone()
            .unwrap_or_else(|| format!("{method} refused")),
    })
}

/// Subscription key; the book depth is part of the request.
type Subscription = (&'static str, Option<usize>, String);

#[derive(Debug)]
enum Command {
    Subscribe(Channel, Pair),
    Unsubscribe(Channel, Pair),
}

fn subscription(channel: Channel, pair: &Pair) -> Subscription {
    let depth = match channel {
        Channel::Ticker => None,
        Channel::Book { depth } => Some(kraken_depth(depth)),
    };
    (channel.name(), depth, pair.symbol())
}

/// Kraken market data provider backed by a background WebSocket task.
#[derive(Debug, Clone)]
pub struct KrakenFeed {
    commands: mpsc::UnboundedSender<Command>,
}

impl KrakenFeed {
    /// Spawn the connection task. Must be called inside a tokio runtime.
    pub fn spawn(url: impl Into<String>, reconnect: ReconnectConfig) -> (Self, FeedStreams) {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (senders, streams) = feed_channels(STREAM_CAPACITY);

        let connection = Connection {
            url: url.into(),
            reconnect,
            commands: command_rx,
            senders,
            active: BTreeSet::new(),
            next_req_id: 1,
        };
        tokio::spawn(connection.run());

        (Self { commands }, streams)
    }

    fn send(&self, command: Command) -> Result<(), MarketDataError> {
        self.commands
            .send(command)
            .map_err(|_| MarketDataError::FeedClosed)
    }
}

#[async_trait]
impl MarketDataProvider for KrakenFeed {
    async fn subscribe(&self, channel: Channel, pair: &Pair) -> Result<(), MarketDataError> {
        self.send(Command::Subscribe(channel, pair.clone()))
    }

    async fn unsubscribe(&self, channel: Channel, pair: &Pair) -> Result<(), MarketDataError> {
        self.send(Command::Unsubscribe(channel, pair.clone()))
    }
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;

/// Why a session ended.
enum SessionEnd {
    /// Every handle and consumer is gone.
    Shutdown,
    /// Connection lost; reconnect.
    Disconnected,
}

struct Connection {
    url: String,
    reconnect: ReconnectConfig,
    commands: mpsc::UnboundedReceiver<Command>,
    senders: FeedSenders,
    active: BTreeSet<Subscription>,
    next_req_id: u64,
}

impl Connection {
    async fn run(mut self) {
        let mut attempt = 0u32;

        loop {
            info!(url = %self.url, attempt, "Connecting to Kraken WebSocket");

            match connect_async(self.url.as_str()).await {
                Ok((ws_stream, _)) => {
                    attempt = 0;
                    match self.session(ws_stream).await {
                        SessionEnd::Shutdown => {
                            info!("Feed consumers gone, stopping WebSocket");
                            return;
                        }
                        SessionEnd::Disconnected => {
                            warn!("WebSocket session ended, will reconnect")
                        }
                    }
                }
                Err(e) => {
                    error!(error = %e, attempt, "WebSocket connection failed");
                }
            }

            if self.senders.is_closed() {
                return;
            }

            let delay = self.reconnect.next_delay(attempt);
            metrics::inc_ws_reconnects();
            info!(delay_ms = delay.as_millis() as u64, "Reconnecting after delay");
            tokio::time::sleep(delay).await;

            attempt = attempt.saturating_add(1);
        }
    }

    async fn session(&mut self, ws_stream: WsStream) -> SessionEnd {
        let (mut write, mut read) = ws_stream.split();

        let resend: Vec<Subscription> = self.active.iter().cloned().collect();
        for sub in &resend {
            if let Err(e) = self.request(&mut write, "subscribe", sub).await {
                error!(error = %e, "Failed to restore subscription");
                return SessionEnd::Disconnected;
            }
        }
        if !resend.is_empty() {
            info!(count = resend.len(), "Restored subscriptions");
        }

        let heartbeat = self.reconnect.heartbeat();
        let mut ticker = tokio::time::interval(heartbeat);
        ticker.tick().await;
        let mut last_message = Instant::now();

        loop {
            tokio::select! {
                command = self.commands.recv() => {
                    let Some(command) = command else {
                        return SessionEnd::Shutdown;
                    };
                    if let Err(e) = self.apply(&mut write, command).await {
                        error!(error = %e, "Failed to send request");
                        return SessionEnd::Disconnected;
                    }
                }
                frame = read.next() => {
                    last_message = Instant::now();
                    match frame {
                        Some(Ok(Message::Text(text))) => {
                            metrics::inc_ws_messages_received();
                            if !self.dispatch(&text).await {
                                return SessionEnd::Shutdown;
                            }
                        }
                        Some(Ok(Message::Ping(_))) => debug!("Received ping"),
                        Some(Ok(Message::Pong(_))) => debug!("Received pong"),
                        Some(Ok(Message::Close(frame))) => {
                            warn!(frame = ?frame, "WebSocket closed");
                            return SessionEnd::Disconnected;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            error!(error = %e, "WebSocket error");
                            return SessionEnd::Disconnected;
                        }
                        None => return SessionEnd::Disconnected,
                    }
                }
                _ = ticker.tick() => {
                    if last_message.elapsed() > heartbeat * 2 {
                        warn!(silent_s = last_message.elapsed().as_secs(), "Connection stale");
                        return SessionEnd::Disconnected;
                    }
                    let ping = serde_json::json!({ "method": "ping" }).to_string();
                    if let Err(e) = write.send(Message::Text(ping)).await {
                        error!(error = %e, "Failed to send ping");
                        return SessionEnd::Disconnected;
                    }
                }
            }

            if self.senders.is_closed() {
                return SessionEnd::Shutdown;
            }
        }
    }

    async fn apply(&mut self, write: &mut WsSink, command: Command) -> Result<(), WsError> {
        match command {
            Command::Subscribe(channel, pair) => {
                let sub = subscription(channel, &pair);
                self.request(write, "subscribe", &sub).await?;
                self.active.insert(sub);
            }
            Command::Unsubscribe(channel, pair) => {
                let sub = subscription(channel, &pair);
                self.active.remove(&sub);
                self.request(write, "unsubscribe", &sub).await?;
            }
        }
        Ok(())
    }

    async fn request(
        &mut self,
        write: &mut WsSink,
        method: &'static str,
        sub: &Subscription,
    ) -> Result<(), WsError> {
        let (channel, depth, symbol) = sub;
        let request = WsRequest {
            method,
            params: WsParams {
                channel: *channel,
                symbol: vec![symbol.as_str()],
                depth: *depth,
            },
            req_id: self.next_req_id,
        };
        self.next_req_id += 1;

        let json = serde_json::to_string(&request).map_err(|e| WsError::SendFailed(e.to_string()))?;
        debug!(%json, "Sending request");
        write.send(Message::Text(json)).await?;
        Ok(())
    }

    /// Forward decoded events. Returns false once every consumer is gone.
    async fn dispatch(&self, text: &str) -> bool {
        let events = match decode_message(text) {
            Ok(events) => events,
            Err(e) => {
                warn!(error = %e, "Dropping undecodable message");
                metrics::inc_events_dropped("feed");
                return true;
            }
        };

        for event in events {
            match event {
                // A closed receiver means that engine is not running.
                FeedEvent::Tick(tick) => {
                    let _ = self.senders.ticks.send(tick).await;
                }
                FeedEvent::Book(book) => {
                    let _ = self.senders.books.send(book).await;
                }
                FeedEvent::Subscribed { channel, symbol } => {
                    info!(%channel, %symbol, "Subscribed");
                }
                FeedEvent::SubscriptionFailed(e) => {
                    warn!(error = %e, "Subscription failed");
                    metrics::inc_subscription_failures();
                }
                FeedEvent::KeepAlive => {}
            }
        }

        !self.senders.is_closed()
    }
}
