//! Host loop for the order-book pressure engine.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::context::StrategyContext;
use crate::market::{BookMessage, Channel, MarketDataProvider, Pair};
use crate::metrics;
use crate::pressure::{PositionEvent, PositionStateMachine};
use crate::utils::cancelled;

/// Summary reported when the loop exits.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PressureReport {
    /// Instruments whose subscription was refused.
    pub subscription_failures: u64,
    /// Book messages taken off the stream.
    pub books_received: u64,
    /// Messages for unknown symbols or rejected by a book.
    pub events_dropped: u64,
    /// Transitions taken across all instruments.
    pub position_events: u64,
    /// Final realized PnL per instrument.
    pub pnl: BTreeMap<String, Decimal>,
}

impl PressureReport {
    /// Realized PnL summed over instruments.
    pub fn total_pnl(&self) -> Decimal {
        self.pnl.values().copied().sum()
    }
}

/// Runs one [`PositionStateMachine`] per instrument over a book stream.
pub struct PressureBot {
    provider: Arc<dyn MarketDataProvider>,
    channel: Channel,
    pairs: Vec<Pair>,
    machines: HashMap<String, PositionStateMachine>,
    event_sink: Option<mpsc::UnboundedSender<PositionEvent>>,
    report: PressureReport,
}

impl PressureBot {
    /// Flat machines for `pairs`, subscribed through `provider` on start.
    pub fn new(
        ctx: &StrategyContext,
        provider: Arc<dyn MarketDataProvider>,
        pairs: Vec<Pair>,
    ) -> Self {
        let machines = pairs
            .iter()
            .map(|pair| {
                let symbol = pair.symbol();
                (symbol.clone(), PositionStateMachine::new(symbol, ctx))
            })
            .collect();

        Self {
            provider,
            channel: Channel::Book {
                depth: ctx.book_depth,
            },
            pairs,
            machines,
            event_sink: None,
            report: PressureReport::default(),
        }
    }

    /// Forward a copy of every position event to `sink`.
    pub fn with_event_sink(mut self, sink: mpsc::UnboundedSender<PositionEvent>) -> Self {
        self.event_sink = Some(sink);
        self
    }

    /// Subscribe, consume book messages until cancelled or the stream ends,
    /// then unsubscribe and report.
    pub async fn run(
        mut self,
        mut books: mpsc::Receiver<BookMessage>,
        mut shutdown: watch::Receiver<bool>,
    ) -> PressureReport {
        let subscribed = self.subscribe_all().await;
        info!(
            instruments = subscribed.len(),
            channel = self.channel.name(),
            "Pressure engine started"
        );

        loop {
            tokio::select! {
                biased;

                _ = cancelled(&mut shutdown) => {
                    info!("Pressure engine cancelled");
                    break;
                }
                message = books.recv() => match message {
                    Some(message) => self.on_book(message),
                    None => {
                        info!("Book stream closed");
                        break;
                    }
                },
            }
        }

        for pair in &subscribed {
            if let Err(e) = self.provider.unsubscribe(self.channel, pair).await {
                warn!(pair = %pair, error = %e, "Unsubscribe failed");
            }
        }

        self.report.pnl = self
            .machines
            .iter()
            .map(|(symbol, machine)| (symbol.clone(), machine.pnl()))
            .collect();

        for (symbol, pnl) in &self.report.pnl {
            info!(symbol = %symbol, pnl = %pnl, "Final PnL");
        }
        info!(total_pnl = %self.report.total_pnl(), "Pressure engine stopped");

        self.report
    }

    async fn subscribe_all(&mut self) -> Vec<Pair> {
        let mut subscribed = Vec::with_capacity(self.pairs.len());
        for pair in &self.pairs {
            match self.provider.subscribe(self.channel, pair).await {
                Ok(()) => subscribed.push(pair.clone()),
                Err(e) => {
                    warn!(pair = %pair, error = %e, "Book subscription failed");
                    metrics::inc_subscription_failures();
                    self.report.subscription_failures += 1;
                }
            }
        }
        subscribed
    }

    fn on_book(&mut self, message: BookMessage) {
        let _timer = metrics::timer_book();
        metrics::inc_books_received(&message.symbol);
        self.report.books_received += 1;

        let Some(machine) = self.machines.get_mut(&message.symbol) else {
            warn!(symbol = %message.symbol, "Dropping book for unknown symbol");
            self.drop_event();
            return;
        };

        let events = match machine.on_book(&message) {
            Ok(events) => events,
            Err(e) => {
                warn!(symbol = %message.symbol, error = %e, "Dropping book message");
                self.drop_event();
                return;
            }
        };

        for event in events {
            metrics::inc_position_events(&event.action.to_string());
            self.report.position_events += 1;

            if let Some(sink) = &self.event_sink {
                if sink.send(event).is_err() {
                    debug!("Event sink closed");
                    self.event_sink = None;
                }
            }
        }
    }

    fn drop_event(&mut self) {
        metrics::inc_events_dropped("pressure");
        self.report.events_dropped += 1;
    }
}
