//! Host loop for the triangular arbitrage engine.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::arbitrage::{ArbitrageDetector, ArbitrageSignal, ExecutionResult, TriangleExecutor};
use crate::context::StrategyContext;
use crate::market::{Channel, MarketDataProvider, Pair, Tick};
use crate::metrics;
use crate::utils::cancelled;

/// Counters reported when the loop exits.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TriangleStats {
    /// Pairs whose subscription was refused.
    pub subscription_failures: u64,
    /// Ticks taken off the stream.
    pub ticks_received: u64,
    /// Ticks rejected by the detector.
    pub events_dropped: u64,
    /// Signals emitted by the detector.
    pub signals: u64,
    /// Cycles fully executed.
    pub cycles_executed: u64,
    /// Cycles abandoned on a failing leg.
    pub execution_failures: u64,
}

/// Runs [`ArbitrageDetector`] over a ticker stream.
pub struct TriangleBot {
    provider: Arc<dyn MarketDataProvider>,
    detector: ArbitrageDetector,
    pairs: Vec<Pair>,
    executor: Option<TriangleExecutor>,
    signal_sink: Option<mpsc::UnboundedSender<ArbitrageSignal>>,
    stats: TriangleStats,
}

impl TriangleBot {
    /// Detector for the context's basket, fed through `provider`.
    pub fn new(ctx: &StrategyContext, provider: Arc<dyn MarketDataProvider>) -> Self {
        Self {
            provider,
            detector: ArbitrageDetector::new(ctx),
            pairs: ctx.basket.subscription_pairs(),
            executor: None,
            signal_sink: None,
            stats: TriangleStats::default(),
        }
    }

    /// Execute every signal through `executor`.
    pub fn with_executor(mut self, executor: TriangleExecutor) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Forward a copy of every signal to `sink`.
    pub fn with_signal_sink(mut self, sink: mpsc::UnboundedSender<ArbitrageSignal>) -> Self {
        self.signal_sink = Some(sink);
        self
    }

    /// Subscribe, consume ticks until cancelled or the stream ends, then
    /// unsubscribe.
    pub async fn run(
        mut self,
        mut ticks: mpsc::Receiver<Tick>,
        mut shutdown: watch::Receiver<bool>,
    ) -> TriangleStats {
        let subscribed = self.subscribe_all().await;
        info!(
            pairs = subscribed.len(),
            failed = self.stats.subscription_failures,
            "Triangle engine started"
        );

        loop {
            tokio::select! {
                biased;

                _ = cancelled(&mut shutdown) => {
                    info!("Triangle engine cancelled");
                    break;
                }
                tick = ticks.recv() => match tick {
                    Some(tick) => self.on_tick(tick).await,
                    None => {
                        info!("Tick stream closed");
                        break;
                    }
                },
            }
        }

        for pair in &subscribed {
            if let Err(e) = self.provider.unsubscribe(Channel::Ticker, pair).await {
                warn!(pair = %pair, error = %e, "Unsubscribe failed");
            }
        }

        info!(stats = ?self.stats, "Triangle engine stopped");
        self.stats
    }

    async fn subscribe_all(&mut self) -> Vec<Pair> {
        let mut subscribed = Vec::with_capacity(self.pairs.len());
        for pair in &self.pairs {
            match self.provider.subscribe(Channel::Ticker, pair).await {
                Ok(()) => subscribed.push(pair.clone()),
                Err(e) => {
                    warn!(pair = %pair, error = %e, "Ticker subscription failed");
                    metrics::inc_subscription_failures();
                    self.stats.subscription_failures += 1;
                }
            }
        }
        subscribed
    }

    async fn on_tick(&mut self, tick: Tick) {
        let _timer = metrics::timer_tick();
        metrics::inc_ticks_received();
        self.stats.ticks_received += 1;

        let signals = match self.detector.on_tick(&tick) {
            Ok(signals) => signals,
            Err(e) => {
                warn!(symbol = %tick.symbol, error = %e, "Dropping tick");
                metrics::inc_events_dropped("triangle");
                self.stats.events_dropped += 1;
                return;
            }
        };

        for signal in signals {
            metrics::inc_arbitrage_signals();
            self.stats.signals += 1;

            if let Some(sink) = &self.signal_sink {
                if sink.send(signal.clone()).is_err() {
                    debug!("Signal sink closed");
                    self.signal_sink = None;
                }
            }

            let Some(executor) = self.executor.as_mut() else {
                continue;
            };
            match executor.execute(&signal).await {
                ExecutionResult::Completed { .. } => {
                    metrics::inc_executions();
                    self.stats.cycles_executed += 1;
                }
                ExecutionResult::Failed { .. } => {
                    metrics::inc_execution_failures();
                    self.stats.execution_failures += 1;
                }
                ExecutionResult::CooldownActive { .. } | ExecutionResult::NoCapital => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::{mock_tick, Basket, MockCall, MockMarketData};
    use crate::utils::cancellation;
    use rust_decimal_macros::dec;

    fn ctx() -> StrategyContext {
        StrategyContext::builder(Basket::new(["USD", "BTC", "ETH"]).unwrap(), "USD")
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn emits_signals_and_unsubscribes_on_cancel() {
        let (mock, streams) = MockMarketData::new();
        let mock = Arc::new(mock);
        let (tx, rx) = cancellation();
        let (sink, mut signals) = mpsc::unbounded_channel();
        let bot = TriangleBot::new(&ctx(), mock.clone()).with_signal_sink(sink);

        let handle = tokio::spawn(bot.run(streams.ticks, rx));
        mock.push_tick(mock_tick("BTC/USD", dec!(50000), dec!(50010))).await.unwrap();
        mock.push_tick(mock_tick("ETH/BTC", dec!(0.05), dec!(0.0501))).await.unwrap();
        mock.push_tick(mock_tick("ETH/USD", dec!(2600), dec!(2601))).await.unwrap();

        let signal = signals.recv().await.unwrap();
        assert_eq!(signal.leg2, "BTC");
        assert_eq!(mock.active(Channel::Ticker).len(), 3);

        tx.send(true).unwrap();
        let stats = handle.await.unwrap();

        assert_eq!(stats.ticks_received, 3);
        assert_eq!(stats.signals, 1);
        assert_eq!(stats.subscription_failures, 0);
        assert!(mock.active(Channel::Ticker).is_empty());
    }

    #[tokio::test]
    async fn malformed_ticks_are_dropped() {
        let (mock, streams) = MockMarketData::new();
        let mock = Arc::new(mock);
        let (tx, rx) = cancellation();
        let (sink, mut signals) = mpsc::unbounded_channel();
        let bot = TriangleBot::new(&ctx(), mock.clone()).with_signal_sink(sink);

        let handle = tokio::spawn(bot.run(streams.ticks, rx));
        mock.push_tick(mock_tick("BTCUSD", dec!(1), dec!(2))).await.unwrap();
        mock.push_tick(mock_tick("DOGE/USD", dec!(1), dec!(2))).await.unwrap();
        mock.push_tick(mock_tick("BTC/USD", dec!(50000), dec!(50010))).await.unwrap();
        mock.push_tick(mock_tick("ETH/BTC", dec!(0.05), dec!(0.0501))).await.unwrap();
        mock.push_tick(mock_tick("ETH/USD", dec!(2600), dec!(2601))).await.unwrap();

        // Ticks are consumed in order, so the signal arrives after both drops.
        signals.recv().await.unwrap();
        tx.send(true).unwrap();
        let stats = handle.await.unwrap();

        assert_eq!(stats.ticks_received, 5);
        assert_eq!(stats.events_dropped, 2);
    }

    #[tokio::test]
    async fn failed_subscriptions_are_counted_not_fatal() {
        let (mock, streams) = MockMarketData::new();
        mock.fail_pair("ETH/BTC");
        let mock = Arc::new(mock);
        let (tx, rx) = cancellation();
        tx.send(true).unwrap();

        let stats = TriangleBot::new(&ctx(), mock.clone()).run(streams.ticks, rx).await;

        assert_eq!(stats.subscription_failures, 1);
        let unsubscribed: Vec<_> = mock
            .calls()
            .into_iter()
            .filter(|c| matches!(c, MockCall::Unsubscribe(..)))
            .collect();
        assert_eq!(unsubscribed.len(), 2);
        assert!(mock.active(Channel::Ticker).is_empty());
    }
}
