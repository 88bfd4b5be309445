use std::sync::Arc;

use pretty_assertions::assert_eq;
use rust_decimal_macros::dec;
use tokio::sync::mpsc;

use kraken_signals::arbitrage::TriangleExecutor;
use kraken_signals::bot::{TriangleBot, TriangleStats};
use kraken_signals::market::{feed_channels, mock_tick, Channel, MockCall, MockMarketData};
use kraken_signals::trading::{PaperPortfolio, Side};
use kraken_signals::utils::cancellation;

use super::test_context;

#[tokio::test]
async fn signal_is_executed_once_within_cooldown() {
    let ctx = test_context();
    let (mock, streams) = MockMarketData::new();
    let mock = Arc::new(mock);
    let portfolio = Arc::new(PaperPortfolio::new("USD", dec!(10000), ctx.fee));
    let (sink, mut signals) = mpsc::unbounded_channel();
    let (tx, rx) = cancellation();

    let bot = TriangleBot::new(&ctx, mock.clone())
        .with_executor(TriangleExecutor::new(&ctx, portfolio.clone()))
        .with_signal_sink(sink);
    let handle = tokio::spawn(bot.run(streams.ticks, rx));

    for tick in [
        mock_tick("BTC/USD", dec!(50000), dec!(50010)),
        mock_tick("ETH/BTC", dec!(0.05), dec!(0.0501)),
        mock_tick("ETH/USD", dec!(2600), dec!(2601)),
        mock_tick("ETH/USD", dec!(2601), dec!(2602)),
    ] {
        mock.push_tick(tick).await.unwrap();
    }

    let first = signals.recv().await.unwrap();
    let second = signals.recv().await.unwrap();
    assert!(second.edge_pct > first.edge_pct);

    tx.send(true).unwrap();
    let stats = handle.await.unwrap();

    assert_eq!(
        stats,
        TriangleStats {
            subscription_failures: 0,
            ticks_received: 4,
            events_dropped: 0,
            signals: 2,
            cycles_executed: 1,
            execution_failures: 0,
        }
    );

    let sides: Vec<(String, Side)> = portfolio
        .fills()
        .into_iter()
        .map(|fill| (fill.pair(), fill.side))
        .collect();
    assert_eq!(
        sides,
        vec![
            ("BTC/USD".to_string(), Side::Buy),
            ("ETH/BTC".to_string(), Side::Buy),
            ("ETH/USD".to_string(), Side::Sell),
        ]
    );

    // 1000 × 1.0377 less three fees comes back as roughly 1029.96 USD.
    let usd = portfolio.balance("USD");
    assert!(usd > dec!(10029) && usd < dec!(10031), "usd = {usd}");
}

#[tokio::test]
async fn refused_pairs_do_not_stop_the_engine() {
    let ctx = test_context();
    let (mock, streams) = MockMarketData::new();
    mock.fail_pair("ETH/BTC");
    let mock = Arc::new(mock);
    let (sink, mut signals) = mpsc::unbounded_channel();
    let (tx, rx) = cancellation();

    let bot = TriangleBot::new(&ctx, mock.clone()).with_signal_sink(sink);
    let handle = tokio::spawn(bot.run(streams.ticks, rx));

    // Quotes still arrive for the refused pair if the venue sends them.
    mock.push_tick(mock_tick("BTC/USD", dec!(50000), dec!(50010))).await.unwrap();
    mock.push_tick(mock_tick("ETH/BTC", dec!(0.05), dec!(0.0501))).await.unwrap();
    mock.push_tick(mock_tick("ETH/USD", dec!(2600), dec!(2601))).await.unwrap();
    signals.recv().await.unwrap();

    tx.send(true).unwrap();
    let stats = handle.await.unwrap();

    assert_eq!(stats.subscription_failures, 1);
    assert_eq!(stats.signals, 1);

    let unsubscribed: Vec<MockCall> = mock
        .calls()
        .into_iter()
        .filter(|call| matches!(call, MockCall::Unsubscribe(..)))
        .collect();
    assert_eq!(
        unsubscribed,
        vec![
            MockCall::Unsubscribe(Channel::Ticker, "BTC/USD".to_string()),
            MockCall::Unsubscribe(Channel::Ticker, "ETH/USD".to_string()),
        ]
    );
}

#[tokio::test]
async fn exits_when_the_stream_ends() {
    let ctx = test_context();
    let (mock, _unused) = MockMarketData::new();
    let mock = Arc::new(mock);
    let (senders, streams) = feed_channels(16);
    let (_tx, rx) = cancellation();

    let handle = tokio::spawn(TriangleBot::new(&ctx, mock.clone()).run(streams.ticks, rx));
    senders
        .ticks
        .send(mock_tick("BTC/USD", dec!(50000), dec!(50010)))
        .await
        .unwrap();
    drop(senders);

    let stats = handle.await.unwrap();

    assert_eq!(stats.ticks_received, 1);
    assert_eq!(stats.signals, 0);
    assert!(mock.active(Channel::Ticker).is_empty());
}
