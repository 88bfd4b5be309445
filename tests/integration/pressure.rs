use std::sync::Arc;

use pretty_assertions::assert_eq;
use rust_decimal_macros::dec;
use tokio::sync::mpsc;

use kraken_signals::bot::PressureBot;
use kraken_signals::market::{Channel, MockBookBuilder, MockMarketData, Pair};
use kraken_signals::pressure::{PositionAction, PositionEvent};
use kraken_signals::utils::cancellation;

use super::test_context;

#[tokio::test]
async fn long_round_trip_with_take_profit() {
    let ctx = test_context();
    let (mock, streams) = MockMarketData::new();
    let mock = Arc::new(mock);
    let (sink, mut events) = mpsc::unbounded_channel();
    let (tx, rx) = cancellation();

    let bot = PressureBot::new(&ctx, mock.clone(), vec![Pair::new("BTC", "USD")])
        .with_event_sink(sink);
    let handle = tokio::spawn(bot.run(streams.books, rx));

    // Bid volume 50 against ask volume 10: long 10 at 100.
    mock.push_book(
        MockBookBuilder::snapshot("BTC/USD")
            .bid(dec!(99.5), dec!(50))
            .ask(dec!(100), dec!(10))
            .build(),
    )
    .await
    .unwrap();
    // Bid lifts through entry plus 0.8% target.
    mock.push_book(
        MockBookBuilder::update("BTC/USD")
            .bid(dec!(100.81), dec!(5))
            .ask(dec!(100), dec!(0))
            .ask(dec!(101), dec!(10))
            .build(),
    )
    .await
    .unwrap();

    let opened = events.recv().await.unwrap();
    let closed = events.recv().await.unwrap();

    tx.send(true).unwrap();
    let report = handle.await.unwrap();

    assert_eq!(
        opened,
        PositionEvent {
            symbol: "BTC/USD".to_string(),
            action: PositionAction::EnterLong,
            price: dec!(100),
            size: dec!(10),
            pnl: dec!(-2.5),
        }
    );
    assert_eq!(closed.action, PositionAction::ExitLong);
    assert_eq!(closed.price, dec!(100.81));
    assert_eq!(closed.pnl, dec!(3.1));

    assert_eq!(report.books_received, 2);
    assert_eq!(report.position_events, 2);
    assert_eq!(report.total_pnl(), dec!(3.1));
}

#[tokio::test]
async fn engines_share_one_provider() {
    use kraken_signals::bot::TriangleBot;
    use kraken_signals::market::mock_tick;

    let ctx = test_context();
    let (mock, streams) = MockMarketData::new();
    let mock = Arc::new(mock);
    let (sink, mut events) = mpsc::unbounded_channel();
    let (tx, rx) = cancellation();

    let triangle =
        tokio::spawn(TriangleBot::new(&ctx, mock.clone()).run(streams.ticks, rx.clone()));
    let pressure = tokio::spawn(
        PressureBot::new(&ctx, mock.clone(), vec![Pair::new("ETH", "USD")])
            .with_event_sink(sink)
            .run(streams.books, rx),
    );

    mock.push_tick(mock_tick("ETH/USD", dec!(2600), dec!(2601))).await.unwrap();
    // Ask pressure: short 1000/2600 ETH at the bid.
    mock.push_book(
        MockBookBuilder::snapshot("ETH/USD")
            .bid(dec!(2600), dec!(1))
            .ask(dec!(2601), dec!(40))
            .build(),
    )
    .await
    .unwrap();

    let event = events.recv().await.unwrap();
    assert_eq!(event.action, PositionAction::EnterShort);
    assert!(event.size < dec!(0));

    assert_eq!(mock.active(Channel::Ticker).len(), 3);
    assert_eq!(
        mock.active(Channel::Book { depth: 10 }),
        vec!["ETH/USD".to_string()]
    );

    tx.send(true).unwrap();
    let stats = triangle.await.unwrap();
    let report = pressure.await.unwrap();

    assert_eq!(stats.ticks_received, 1);
    assert_eq!(report.position_events, 1);
    assert!(mock.active(Channel::Ticker).is_empty());
    assert!(mock.active(Channel::Book { depth: 10 }).is_empty());
}
