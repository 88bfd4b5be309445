//! Order-book pressure position state machine.

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use super::rules::{PositionAction, RuleParams, RULES};
use crate::context::StrategyContext;
use crate::error::MarketDataError;
use crate::market::BookMessage;
use crate::orderbook::{BookModel, BookTop};
use crate::trading::{Position, PositionState};

/// Transition emitted by the state machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PositionEvent {
    /// Instrument the position is in.
    pub symbol: String,
    /// Transition taken.
    pub action: PositionAction,
    /// Entry price for entries, the quote the position was closed against
    /// otherwise.
    pub price: Decimal,
    /// Signed size opened or closed.
    pub size: Decimal,
    /// Running realized PnL after the transition.
    pub pnl: Decimal,
}

/// Book plus a single position for one instrument.
#[derive(Debug, Clone)]
pub struct PositionStateMachine {
    symbol: String,
    book: BookModel,
    position: Position,
    params: RuleParams,
    trade_size: Decimal,
    fee_cost: Decimal,
}

impl PositionStateMachine {
    /// Create a flat machine for `symbol`.
    pub fn new(symbol: impl Into<String>, ctx: &StrategyContext) -> Self {
        Self {
            symbol: symbol.into(),
            book: BookModel::new(ctx.book_depth),
            position: Position::default(),
            params: RuleParams {
                entry_threshold: ctx.entry_threshold,
                target_fraction: ctx.target_fraction,
            },
            trade_size: ctx.trade_size,
            fee_cost: ctx.fee_cost(),
        }
    }

    /// Instrument symbol.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Current book.
    pub fn book(&self) -> &BookModel {
        &self.book
    }

    /// Current position.
    pub fn position(&self) -> &Position {
        &self.position
    }

    /// Current position direction.
    pub fn state(&self) -> PositionState {
        self.position.state()
    }

    /// Running realized PnL.
    pub fn pnl(&self) -> Decimal {
        self.position.realized_pnl
    }

    /// Absorb a book message and evaluate the rules against the new book.
    ///
    /// Entries need both sides of the book; exits run on whatever side
    /// they read.
    #[instrument(
        skip(self, message),
        fields(symbol = %self.symbol, snapshot = message.is_snapshot)
    )]
    pub fn on_book(
        &mut self,
        message: &BookMessage,
    ) -> Result<Vec<PositionEvent>, MarketDataError> {
        self.book.apply(message)?;

        let top = self.book.top();
        if !top.is_two_sided() {
            debug!(
                bids = self.book.bids().len(),
                asks = self.book.asks().len(),
                "One-sided book"
            );
        }

        Ok(self.evaluate(&top))
    }

    /// Run every rule, in order, against `top`.
    pub fn evaluate(&mut self, top: &BookTop) -> Vec<PositionEvent> {
        let mut events = Vec::new();

        for rule in RULES.iter() {
            if !(rule.applies)(&self.position, top, &self.params) {
                continue;
            }
            if let Some(event) = self.transition(rule.action, top) {
                events.push(event);
            }
        }

        events
    }

    fn transition(&mut self, action: PositionAction, top: &BookTop) -> Option<PositionEvent> {
        let pos = self.position;
        let (price, size) = match action {
            PositionAction::EnterLong => {
                let ask = top.best_ask?;
                let size = self.entry_size(ask)?;
                self.position.open(size, ask, self.fee_cost);
                (ask, size)
            }
            PositionAction::EnterShort => {
                let bid = top.best_bid?;
                let size = -self.entry_size(bid)?;
                self.position.open(size, bid, self.fee_cost);
                (bid, size)
            }
            PositionAction::ExitLong | PositionAction::StopLong => {
                let bid = top.best_bid?;
                let gain = pos.size * (bid - pos.entry_price);
                self.position.close(gain, self.fee_cost);
                (bid, pos.size)
            }
            PositionAction::ExitShort | PositionAction::StopShort => {
                let ask = top.best_ask?;
                let gain = pos.size * (pos.entry_price - ask);
                self.position.close(gain, self.fee_cost);
                (ask, pos.size)
            }
        };

        info!(
            action = %action,
            total_bid = %top.total_bid_volume,
            total_ask = %top.total_ask_volume,
            bid = ?top.best_bid,
            ask = ?top.best_ask,
            delta = %top.imbalance(),
            price = %price,
            size = %size,
            pnl = %self.position.realized_pnl,
            "Position transition"
        );

        Some(PositionEvent {
            symbol: self.symbol.clone(),
            action,
            price,
            size,
            pnl: self.position.realized_pnl,
        })
    }

    fn entry_size(&self, price: Decimal) -> Option<Decimal> {
        let size = self.trade_size.checked_div(price);
        if size.is_none() {
            warn!(price = %price, "Entry size not representable, skipping entry");
        }
        size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::Basket;
    use crate::orderbook::Level;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    fn machine() -> PositionStateMachine {
        let ctx = StrategyContext::builder(Basket::new(["USD", "BTC", "ETH"]).unwrap(), "USD")
            .build()
            .unwrap();
        PositionStateMachine::new("BTC/USD", &ctx)
    }

    fn message(
        snapshot: bool,
        bids: &[(Decimal, Decimal)],
        asks: &[(Decimal, Decimal)],
    ) -> BookMessage {
        BookMessage {
            symbol: "BTC/USD".to_string(),
            is_snapshot: snapshot,
            bids: bids.iter().map(|&(p, v)| Level::new(p, v)).collect(),
            asks: asks.iter().map(|&(p, v)| Level::new(p, v)).collect(),
        }
    }

    /// Opens a long of size 10 at 100 with PnL −2.5.
    fn long_machine() -> PositionStateMachine {
        let mut m = machine();
        m.on_book(&message(true, &[(dec!(99.5), dec!(50))], &[(dec!(100), dec!(10))]))
            .unwrap();
        m
    }

    #[test]
    fn imbalance_opens_long_at_best_ask() {
        let mut m = machine();
        let events = m
            .on_book(&message(true, &[(dec!(99.5), dec!(50))], &[(dec!(100), dec!(10))]))
            .unwrap();

        assert_eq!(
            events,
            vec![PositionEvent {
                symbol: "BTC/USD".to_string(),
                action: PositionAction::EnterLong,
                price: dec!(100),
                size: dec!(10),
                pnl: dec!(-2.5),
            }]
        );
        assert_eq!(m.state(), PositionState::Long);
        assert_eq!(m.position().entry_price, dec!(100));
        assert_eq!(m.pnl(), dec!(-2.5));
    }

    #[test]
    fn ask_pressure_opens_short_at_best_bid() {
        let mut m = machine();
        let events = m
            .on_book(&message(true, &[(dec!(100), dec!(5))], &[(dec!(100.5), dec!(40))]))
            .unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].action, PositionAction::EnterShort);
        assert_eq!(m.state(), PositionState::Short);
        assert_eq!(m.position().size, dec!(-10));
        assert_eq!(m.position().entry_price, dec!(100));
    }

    #[test]
    fn no_second_entry_while_open() {
        let mut m = long_machine();
        let events = m
            .on_book(&message(false, &[(dec!(99.4), dec!(20))], &[]))
            .unwrap();

        assert!(events.is_empty());
        assert_eq!(m.pnl(), dec!(-2.5));
    }

    #[test]
    fn take_profit_long() {
        let mut m = long_machine();
        let events = m
            .on_book(&message(
                false,
                &[(dec!(100.81), dec!(5))],
                &[(dec!(100), dec!(0)), (dec!(101), dec!(10))],
            ))
            .unwrap();

        // −2.5 + 10 × 0.81 − 2.5
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].action, PositionAction::ExitLong);
        assert_eq!(events[0].price, dec!(100.81));
        assert_eq!(m.pnl(), dec!(3.1));
        assert_eq!(m.state(), PositionState::Flat);
    }

    #[test]
    fn adverse_ask_stops_out_long() {
        let mut m = long_machine();
        let events = m
            .on_book(&message(
                false,
                &[(dec!(99.5), dec!(0)), (dec!(98.9), dec!(50))],
                &[(dec!(100), dec!(0)), (dec!(99), dec!(10))],
            ))
            .unwrap();

        // −2.5 + 10 × (98.9 − 100) − 2.5
        let actions: Vec<PositionAction> = events.iter().map(|e| e.action).collect();
        assert_eq!(actions, vec![PositionAction::StopLong]);
        assert_eq!(m.pnl(), dec!(-16));
        assert_eq!(m.state(), PositionState::Flat);
    }

    #[test]
    fn short_closes_with_entry_minus_ask() {
        let mut m = machine();
        m.on_book(&message(true, &[(dec!(100), dec!(5))], &[(dec!(100.5), dec!(40))]))
            .unwrap();

        let events = m
            .on_book(&message(false, &[(dec!(100.2), dec!(1))], &[]))
            .unwrap();

        // −2.5 + (−10) × (100 − 100.5) − 2.5
        assert_eq!(events[0].action, PositionAction::StopShort);
        assert_eq!(events[0].price, dec!(100.5));
        assert_eq!(m.pnl(), dec!(0));
    }

    #[test]
    fn one_sided_book_never_opens() {
        let mut m = machine();
        let events = m
            .on_book(&message(true, &[(dec!(99), dec!(100))], &[]))
            .unwrap();

        assert!(events.is_empty());
        assert_eq!(m.state(), PositionState::Flat);
        assert_eq!(m.pnl(), Decimal::ZERO);
    }

    #[test]
    fn take_profit_long_on_bids_alone() {
        let mut m = long_machine();
        // Removing the only ask leaves the ask side empty.
        let events = m
            .on_book(&message(false, &[(dec!(101), dec!(5))], &[(dec!(100), dec!(0))]))
            .unwrap();

        assert!(m.book().asks().is_empty());
        assert_eq!(
            events,
            vec![PositionEvent {
                symbol: "BTC/USD".to_string(),
                action: PositionAction::ExitLong,
                price: dec!(101),
                size: dec!(10),
                // −2.5 + 10 × (101 − 100) − 2.5
                pnl: dec!(5),
            }]
        );
        assert_eq!(m.state(), PositionState::Flat);
    }

    #[test]
    fn empty_bid_side_keeps_long_open() {
        let mut m = long_machine();
        let events = m
            .on_book(&message(false, &[(dec!(99.5), dec!(0))], &[(dec!(99), dec!(10))]))
            .unwrap();

        assert!(events.is_empty());
        assert_eq!(m.state(), PositionState::Long);
        assert_eq!(m.pnl(), dec!(-2.5));
    }

    #[test]
    fn take_profit_short_settles_at_best_ask() {
        let mut m = machine();
        m.on_book(&message(true, &[(dec!(100), dec!(5))], &[(dec!(100.5), dec!(40))]))
            .unwrap();

        let events = m
            .on_book(&message(
                false,
                &[],
                &[(dec!(100.5), dec!(0)), (dec!(99.2), dec!(40))],
            ))
            .unwrap();

        // −2.5 + (−10) × (100 − 99.2) − 2.5
        assert_eq!(
            events,
            vec![PositionEvent {
                symbol: "BTC/USD".to_string(),
                action: PositionAction::ExitShort,
                price: dec!(99.2),
                size: dec!(-10),
                pnl: dec!(-13),
            }]
        );
        assert_eq!(m.state(), PositionState::Flat);
        assert_eq!(m.pnl(), dec!(-13));
    }

    #[test]
    fn rejected_message_changes_nothing() {
        let mut m = long_machine();
        let before_book = m.book().clone();

        let result = m.on_book(&message(false, &[(dec!(0), dec!(1))], &[]));

        assert!(result.is_err());
        assert_eq!(m.book(), &before_book);
        assert_eq!(m.state(), PositionState::Long);
    }
}
