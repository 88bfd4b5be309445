//! Ordered position rules.
//!
//! Rules are evaluated top to bottom against the same book aggregates, and
//! each one sees the position left behind by the rules before it.

use rust_decimal::Decimal;
use serde::Serialize;
use strum::{Display, EnumString};

use crate::orderbook::BookTop;
use crate::trading::{Position, PositionState};

/// Transition a rule performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, EnumString)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum PositionAction {
    /// Open a long at the best ask.
    EnterLong,
    /// Open a short at the best bid.
    EnterShort,
    /// Take profit on a long.
    ExitLong,
    /// Take profit on a short.
    ExitShort,
    /// Stop out a long.
    StopLong,
    /// Stop out a short.
    StopShort,
}

/// Thresholds the predicates compare against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleParams {
    /// Minimum volume imbalance to open a position.
    pub entry_threshold: Decimal,
    /// Take-profit distance as a fraction of entry price.
    pub target_fraction: Decimal,
}

impl RuleParams {
    fn target_offset(&self, entry_price: Decimal) -> Decimal {
        self.target_fraction * entry_price
    }
}

/// Predicate deciding whether a rule fires.
pub type Predicate = fn(&Position, &BookTop, &RuleParams) -> bool;

/// One predicate → action pair.
#[derive(Clone, Copy)]
pub struct Rule {
    /// Transition performed when the predicate holds.
    pub action: PositionAction,
    /// Condition on the current position and book.
    pub applies: Predicate,
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule").field("action", &self.action).finish()
    }
}

/// Rules in evaluation order.
pub const RULES: [Rule; 6] = [
    Rule {
        action: PositionAction::EnterLong,
        applies: enter_long,
    },
    Rule {
        action: PositionAction::EnterShort,
        applies: enter_short,
    },
    Rule {
        action: PositionAction::ExitLong,
        applies: exit_long,
    },
    Rule {
        action: PositionAction::ExitShort,
        applies: exit_short,
    },
    Rule {
        action: PositionAction::StopLong,
        applies: stop_long,
    },
    Rule {
        action: PositionAction::StopShort,
        applies: stop_short,
    },
];

fn enter_long(pos: &Position, top: &BookTop, params: &RuleParams) -> bool {
    pos.is_flat() && top.is_two_sided() && top.imbalance() > params.entry_threshold
}

fn enter_short(pos: &Position, top: &BookTop, params: &RuleParams) -> bool {
    pos.is_flat() && top.is_two_sided() && -top.imbalance() > params.entry_threshold
}

// Exits read only the quotes they trigger and settle on; an empty side
// never triggers a rule that compares against it.
fn exit_long(pos: &Position, top: &BookTop, params: &RuleParams) -> bool {
    let target = pos.entry_price + params.target_offset(pos.entry_price);
    pos.state() == PositionState::Long && top.best_bid.is_some_and(|bid| bid >= target)
}

fn exit_short(pos: &Position, top: &BookTop, params: &RuleParams) -> bool {
    let target = pos.entry_price - params.target_offset(pos.entry_price);
    pos.state() == PositionState::Short && top.best_ask.is_some_and(|ask| ask <= target)
}

// Any adverse quote stops the position out; there is no loss budget.
fn stop_long(pos: &Position, top: &BookTop, _: &RuleParams) -> bool {
    pos.state() == PositionState::Long
        && top.best_bid.is_some()
        && top.best_ask.is_some_and(|ask| ask < pos.entry_price)
}

fn stop_short(pos: &Position, top: &BookTop, _: &RuleParams) -> bool {
    pos.state() == PositionState::Short
        && top.best_ask.is_some()
        && top.best_bid.is_some_and(|bid| bid > pos.entry_price)
}
