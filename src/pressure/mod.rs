//! Order-book pressure strategy.
//!
//! This module handles:
//! - Ordered position rules
//! - The per-instrument position state machine

pub mod machine;
pub mod rules;

pub use machine::{PositionEvent, PositionStateMachine};
pub use rules::{PositionAction, Rule, RuleParams, RULES};
