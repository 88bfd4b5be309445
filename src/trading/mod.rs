//! Trading module for execution requests and positions.
//!
//! This module handles:
//! - Execution request types
//! - The execution backend interface and the paper portfolio
//! - Position tracking

pub mod execution;
pub mod order;
pub mod position;

pub use execution::{round_lot, ExecutionProvider, PaperPortfolio, LOT_DECIMALS};
pub use order::{ExecutionRequest, Side};
pub use position::{Position, PositionState};
