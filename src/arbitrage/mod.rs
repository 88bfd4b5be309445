//! Triangular arbitrage engine.
//!
//! This module handles:
//! - The all-pairs rate matrix
//! - Cycle evaluation and signals
//! - Tick-driven detection
//! - Best-effort execution of detected cycles

pub mod calculator;
pub mod detector;
pub mod executor;
pub mod matrix;

pub use calculator::{evaluate_cycle, ArbitrageSignal, Cycle, CycleValue};
pub use detector::ArbitrageDetector;
pub use executor::{ExecutionResult, TriangleExecutor};
pub use matrix::RateMatrix;
