//! Engine hosts.
//!
//! Each bot owns one engine, subscribes its provider, and runs the single
//! consumption loop for its stream until cancelled or the stream ends.

pub mod pressure;
pub mod triangle;

pub use pressure::{PressureBot, PressureReport};
pub use triangle::{TriangleBot, TriangleStats};
