//! Order book module for the pressure engine.
//!
//! This module handles:
//! - Level and book-side types
//! - The bounded-depth book model and its aggregates

pub mod book;
pub mod types;

pub use book::{BookModel, DEFAULT_DEPTH};
pub use types::{BookSide, BookTop, Level, SideSummary};
