//! Core domain types and logic.

pub mod analysis;
pub mod calendar;
pub mod config;
pub mod decompose;
pub mod error;
pub mod forecast;
pub mod metrics;
pub mod ohlcv;
pub mod preprocess;
pub mod stats;
pub mod universe;
