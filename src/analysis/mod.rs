//! Survey analytics.
//!
//! Summaries are derived on demand and never persisted.

pub mod aggregator;

pub use aggregator::*;
