//! Analysis modules.
//!
//! The aggregator holds the table transforms that every report section and
//! API endpoint is built from.

pub mod aggregator;

pub use aggregator::*;
