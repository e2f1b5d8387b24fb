//! Metrics for the access layer
//!
//! Events and spans go through `tracing` (see [`crate::logging`]); this
//! module only defines the metric names and labels.

pub mod metrics;

pub use metrics::*;
