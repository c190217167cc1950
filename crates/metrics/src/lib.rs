//! Metrics collection and export for relaydesk.
//!
//! Crates record through the `metrics` facade macros behind their own
//! `metrics` feature; the binary installs a recorder with [`init_metrics`].
//! With the `prometheus` feature the recorder also serves a scrape endpoint.

mod definitions;
pub mod error;
mod recorder;

pub use {
    definitions::*,
    error::{Error, Result},
    recorder::{MetricsRecorderConfig, init_metrics},
};

// Re-export metrics macros for convenience
pub use metrics::{counter, gauge, histogram};
