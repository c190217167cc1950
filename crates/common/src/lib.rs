//! Shared error definitions and small utilities used across all relaydesk crates.

pub mod error;
pub mod time;

pub use {
    error::{Error, FromMessage, Result},
    time::now_ms,
};
