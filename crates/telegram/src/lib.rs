//! Telegram transport for relaydesk.
//!
//! Long-polls the Bot API, converts updates into the platform-neutral
//! model and hands them to the routing [`Dispatcher`](relaydesk_routing::Dispatcher).
//! [`TelegramOutbound`] carries the replies back.

pub mod bot;
pub mod error;
pub mod handlers;
pub mod outbound;
pub mod state;

pub use {
    bot::{connect, start_polling},
    error::{Error, Result},
    outbound::TelegramOutbound,
    state::{PollingHandle, TelegramBot},
};
