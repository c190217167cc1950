//! Platform-neutral messaging contract.
//!
//! The routing core only sees [`InboundMessage`]/[`InboundCallback`] values
//! and talks back through [`ChannelOutbound`]. A platform adapter (Telegram)
//! converts its native updates into these types and implements the trait.

pub mod error;
pub mod keyboard;
pub mod message;
pub mod outbound;

pub use {
    error::{Error, Result},
    keyboard::{InlineButton, InlineKeyboard},
    message::{
        ChatKind, ContentKind, InboundCallback, InboundMessage, InboundUpdate, MediaFile,
        MediaKind, MediaPayload, SenderProfile,
    },
    outbound::ChannelOutbound,
};
