//! Inbound message model.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::Error;

/// Who sent an inbound message or pressed a button.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SenderProfile {
    /// Stable platform id. In private chats this is also the chat id.
    pub id: i64,
    pub first_name: String,
    pub last_name: Option<String>,
    pub username: Option<String>,
    pub is_bot: bool,
}

impl SenderProfile {
    /// "First Last", or the handle when no name is set.
    #[must_use]
    pub fn display_name(&self) -> Option<String> {
        let last = self.last_name.as_deref().unwrap_or("");
        let name = format!("{} {last}", self.first_name).trim().to_string();
        if name.is_empty() {
            self.username.clone()
        } else {
            Some(name)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatKind {
    Private,
    Group,
    Channel,
}

/// Content kind of a logged message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Text,
    Photo,
    Document,
    Video,
    Voice,
    Audio,
    Animation,
    VideoNote,
    Sticker,
    Location,
    Contact,
    Other,
}

impl ContentKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Photo => "photo",
            Self::Document => "document",
            Self::Video => "video",
            Self::Voice => "voice",
            Self::Audio => "audio",
            Self::Animation => "animation",
            Self::VideoNote => "video_note",
            Self::Sticker => "sticker",
            Self::Location => "location",
            Self::Contact => "contact",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "text" => Self::Text,
            "photo" => Self::Photo,
            "document" => Self::Document,
            "video" => Self::Video,
            "voice" => Self::Voice,
            "audio" => Self::Audio,
            "animation" => Self::Animation,
            "video_note" => Self::VideoNote,
            "sticker" => Self::Sticker,
            "location" => Self::Location,
            "contact" => Self::Contact,
            "other" => Self::Other,
            other => return Err(Error::invalid_input(format!("unknown content kind: {other}"))),
        })
    }
}

/// Media kinds that produce attachment records.
///
/// Closed set: anything else an inbound message carries (stickers,
/// locations, polls) is not captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Photo,
    Document,
    Video,
    Voice,
    Audio,
    Animation,
    VideoNote,
}

impl MediaKind {
    pub const ALL: [Self; 7] = [
        Self::Photo,
        Self::Document,
        Self::Video,
        Self::Voice,
        Self::Audio,
        Self::Animation,
        Self::VideoNote,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Photo => "photo",
            Self::Document => "document",
            Self::Video => "video",
            Self::Voice => "voice",
            Self::Audio => "audio",
            Self::Animation => "animation",
            Self::VideoNote => "video_note",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| Error::invalid_input(format!("unknown media kind: {s}")))
    }
}

/// A downloadable file as described by the platform.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaFile {
    /// Reference usable for downloads and re-sends.
    pub file_id: String,
    /// Content-addressable id, stable across bots, when the platform has one.
    pub file_unique_id: Option<String>,
    pub file_name: Option<String>,
    pub mime_type: Option<String>,
    pub file_size: Option<u64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub duration: Option<u32>,
}

impl MediaFile {
    /// Pixel area, used to rank photo variants.
    #[must_use]
    pub fn area(&self) -> u64 {
        u64::from(self.width.unwrap_or(0)) * u64::from(self.height.unwrap_or(0))
    }
}

/// Every media slot an inbound message may fill.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaPayload {
    /// All resolutions of one photo, in platform order.
    pub photo: Vec<MediaFile>,
    pub document: Option<MediaFile>,
    pub video: Option<MediaFile>,
    pub voice: Option<MediaFile>,
    pub audio: Option<MediaFile>,
    pub animation: Option<MediaFile>,
    pub video_note: Option<MediaFile>,
}

impl MediaPayload {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.photo.is_empty()
            && self.document.is_none()
            && self.video.is_none()
            && self.voice.is_none()
            && self.audio.is_none()
            && self.animation.is_none()
            && self.video_note.is_none()
    }
}

/// One inbound chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub message_id: i64,
    pub chat_id: i64,
    pub chat_kind: ChatKind,
    pub sender: Option<SenderProfile>,
    pub content_kind: ContentKind,
    pub text: Option<String>,
    pub caption: Option<String>,
    #[serde(default)]
    pub media: MediaPayload,
}

impl InboundMessage {
    /// Text body or media caption.
    #[must_use]
    pub fn body(&self) -> Option<&str> {
        self.text.as_deref().or(self.caption.as_deref())
    }

    /// `true` for `/name` and `/name@bot` commands.
    #[must_use]
    pub fn is_command(&self, name: &str) -> bool {
        let Some(text) = self.text.as_deref() else {
            return false;
        };
        let Some(first) = text.split_whitespace().next() else {
            return false;
        };
        let Some(cmd) = first.strip_prefix('/') else {
            return false;
        };
        cmd.split('@').next() == Some(name)
    }
}

/// A button press.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundCallback {
    pub id: String,
    pub from: SenderProfile,
    pub data: Option<String>,
    /// Chat of the message carrying the keyboard, when still accessible.
    pub chat_id: Option<i64>,
    pub message_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundUpdate {
    Message(InboundMessage),
    Callback(InboundCallback),
}
