//! Persistent entities: users, tickets, the message log and intake state.

use std::{fmt, path::PathBuf, str::FromStr};

use {
    relaydesk_channels::{ContentKind, MediaKind},
    serde::{Deserialize, Serialize},
};

use crate::Error;

/// An external party, end user or operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: i64,
    /// Platform id; also the private chat id.
    pub external_id: i64,
    pub first_name: Option<String>,
    pub username: Option<String>,
    pub phone: Option<String>,
    /// Monotonic: once set it is never cleared.
    pub is_operator: bool,
    pub created_at: i64,
    pub last_seen_at: i64,
}

/// Profile fields refreshed on every contact.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserProfile {
    pub external_id: i64,
    pub first_name: Option<String>,
    pub username: Option<String>,
}

impl UserProfile {
    pub fn new(external_id: i64) -> Self {
        Self {
            external_id,
            ..Default::default()
        }
    }
}

impl From<&relaydesk_channels::SenderProfile> for UserProfile {
    fn from(sender: &relaydesk_channels::SenderProfile) -> Self {
        Self {
            external_id: sender.id,
            first_name: Some(sender.first_name.clone()).filter(|n| !n.trim().is_empty()),
            username: sender.username.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketStatus {
    Waiting,
    Assigned,
    Closed,
}

impl TicketStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Waiting => "WAITING",
            Self::Assigned => "ASSIGNED",
            Self::Closed => "CLOSED",
        }
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "WAITING" => Ok(Self::Waiting),
            "ASSIGNED" => Ok(Self::Assigned),
            "CLOSED" => Ok(Self::Closed),
            other => Err(Error::corrupt("tickets", format!("unknown status {other}"))),
        }
    }
}

/// One support conversation.
///
/// `operator_id` is set iff the status is past WAITING, `closed_at` iff the
/// ticket is CLOSED.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ticket {
    pub id: i64,
    pub user_id: i64,
    pub operator_id: Option<i64>,
    pub status: TicketStatus,
    pub created_at: i64,
    pub assigned_at: Option<i64>,
    pub closed_at: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SenderRole {
    User,
    Operator,
}

impl SenderRole {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Operator => "operator",
        }
    }
}

impl fmt::Display for SenderRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SenderRole {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "operator" => Ok(Self::Operator),
            other => Err(Error::corrupt(
                "ticket_messages",
                format!("unknown sender role {other}"),
            )),
        }
    }
}

/// A message to append to a ticket's log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub ticket_id: i64,
    pub sender_id: i64,
    pub role: SenderRole,
    /// Message id in the sender's chat, used to re-copy during replay.
    pub origin_message_id: i64,
    pub content_kind: ContentKind,
    pub text: Option<String>,
    pub caption: Option<String>,
    pub created_at: i64,
}

/// A logged message. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredMessage {
    pub id: i64,
    pub ticket_id: i64,
    pub sender_id: i64,
    pub role: SenderRole,
    pub origin_message_id: i64,
    pub content_kind: ContentKind,
    pub text: Option<String>,
    pub caption: Option<String>,
    pub created_at: i64,
}

/// Stored media record of one message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attachment {
    pub id: i64,
    pub message_id: i64,
    pub ticket_id: i64,
    pub kind: MediaKind,
    pub file_id: String,
    pub file_unique_id: Option<String>,
    pub file_name: Option<String>,
    pub mime_type: Option<String>,
    pub file_size: Option<u64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub duration: Option<u32>,
    pub local_path: Option<PathBuf>,
    pub created_at: i64,
}

/// Where a user is in the ticket-creation conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum IntakeStep {
    /// Asked to contact an operator; waiting for a phone number.
    AwaitingPhone,
    /// Ticket created; further messages are logged into it until claimed.
    CollectingDetails { ticket_id: i64 },
}

impl IntakeStep {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::AwaitingPhone => "awaiting_phone",
            Self::CollectingDetails { .. } => "collecting_details",
        }
    }

    pub(crate) fn ticket_id(self) -> Option<i64> {
        match self {
            Self::AwaitingPhone => None,
            Self::CollectingDetails { ticket_id } => Some(ticket_id),
        }
    }

    pub(crate) fn from_parts(step: &str, ticket_id: Option<i64>) -> crate::Result<Self> {
        match (step, ticket_id) {
            ("awaiting_phone", _) => Ok(Self::AwaitingPhone),
            ("collecting_details", Some(ticket_id)) => Ok(Self::CollectingDetails { ticket_id }),
            (step, ticket_id) => Err(Error::corrupt(
                "intake_sessions",
                format!("step {step} with ticket {ticket_id:?}"),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IntakeSession {
    pub user_id: i64,
    #[serde(flatten)]
    pub step: IntakeStep,
    pub updated_at: i64,
}

impl IntakeSession {
    /// Untouched for longer than `abandon_after_ms` at `now`.
    #[must_use]
    pub fn is_stale(&self, now: i64, abandon_after_ms: i64) -> bool {
        now.saturating_sub(self.updated_at) > abandon_after_ms
    }
}
