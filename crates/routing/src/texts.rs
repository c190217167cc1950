//! User-facing copy.

use {
    chrono::{DateTime, Utc},
    relaydesk_tickets::{Ticket, User},
};

pub const WELCOME: &str = "Hello! This is the support desk. Pick a topic below.";
pub const WARRANTY: &str = "Warranty claims: keep your receipt and the serial number handy. \
                            An operator can help if the product is faulty.";
pub const REFUND: &str = "Refunds are accepted within 14 days of purchase for items in \
                          original condition.";
pub const ASK_OPERATOR: &str = "Would you like to talk to an operator?";
pub const ASK_PHONE: &str = "Please send your phone number so the operator can reach you.";
pub const BAD_PHONE: &str = "That does not look like a phone number. Try again, e.g. +15551234567.";
pub const CONNECTING: &str = "Thanks! Looking for a free operator. Meanwhile, describe your \
                              issue and attach photos or documents if you have them.";
pub const SESSION_ABANDONED: &str = "Your previous request timed out. Let's start over.";
pub const OPERATOR_CONNECTED: &str = "An operator has joined the conversation.";
pub const OPERATOR_DISCONNECTED: &str = "The operator has closed the conversation. Send /start \
                                         if you need anything else.";
pub const DIALOG_CLOSED: &str = "Dialog closed.";
pub const DELIVERY_FAILED: &str = "Your message could not be delivered. Please try again.";

pub const CLAIMED: &str = "Ticket assigned to you";
pub const ALREADY_TAKEN: &str = "Already taken or no longer relevant";
pub const NOT_YOURS: &str = "This is not your dialog";
pub const NOT_FOUND: &str = "Ticket not found";

pub const BUTTON_WARRANTY: &str = "Warranty claim";
pub const BUTTON_REFUND: &str = "Product return";
pub const BUTTON_OTHER: &str = "Other question";
pub const BUTTON_BACK: &str = "Back to start";
pub const BUTTON_YES_OPERATOR: &str = "Yes, contact an operator";
pub const BUTTON_CLAIM: &str = "Take ticket";
pub const BUTTON_HISTORY: &str = "Previous tickets";
pub const BUTTON_FINISH: &str = "Close dialog";

fn or_dash(value: Option<&str>) -> &str {
    value.filter(|v| !v.is_empty()).unwrap_or("-")
}

fn handle(user: &User) -> String {
    user.username
        .as_deref()
        .map_or_else(|| "-".to_string(), |u| format!("@{u}"))
}

/// Announcement posted to the operators chat for a new ticket.
pub fn new_ticket(ticket: &Ticket, user: &User) -> String {
    format!(
        "New client #{}\nName: {}\nUsername: {}\nID: {}\nPhone: {}",
        ticket.id,
        or_dash(user.first_name.as_deref()),
        handle(user),
        user.external_id,
        or_dash(user.phone.as_deref()),
    )
}

/// Summary sent to the operator who claimed a ticket.
pub fn claimed_summary(ticket: &Ticket, user: &User) -> String {
    format!(
        "You took ticket #{} (user {}, {}, phone {}).\nWrite here: the bot forwards everything \
         to the user.",
        ticket.id,
        or_dash(user.first_name.as_deref()),
        handle(user),
        or_dash(user.phone.as_deref()),
    )
}

pub fn timestamp(ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .map_or_else(|| ms.to_string(), |t| t.format("%Y-%m-%d %H:%M UTC").to_string())
}
