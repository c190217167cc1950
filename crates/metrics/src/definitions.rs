//! Metric names used throughout relaydesk.

/// Ticket lifecycle metrics
pub mod tickets {
    /// Tickets created by the intake flow
    pub const CREATED_TOTAL: &str = "relaydesk_tickets_created_total";
    /// Claim attempts (labelled by result: claimed, already_claimed)
    pub const CLAIMS_TOTAL: &str = "relaydesk_ticket_claims_total";
    /// Close attempts (labelled by result: closed, not_owner)
    pub const CLOSES_TOTAL: &str = "relaydesk_ticket_closes_total";
}

/// Message relay metrics
pub mod relay {
    /// Messages forwarded and logged (labelled by role: user, operator)
    pub const MESSAGES_RELAYED_TOTAL: &str = "relaydesk_messages_relayed_total";
    /// Inbound messages with no relay target
    pub const MESSAGES_UNROUTED_TOTAL: &str = "relaydesk_messages_unrouted_total";
    /// Forward calls rejected by the transport
    pub const FORWARD_ERRORS_TOTAL: &str = "relaydesk_relay_forward_errors_total";
    /// Relay handling duration in seconds
    pub const DURATION_SECONDS: &str = "relaydesk_relay_duration_seconds";
}

/// Attachment capture metrics
pub mod media {
    /// Attachments recorded (labelled by kind)
    pub const ATTACHMENTS_CAPTURED_TOTAL: &str = "relaydesk_attachments_captured_total";
    /// Downloads that failed and were recorded without a local path
    pub const DOWNLOAD_FAILURES_TOTAL: &str = "relaydesk_attachment_download_failures_total";
}

/// History replay metrics
pub mod history {
    /// History views served
    pub const REPLAYS_TOTAL: &str = "relaydesk_history_replays_total";
    /// Individual messages that could not be re-forwarded
    pub const FORWARD_FAILURES_TOTAL: &str = "relaydesk_history_forward_failures_total";
}

/// Telegram transport metrics
pub mod telegram {
    /// Updates received from Telegram
    pub const UPDATES_RECEIVED_TOTAL: &str = "relaydesk_telegram_updates_received_total";
    /// Bot API calls that failed
    pub const API_ERRORS_TOTAL: &str = "relaydesk_telegram_api_errors_total";
}
