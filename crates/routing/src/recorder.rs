use std::sync::Arc;

use {
    relaydesk_channels::{ChannelOutbound, InboundMessage},
    relaydesk_common::now_ms,
    relaydesk_media::MediaCapture,
    relaydesk_tickets::{Attachment, NewMessage, SenderRole, StoredMessage, TicketStore},
    tracing::warn,
};

use crate::Result;

/// A logged message with whatever attachments made it into storage.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub message: StoredMessage,
    pub attachments: Vec<Attachment>,
}

/// Appends inbound messages to a ticket's log, then captures their media.
///
/// The message row is committed before any download starts. Capture and
/// attachment inserts are best-effort and never undo it.
#[derive(Clone)]
pub struct MessageRecorder {
    store: Arc<dyn TicketStore>,
    outbound: Arc<dyn ChannelOutbound>,
    capture: MediaCapture,
}

impl MessageRecorder {
    pub fn new(
        store: Arc<dyn TicketStore>,
        outbound: Arc<dyn ChannelOutbound>,
        capture: MediaCapture,
    ) -> Self {
        Self {
            store,
            outbound,
            capture,
        }
    }

    pub async fn record(
        &self,
        ticket_id: i64,
        sender_id: i64,
        role: SenderRole,
        msg: &InboundMessage,
    ) -> Result<Recorded> {
        let message = self
            .store
            .append_message(&NewMessage {
                ticket_id,
                sender_id,
                role,
                origin_message_id: msg.message_id,
                content_kind: msg.content_kind,
                text: msg.text.clone(),
                caption: msg.caption.clone(),
                created_at: now_ms(),
            })
            .await?;

        let descriptors = self
            .capture
            .capture(self.outbound.as_ref(), msg, ticket_id, message.id)
            .await;
        let attachments = match self.store.add_attachments(&message, &descriptors).await {
            Ok(stored) => stored,
            Err(e) => {
                warn!(
                    ticket_id,
                    message_id = message.id,
                    count = descriptors.len(),
                    error = %e,
                    "failed to store attachments, message kept"
                );
                Vec::new()
            },
        };

        Ok(Recorded {
            message,
            attachments,
        })
    }
}
