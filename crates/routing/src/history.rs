//! Replays a user's other tickets to the operator handling the current one.

use std::sync::Arc;

use {
    futures::{Stream, StreamExt, stream::BoxStream},
    relaydesk_channels::ChannelOutbound,
    relaydesk_tickets::{
        SenderRole, Ticket, TicketError, TicketMachine, TicketStatus, TicketStore, User,
    },
    tracing::{debug, warn},
};

#[cfg(feature = "metrics")]
use relaydesk_metrics::{counter, history as history_metrics};

use crate::{Result, texts};

/// One step of a history replay, in delivery order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplayEvent {
    Header {
        ticket_id: i64,
        status: TicketStatus,
        created_at: i64,
        closed_at: Option<i64>,
        operator_label: String,
    },
    /// Starts a run of consecutive messages from one side.
    Label {
        ticket_id: i64,
        role: SenderRole,
        label: String,
    },
    /// Copy `origin_message_id` out of `from_chat_id`.
    Message {
        ticket_id: i64,
        message_id: i64,
        role: SenderRole,
        from_chat_id: i64,
        origin_message_id: i64,
    },
    /// Operator message on a ticket that has no operator to copy from.
    Skipped { ticket_id: i64, message_id: i64 },
    Footer {
        ticket_id: i64,
        messages: usize,
        skipped: usize,
    },
    Summary { tickets: usize, messages: usize },
}

impl ReplayEvent {
    /// Text shown to the operator, `None` for messages that are copied.
    pub fn render(&self) -> Option<String> {
        match self {
            Self::Header {
                ticket_id,
                status,
                created_at,
                closed_at,
                operator_label,
            } => {
                let closed = closed_at.map_or_else(|| "-".to_string(), texts::timestamp);
                Some(format!(
                    "Ticket #{ticket_id} ({status})\nOpened: {}\nClosed: {closed}\nOperator: {operator_label}",
                    texts::timestamp(*created_at),
                ))
            },
            Self::Label { role, label, .. } => Some(match role {
                SenderRole::User => format!("Client {label}:"),
                SenderRole::Operator => format!("Operator {label}:"),
            }),
            Self::Message { .. } | Self::Skipped { .. } => None,
            Self::Footer {
                ticket_id,
                messages,
                skipped,
            } => Some(if *skipped == 0 {
                format!("End of ticket #{ticket_id} ({messages} messages)")
            } else {
                format!("End of ticket #{ticket_id} ({messages} messages, {skipped} unavailable)")
            }),
            Self::Summary { tickets: 0, .. } => Some("No previous tickets.".to_string()),
            Self::Summary { tickets, messages } => Some(format!(
                "History complete: {tickets} previous tickets, {messages} messages."
            )),
        }
    }
}

/// Outcome of [`HistoryReconstructor::deliver`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayReport {
    pub tickets: usize,
    pub forwarded: usize,
    pub failed: usize,
    pub skipped: usize,
}

#[derive(Clone)]
pub struct HistoryReconstructor {
    machine: TicketMachine,
    outbound: Arc<dyn ChannelOutbound>,
}

impl HistoryReconstructor {
    pub fn new(machine: TicketMachine, outbound: Arc<dyn ChannelOutbound>) -> Self {
        Self { machine, outbound }
    }

    fn store(&self) -> &Arc<dyn TicketStore> {
        self.machine.store()
    }

    /// Stream every other ticket of the current ticket's owner, oldest
    /// first.
    ///
    /// Fails up front with [`TicketError::NotOwner`] unless
    /// `operator_id` is assigned to `current_ticket_id`.
    pub async fn replay_other_tickets(
        &self,
        current_ticket_id: i64,
        operator_id: i64,
    ) -> Result<BoxStream<'static, Result<ReplayEvent>>> {
        let current = self
            .machine
            .owned_by(current_ticket_id, operator_id)
            .await?;
        let user = self
            .store()
            .get_user(current.user_id)
            .await?
            .ok_or(TicketError::NotFound {
                ticket_id: current_ticket_id,
            })?;
        let others: Vec<Ticket> = self
            .store()
            .tickets_for_user(user.id)
            .await?
            .into_iter()
            .filter(|t| t.id != current_ticket_id)
            .collect();

        Ok(Box::pin(replay_stream(Arc::clone(self.store()), user, others)))
    }

    /// Run a replay and send it to the operator.
    ///
    /// A message that can no longer be copied is logged and counted; the
    /// replay carries on with the next one.
    pub async fn deliver(&self, current_ticket_id: i64, operator_id: i64) -> Result<ReplayReport> {
        let mut events = self
            .replay_other_tickets(current_ticket_id, operator_id)
            .await?;
        #[cfg(feature = "metrics")]
        counter!(history_metrics::REPLAYS_TOTAL).increment(1);

        let mut report = ReplayReport::default();
        while let Some(event) = events.next().await {
            let event = event?;
            match &event {
                ReplayEvent::Message {
                    ticket_id,
                    message_id,
                    from_chat_id,
                    origin_message_id,
                    ..
                } => match self
                    .outbound
                    .copy_message(operator_id, *from_chat_id, *origin_message_id)
                    .await
                {
                    Ok(_) => report.forwarded += 1,
                    Err(e) => {
                        report.failed += 1;
                        warn!(
                            ticket_id,
                            message_id,
                            error = %e,
                            "failed to replay message"
                        );
                        #[cfg(feature = "metrics")]
                        counter!(history_metrics::FORWARD_FAILURES_TOTAL).increment(1);
                    },
                },
                ReplayEvent::Skipped { .. } => report.skipped += 1,
                ReplayEvent::Header { .. } => {
                    report.tickets += 1;
                    self.send(operator_id, &event).await;
                },
                _ => self.send(operator_id, &event).await,
            }
        }

        debug!(
            ticket_id = current_ticket_id,
            operator_id,
            tickets = report.tickets,
            forwarded = report.forwarded,
            failed = report.failed,
            "history delivered"
        );
        Ok(report)
    }

    async fn send(&self, operator_id: i64, event: &ReplayEvent) {
        let Some(text) = event.render() else {
            return;
        };
        if let Err(e) = self.outbound.send_text(operator_id, &text, None).await {
            warn!(operator_id, error = %e, "failed to send history text");
        }
    }
}

fn replay_stream(
    store: Arc<dyn TicketStore>,
    user: User,
    others: Vec<Ticket>,
) -> impl Stream<Item = Result<ReplayEvent>> + Send + 'static {
    async_stream::try_stream! {
        let user_label = label(
            user.username.as_deref(),
            user.first_name.as_deref(),
            Some(user.external_id),
        );
        let mut total_messages = 0;
        for ticket in &others {
            let operator_label = operator_label(store.as_ref(), ticket.operator_id).await?;
            yield ReplayEvent::Header {
                ticket_id: ticket.id,
                status: ticket.status,
                created_at: ticket.created_at,
                closed_at: ticket.closed_at,
                operator_label: operator_label.clone(),
            };

            let messages = store.messages_for_ticket(ticket.id).await?;
            let mut last_role = None;
            let mut skipped = 0;
            for message in &messages {
                let from_chat_id = match message.role {
                    SenderRole::User => Some(user.external_id),
                    SenderRole::Operator => ticket.operator_id,
                };
                let Some(from_chat_id) = from_chat_id else {
                    skipped += 1;
                    yield ReplayEvent::Skipped {
                        ticket_id: ticket.id,
                        message_id: message.id,
                    };
                    continue;
                };

                if last_role != Some(message.role) {
                    last_role = Some(message.role);
                    yield ReplayEvent::Label {
                        ticket_id: ticket.id,
                        role: message.role,
                        label: match message.role {
                            SenderRole::User => user_label.clone(),
                            SenderRole::Operator => operator_label.clone(),
                        },
                    };
                }
                yield ReplayEvent::Message {
                    ticket_id: ticket.id,
                    message_id: message.id,
                    role: message.role,
                    from_chat_id,
                    origin_message_id: message.origin_message_id,
                };
            }

            let delivered = messages.len() - skipped;
            total_messages += delivered;
            yield ReplayEvent::Footer {
                ticket_id: ticket.id,
                messages: delivered,
                skipped,
            };
        }
        yield ReplayEvent::Summary {
            tickets: others.len(),
            messages: total_messages,
        };
    }
}

/// "@handle", else first name, else raw id, else "unknown".
fn label(username: Option<&str>, first_name: Option<&str>, id: Option<i64>) -> String {
    if let Some(handle) = username.filter(|u| !u.is_empty()) {
        return format!("@{handle}");
    }
    if let Some(name) = first_name.filter(|n| !n.trim().is_empty()) {
        return name.to_string();
    }
    id.map_or_else(|| "unknown".to_string(), |id| id.to_string())
}

async fn operator_label(store: &dyn TicketStore, operator_id: Option<i64>) -> Result<String> {
    let Some(id) = operator_id else {
        return Ok(label(None, None, None));
    };
    Ok(match store.find_user_by_external(id).await? {
        Some(op) => label(op.username.as_deref(), op.first_name.as_deref(), Some(id)),
        None => label(None, None, Some(id)),
    })
}
