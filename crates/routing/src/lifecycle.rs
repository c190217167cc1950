//! Claim and close, plus the notifications each transition sends.

use std::sync::Arc;

use {
    relaydesk_channels::ChannelOutbound,
    relaydesk_common::now_ms,
    relaydesk_tickets::{SenderRole, Ticket, TicketError, TicketMachine, TicketStore, UserProfile},
    tracing::{debug, warn},
};

use crate::{Result, keyboards, texts};

#[derive(Clone)]
pub struct TicketLifecycle {
    machine: TicketMachine,
    outbound: Arc<dyn ChannelOutbound>,
}

impl TicketLifecycle {
    pub fn new(machine: TicketMachine, outbound: Arc<dyn ChannelOutbound>) -> Self {
        Self { machine, outbound }
    }

    fn store(&self) -> &Arc<dyn TicketStore> {
        self.machine.store()
    }

    /// Claim `ticket_id` for `operator`, then brief both parties.
    ///
    /// The operator gets the ticket summary with controls followed by
    /// every user message logged so far, oldest first. Once the claim is
    /// committed it stands: store and notification failures after that
    /// point are logged, never returned.
    pub async fn claim(&self, operator: &UserProfile, ticket_id: i64) -> Result<Ticket> {
        let ticket = self.machine.claim(ticket_id, operator.external_id).await?;
        self.mark_operator(operator, ticket_id).await;

        if let Err(e) = self.brief(operator, &ticket).await {
            warn!(
                ticket_id,
                operator_id = operator.external_id,
                error = %e,
                "claim stands but briefing is incomplete"
            );
        }
        Ok(ticket)
    }

    async fn brief(&self, operator: &UserProfile, ticket: &Ticket) -> Result<()> {
        let ticket_id = ticket.id;
        let user = self
            .store()
            .get_user(ticket.user_id)
            .await?
            .ok_or(TicketError::NotFound { ticket_id })?;

        self.notify(
            operator.external_id,
            &texts::claimed_summary(ticket, &user),
            Some(&keyboards::operator_controls(ticket_id)),
        )
        .await;

        let backlog = match self.store().messages_for_ticket(ticket_id).await {
            Ok(backlog) => backlog,
            Err(e) => {
                warn!(ticket_id, error = %e, "failed to load intake messages for operator");
                Vec::new()
            },
        };
        for message in backlog.iter().filter(|m| m.role == SenderRole::User) {
            if let Err(e) = self
                .outbound
                .copy_message(
                    operator.external_id,
                    user.external_id,
                    message.origin_message_id,
                )
                .await
            {
                warn!(
                    ticket_id,
                    message_id = message.id,
                    error = %e,
                    "failed to replay intake message to operator"
                );
            }
        }

        self.notify(user.external_id, texts::OPERATOR_CONNECTED, None)
            .await;
        debug!(ticket_id, operator_id = operator.external_id, backlog = backlog.len(), "claim delivered");
        Ok(())
    }

    /// Close `ticket_id` on behalf of its operator and tell the user.
    pub async fn close(&self, operator: &UserProfile, ticket_id: i64) -> Result<Ticket> {
        let ticket = self.machine.close(ticket_id, operator.external_id).await?;
        self.mark_operator(operator, ticket_id).await;

        match self.store().get_user(ticket.user_id).await {
            Ok(Some(user)) => {
                self.notify(user.external_id, texts::OPERATOR_DISCONNECTED, None)
                    .await;
            },
            Ok(None) => warn!(ticket_id, "closed ticket has no user to notify"),
            Err(e) => warn!(ticket_id, error = %e, "failed to look up user of closed ticket"),
        }
        self.notify(operator.external_id, texts::DIALOG_CLOSED, None)
            .await;
        Ok(ticket)
    }

    async fn mark_operator(&self, operator: &UserProfile, ticket_id: i64) {
        if let Err(e) = self.store().upsert_user(operator, true, now_ms()).await {
            warn!(
                ticket_id,
                operator_id = operator.external_id,
                error = %e,
                "failed to record operator"
            );
        }
    }

    async fn notify(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<&relaydesk_channels::InlineKeyboard>,
    ) {
        if let Err(e) = self.outbound.send_text(chat_id, text, keyboard).await {
            warn!(chat_id, error = %e, "failed to send notification");
        }
    }
}
