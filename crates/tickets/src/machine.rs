use std::sync::Arc;

use {
    relaydesk_common::now_ms,
    tracing::{info, warn},
};

#[cfg(feature = "metrics")]
use relaydesk_metrics::{counter, tickets as ticket_metrics};

use crate::{
    TicketError,
    model::{Ticket, TicketStatus, User},
    store::TicketStore,
};

type Result<T> = std::result::Result<T, TicketError>;

/// Owns ticket status transitions and claim arbitration.
#[derive(Clone)]
pub struct TicketMachine {
    store: Arc<dyn TicketStore>,
}

impl TicketMachine {
    pub fn new(store: Arc<dyn TicketStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn TicketStore> {
        &self.store
    }

    /// Open a new WAITING ticket. A user may hold several.
    pub async fn create(&self, user: &User) -> Result<Ticket> {
        let ticket = self.store.create_ticket(user.id, now_ms()).await?;
        info!(ticket_id = ticket.id, user_id = user.id, "ticket opened");
        #[cfg(feature = "metrics")]
        counter!(ticket_metrics::CREATED_TOTAL).increment(1);
        Ok(ticket)
    }

    /// Assign a WAITING ticket to `operator_id`.
    ///
    /// Exactly one of any number of concurrent claimers succeeds; the rest
    /// get [`TicketError::AlreadyClaimed`], as does a claim on a missing
    /// ticket.
    pub async fn claim(&self, ticket_id: i64, operator_id: i64) -> Result<Ticket> {
        let Some(ticket) = self
            .store
            .claim_ticket(ticket_id, operator_id, now_ms())
            .await?
        else {
            #[cfg(feature = "metrics")]
            counter!(ticket_metrics::CLAIMS_TOTAL, "outcome" => "rejected").increment(1);
            return Err(TicketError::AlreadyClaimed { ticket_id });
        };

        info!(ticket_id, operator_id, "ticket claimed");
        #[cfg(feature = "metrics")]
        counter!(ticket_metrics::CLAIMS_TOTAL, "outcome" => "claimed").increment(1);

        if let Err(e) = self.store.clear_intake_for_ticket(ticket_id).await {
            warn!(ticket_id, error = %e, "failed to clear intake session after claim");
        }
        Ok(ticket)
    }

    /// Close an ASSIGNED ticket. Only its operator may do so.
    pub async fn close(&self, ticket_id: i64, operator_id: i64) -> Result<Ticket> {
        if let Some(ticket) = self
            .store
            .close_ticket(ticket_id, operator_id, now_ms())
            .await?
        {
            info!(ticket_id, operator_id, "ticket closed");
            #[cfg(feature = "metrics")]
            counter!(ticket_metrics::CLOSES_TOTAL).increment(1);
            return Ok(ticket);
        }

        match self.store.get_ticket(ticket_id).await? {
            None => Err(TicketError::NotFound { ticket_id }),
            Some(_) => Err(TicketError::NotOwner { ticket_id }),
        }
    }

    /// The ticket, if `operator_id` is its assigned operator.
    pub async fn owned_by(&self, ticket_id: i64, operator_id: i64) -> Result<Ticket> {
        let ticket = self
            .store
            .get_ticket(ticket_id)
            .await?
            .ok_or(TicketError::NotFound { ticket_id })?;
        if ticket.status == TicketStatus::Waiting || ticket.operator_id != Some(operator_id) {
            return Err(TicketError::NotOwner { ticket_id });
        }
        Ok(ticket)
    }
}
