use {async_trait::async_trait, relaydesk_media::AttachmentDescriptor};

use crate::{
    Result,
    model::{
        Attachment, IntakeSession, IntakeStep, NewMessage, StoredMessage, Ticket, User,
        UserProfile,
    },
};

/// Durable storage for users, tickets, messages and attachments.
///
/// Status changes are conditional updates evaluated by the database, so
/// concurrent callers never both observe the same precondition.
#[async_trait]
pub trait TicketStore: Send + Sync {
    /// Create or refresh a user. `mark_operator` can only set the flag.
    async fn upsert_user(&self, profile: &UserProfile, mark_operator: bool, now: i64)
    -> Result<User>;
    async fn set_user_phone(&self, user_id: i64, phone: &str) -> Result<()>;
    async fn get_user(&self, user_id: i64) -> Result<Option<User>>;
    async fn find_user_by_external(&self, external_id: i64) -> Result<Option<User>>;
    /// Remove a user with all tickets, messages and attachments.
    async fn delete_user(&self, user_id: i64) -> Result<bool>;

    async fn create_ticket(&self, user_id: i64, now: i64) -> Result<Ticket>;
    async fn get_ticket(&self, ticket_id: i64) -> Result<Option<Ticket>>;
    /// WAITING → ASSIGNED in one conditional update. `None` when the ticket
    /// is missing or no longer WAITING.
    async fn claim_ticket(&self, ticket_id: i64, operator_id: i64, now: i64)
    -> Result<Option<Ticket>>;
    /// ASSIGNED → CLOSED, only for the assigned operator. `None` when the
    /// precondition does not hold at commit time.
    async fn close_ticket(&self, ticket_id: i64, operator_id: i64, now: i64)
    -> Result<Option<Ticket>>;
    /// Latest-assigned ASSIGNED ticket held by this operator.
    async fn assigned_ticket_for_operator(&self, operator_id: i64) -> Result<Option<Ticket>>;
    /// Latest-assigned ASSIGNED ticket owned by this user.
    async fn assigned_ticket_for_user(&self, user_id: i64) -> Result<Option<Ticket>>;
    /// All tickets of a user, oldest first.
    async fn tickets_for_user(&self, user_id: i64) -> Result<Vec<Ticket>>;

    async fn append_message(&self, message: &NewMessage) -> Result<StoredMessage>;
    async fn add_attachments(
        &self,
        message: &StoredMessage,
        attachments: &[AttachmentDescriptor],
    ) -> Result<Vec<Attachment>>;
    /// Ordered by `(created_at, id)`.
    async fn messages_for_ticket(&self, ticket_id: i64) -> Result<Vec<StoredMessage>>;
    async fn attachments_for_message(&self, message_id: i64) -> Result<Vec<Attachment>>;

    async fn get_intake(&self, user_id: i64) -> Result<Option<IntakeSession>>;
    async fn set_intake(&self, user_id: i64, step: IntakeStep, now: i64) -> Result<()>;
    async fn clear_intake(&self, user_id: i64) -> Result<()>;
    /// Drop whichever session is collecting details for this ticket.
    async fn clear_intake_for_ticket(&self, ticket_id: i64) -> Result<()>;
}
