//! SQLite-backed ticket store using sqlx.

use std::path::PathBuf;

use {
    async_trait::async_trait,
    relaydesk_media::AttachmentDescriptor,
    sqlx::SqlitePool,
    tracing::debug,
};

use crate::{
    Error, Result,
    model::{
        Attachment, IntakeSession, IntakeStep, NewMessage, StoredMessage, Ticket, User,
        UserProfile,
    },
    store::TicketStore,
};

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    external_id: i64,
    first_name: Option<String>,
    username: Option<String>,
    phone: Option<String>,
    is_operator: bool,
    created_at: i64,
    last_seen_at: i64,
}

impl From<UserRow> for User {
    fn from(r: UserRow) -> Self {
        Self {
            id: r.id,
            external_id: r.external_id,
            first_name: r.first_name,
            username: r.username,
            phone: r.phone,
            is_operator: r.is_operator,
            created_at: r.created_at,
            last_seen_at: r.last_seen_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct TicketRow {
    id: i64,
    user_id: i64,
    operator_id: Option<i64>,
    status: String,
    created_at: i64,
    assigned_at: Option<i64>,
    closed_at: Option<i64>,
}

impl TryFrom<TicketRow> for Ticket {
    type Error = Error;

    fn try_from(r: TicketRow) -> Result<Self> {
        Ok(Self {
            id: r.id,
            user_id: r.user_id,
            operator_id: r.operator_id,
            status: r.status.parse()?,
            created_at: r.created_at,
            assigned_at: r.assigned_at,
            closed_at: r.closed_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct MessageRow {
    id: i64,
    ticket_id: i64,
    sender_id: i64,
    sender_role: String,
    origin_message_id: i64,
    content_kind: String,
    text: Option<String>,
    caption: Option<String>,
    created_at: i64,
}

impl TryFrom<MessageRow> for StoredMessage {
    type Error = Error;

    fn try_from(r: MessageRow) -> Result<Self> {
        Ok(Self {
            id: r.id,
            ticket_id: r.ticket_id,
            sender_id: r.sender_id,
            role: r.sender_role.parse()?,
            origin_message_id: r.origin_message_id,
            content_kind: r
                .content_kind
                .parse()
                .map_err(|e| Error::corrupt("ticket_messages", e))?,
            text: r.text,
            caption: r.caption,
            created_at: r.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct AttachmentRow {
    id: i64,
    message_id: i64,
    ticket_id: i64,
    media_kind: String,
    file_id: String,
    file_unique_id: Option<String>,
    file_name: Option<String>,
    mime_type: Option<String>,
    file_size: Option<i64>,
    width: Option<i64>,
    height: Option<i64>,
    duration: Option<i64>,
    local_path: Option<String>,
    created_at: i64,
}

impl TryFrom<AttachmentRow> for Attachment {
    type Error = Error;

    fn try_from(r: AttachmentRow) -> Result<Self> {
        Ok(Self {
            id: r.id,
            message_id: r.message_id,
            ticket_id: r.ticket_id,
            kind: r
                .media_kind
                .parse()
                .map_err(|e| Error::corrupt("message_attachments", e))?,
            file_id: r.file_id,
            file_unique_id: r.file_unique_id,
            file_name: r.file_name,
            mime_type: r.mime_type,
            file_size: r.file_size.and_then(|v| u64::try_from(v).ok()),
            width: r.width.and_then(|v| u32::try_from(v).ok()),
            height: r.height.and_then(|v| u32::try_from(v).ok()),
            duration: r.duration.and_then(|v| u32::try_from(v).ok()),
            local_path: r.local_path.map(PathBuf::from),
            created_at: r.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct IntakeRow {
    user_id: i64,
    step: String,
    ticket_id: Option<i64>,
    updated_at: i64,
}

impl TryFrom<IntakeRow> for IntakeSession {
    type Error = Error;

    fn try_from(r: IntakeRow) -> Result<Self> {
        Ok(Self {
            user_id: r.user_id,
            step: IntakeStep::from_parts(&r.step, r.ticket_id)?,
            updated_at: r.updated_at,
        })
    }
}

fn tickets_from_rows(rows: Vec<TicketRow>) -> Result<Vec<Ticket>> {
    rows.into_iter().map(Ticket::try_from).collect()
}

/// SQLite-backed persistence for the whole ticket domain.
pub struct SqliteTicketStore {
    pool: SqlitePool,
}

impl SqliteTicketStore {
    /// Connect, migrate and wrap a new pool.
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = crate::connect(database_url, max_connections).await?;
        crate::run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    /// Wrap an existing pool. Call [`crate::run_migrations`] first.
    pub fn with_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl TicketStore for SqliteTicketStore {
    async fn upsert_user(
        &self,
        profile: &UserProfile,
        mark_operator: bool,
        now: i64,
    ) -> Result<User> {
        let row = sqlx::query_as::<_, UserRow>(
            "INSERT INTO users (external_id, first_name, username, is_operator, created_at, last_seen_at)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(external_id) DO UPDATE SET
                first_name   = COALESCE(excluded.first_name, users.first_name),
                username     = COALESCE(excluded.username, users.username),
                is_operator  = MAX(users.is_operator, excluded.is_operator),
                last_seen_at = excluded.last_seen_at
             RETURNING *",
        )
        .bind(profile.external_id)
        .bind(&profile.first_name)
        .bind(&profile.username)
        .bind(mark_operator)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn set_user_phone(&self, user_id: i64, phone: &str) -> Result<()> {
        sqlx::query("UPDATE users SET phone = ? WHERE id = ?")
            .bind(phone)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_user(&self, user_id: i64) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Into::into))
    }

    async fn find_user_by_external(&self, external_id: i64) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE external_id = ?")
            .bind(external_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Into::into))
    }

    async fn delete_user(&self, user_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn create_ticket(&self, user_id: i64, now: i64) -> Result<Ticket> {
        let row = sqlx::query_as::<_, TicketRow>(
            "INSERT INTO tickets (user_id, status, created_at) VALUES (?, 'WAITING', ?)
             RETURNING *",
        )
        .bind(user_id)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        debug!(ticket_id = row.id, user_id, "ticket created");
        row.try_into()
    }

    async fn get_ticket(&self, ticket_id: i64) -> Result<Option<Ticket>> {
        sqlx::query_as::<_, TicketRow>("SELECT * FROM tickets WHERE id = ?")
            .bind(ticket_id)
            .fetch_optional(&self.pool)
            .await?
            .map(Ticket::try_from)
            .transpose()
    }

    async fn claim_ticket(
        &self,
        ticket_id: i64,
        operator_id: i64,
        now: i64,
    ) -> Result<Option<Ticket>> {
        sqlx::query_as::<_, TicketRow>(
            "UPDATE tickets SET status = 'ASSIGNED', operator_id = ?, assigned_at = ?
             WHERE id = ? AND status = 'WAITING'
             RETURNING *",
        )
        .bind(operator_id)
        .bind(now)
        .bind(ticket_id)
        .fetch_optional(&self.pool)
        .await?
        .map(Ticket::try_from)
        .transpose()
    }

    async fn close_ticket(
        &self,
        ticket_id: i64,
        operator_id: i64,
        now: i64,
    ) -> Result<Option<Ticket>> {
        sqlx::query_as::<_, TicketRow>(
            "UPDATE tickets SET status = 'CLOSED', closed_at = ?
             WHERE id = ? AND status = 'ASSIGNED' AND operator_id = ?
             RETURNING *",
        )
        .bind(now)
        .bind(ticket_id)
        .bind(operator_id)
        .fetch_optional(&self.pool)
        .await?
        .map(Ticket::try_from)
        .transpose()
    }

    async fn assigned_ticket_for_operator(&self, operator_id: i64) -> Result<Option<Ticket>> {
        sqlx::query_as::<_, TicketRow>(
            "SELECT * FROM tickets WHERE operator_id = ? AND status = 'ASSIGNED'
             ORDER BY assigned_at DESC, id DESC LIMIT 1",
        )
        .bind(operator_id)
        .fetch_optional(&self.pool)
        .await?
        .map(Ticket::try_from)
        .transpose()
    }

    async fn assigned_ticket_for_user(&self, user_id: i64) -> Result<Option<Ticket>> {
        sqlx::query_as::<_, TicketRow>(
            "SELECT * FROM tickets WHERE user_id = ? AND status = 'ASSIGNED'
             ORDER BY assigned_at DESC, id DESC LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .map(Ticket::try_from)
        .transpose()
    }

    async fn tickets_for_user(&self, user_id: i64) -> Result<Vec<Ticket>> {
        let rows = sqlx::query_as::<_, TicketRow>(
            "SELECT * FROM tickets WHERE user_id = ? ORDER BY created_at ASC, id ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        tickets_from_rows(rows)
    }

    async fn append_message(&self, message: &NewMessage) -> Result<StoredMessage> {
        sqlx::query_as::<_, MessageRow>(
            "INSERT INTO ticket_messages
                (ticket_id, sender_id, sender_role, origin_message_id, content_kind, text, caption, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING *",
        )
        .bind(message.ticket_id)
        .bind(message.sender_id)
        .bind(message.role.as_str())
        .bind(message.origin_message_id)
        .bind(message.content_kind.as_str())
        .bind(&message.text)
        .bind(&message.caption)
        .bind(message.created_at)
        .fetch_one(&self.pool)
        .await?
        .try_into()
    }

    async fn add_attachments(
        &self,
        message: &StoredMessage,
        attachments: &[AttachmentDescriptor],
    ) -> Result<Vec<Attachment>> {
        if attachments.is_empty() {
            return Ok(Vec::new());
        }

        let mut tx = self.pool.begin().await?;
        let mut stored = Vec::with_capacity(attachments.len());
        for a in attachments {
            let row = sqlx::query_as::<_, AttachmentRow>(
                "INSERT INTO message_attachments
                    (message_id, ticket_id, media_kind, file_id, file_unique_id, file_name,
                     mime_type, file_size, width, height, duration, local_path, created_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                 RETURNING *",
            )
            .bind(message.id)
            .bind(message.ticket_id)
            .bind(a.kind.as_str())
            .bind(&a.file_id)
            .bind(&a.file_unique_id)
            .bind(&a.file_name)
            .bind(&a.mime_type)
            .bind(a.file_size.and_then(|v| i64::try_from(v).ok()))
            .bind(a.width.map(i64::from))
            .bind(a.height.map(i64::from))
            .bind(a.duration.map(i64::from))
            .bind(
                a.local_path
                    .as_ref()
                    .map(|p| p.to_string_lossy().into_owned()),
            )
            .bind(message.created_at)
            .fetch_one(&mut *tx)
            .await?;
            stored.push(Attachment::try_from(row)?);
        }
        tx.commit().await?;
        Ok(stored)
    }

    async fn messages_for_ticket(&self, ticket_id: i64) -> Result<Vec<StoredMessage>> {
        sqlx::query_as::<_, MessageRow>(
            "SELECT * FROM ticket_messages WHERE ticket_id = ?
             ORDER BY created_at ASC, id ASC",
        )
        .bind(ticket_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(StoredMessage::try_from)
        .collect()
    }

    async fn attachments_for_message(&self, message_id: i64) -> Result<Vec<Attachment>> {
        sqlx::query_as::<_, AttachmentRow>(
            "SELECT * FROM message_attachments WHERE message_id = ? ORDER BY id ASC",
        )
        .bind(message_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(Attachment::try_from)
        .collect()
    }

    async fn get_intake(&self, user_id: i64) -> Result<Option<IntakeSession>> {
        sqlx::query_as::<_, IntakeRow>("SELECT * FROM intake_sessions WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .map(IntakeSession::try_from)
            .transpose()
    }

    async fn set_intake(&self, user_id: i64, step: IntakeStep, now: i64) -> Result<()> {
        sqlx::query(
            "INSERT INTO intake_sessions (user_id, step, ticket_id, updated_at) VALUES (?, ?, ?, ?)
             ON CONFLICT(user_id) DO UPDATE SET
                step = excluded.step,
                ticket_id = excluded.ticket_id,
                updated_at = excluded.updated_at",
        )
        .bind(user_id)
        .bind(step.as_str())
        .bind(step.ticket_id())
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn clear_intake(&self, user_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM intake_sessions WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn clear_intake_for_ticket(&self, ticket_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM intake_sessions WHERE ticket_id = ?")
            .bind(ticket_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
