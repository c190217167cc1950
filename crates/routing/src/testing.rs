//! Recording transport and fixtures shared by the routing tests.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::{
    collections::{HashMap, HashSet},
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
};

use {
    async_trait::async_trait,
    relaydesk_channels::{
        ChannelOutbound, ChatKind, ContentKind, Error, InboundMessage, InlineKeyboard, MediaFile,
        MediaPayload, Result, SenderProfile,
    },
    relaydesk_media::AttachmentDescriptor,
    relaydesk_tickets::{
        Attachment, IntakeSession, IntakeStep, NewMessage, SqliteTicketStore, StoredMessage,
        Ticket, TicketStore, User, UserProfile,
    },
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentText {
    pub chat_id: i64,
    pub text: String,
    pub keyboard: Option<InlineKeyboard>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Forward {
    pub to: i64,
    pub from: i64,
    pub message_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackAnswer {
    pub id: String,
    pub text: Option<String>,
    pub alert: bool,
}

/// Every outbound call in order, so tests can assert interleaving.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Text(SentText),
    Forward(Forward),
}

#[derive(Default)]
pub struct MockOutbound {
    calls: Mutex<Vec<Call>>,
    answers: Mutex<Vec<CallbackAnswer>>,
    failing_copies: Mutex<HashSet<(i64, i64)>>,
    files: Mutex<HashMap<String, Vec<u8>>>,
    next_id: Mutex<i64>,
}

impl MockOutbound {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Copies of `(from_chat, message_id)` will be rejected.
    pub fn fail_copy(&self, from_chat: i64, message_id: i64) {
        self.failing_copies
            .lock()
            .unwrap()
            .insert((from_chat, message_id));
    }

    pub fn serve_file(&self, file_id: &str, bytes: &[u8]) {
        self.files
            .lock()
            .unwrap()
            .insert(file_id.to_string(), bytes.to_vec());
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn texts_to(&self, chat_id: i64) -> Vec<SentText> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Text(t) if t.chat_id == chat_id => Some(t),
                _ => None,
            })
            .collect()
    }

    pub fn copies(&self) -> Vec<Forward> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Forward(c) => Some(c),
                Call::Text(_) => None,
            })
            .collect()
    }

    pub fn answers(&self) -> Vec<CallbackAnswer> {
        self.answers.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
        self.answers.lock().unwrap().clear();
    }

    fn next_id(&self) -> i64 {
        let mut id = self.next_id.lock().unwrap();
        *id += 1;
        *id
    }
}

#[async_trait]
impl ChannelOutbound for MockOutbound {
    async fn send_text(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<&InlineKeyboard>,
    ) -> Result<i64> {
        self.calls.lock().unwrap().push(Call::Text(SentText {
            chat_id,
            text: text.to_string(),
            keyboard: keyboard.cloned(),
        }));
        Ok(self.next_id())
    }

    async fn copy_message(&self, to_chat_id: i64, from_chat_id: i64, message_id: i64) -> Result<i64> {
        if self
            .failing_copies
            .lock()
            .unwrap()
            .contains(&(from_chat_id, message_id))
        {
            return Err(Error::rejected("copyMessage", "message to copy not found"));
        }
        self.calls.lock().unwrap().push(Call::Forward(Forward {
            to: to_chat_id,
            from: from_chat_id,
            message_id,
        }));
        Ok(self.next_id())
    }

    async fn fetch_file(&self, file_id: &str) -> Result<Vec<u8>> {
        self.files
            .lock()
            .unwrap()
            .get(file_id)
            .cloned()
            .ok_or_else(|| Error::rejected("getFile", "file not found"))
    }

    async fn answer_callback(&self, callback_id: &str, text: Option<&str>, alert: bool) -> Result<()> {
        self.answers.lock().unwrap().push(CallbackAnswer {
            id: callback_id.to_string(),
            text: text.map(str::to_string),
            alert,
        });
        Ok(())
    }
}

pub async fn memory_store() -> Arc<SqliteTicketStore> {
    Arc::new(SqliteTicketStore::new("sqlite::memory:", 1).await.unwrap())
}

/// SQLite store whose operator upserts and user lookups can be made to fail.
pub struct FlakyStore {
    inner: Arc<SqliteTicketStore>,
    fail_operator_upsert: AtomicBool,
    fail_get_user: AtomicBool,
}

impl FlakyStore {
    pub fn new(inner: Arc<SqliteTicketStore>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            fail_operator_upsert: AtomicBool::new(false),
            fail_get_user: AtomicBool::new(false),
        })
    }

    pub fn fail_operator_upsert(&self) {
        self.fail_operator_upsert.store(true, Ordering::SeqCst);
    }

    pub fn fail_get_user(&self) {
        self.fail_get_user.store(true, Ordering::SeqCst);
    }
}

fn store_down() -> relaydesk_tickets::Error {
    relaydesk_tickets::Error::message("database is locked")
}

#[async_trait]
impl TicketStore for FlakyStore {
    async fn upsert_user(
        &self,
        profile: &UserProfile,
        mark_operator: bool,
        now: i64,
    ) -> relaydesk_tickets::Result<User> {
        if mark_operator && self.fail_operator_upsert.load(Ordering::SeqCst) {
            return Err(store_down());
        }
        self.inner.upsert_user(profile, mark_operator, now).await
    }

    async fn set_user_phone(&self, user_id: i64, phone: &str) -> relaydesk_tickets::Result<()> {
        self.inner.set_user_phone(user_id, phone).await
    }

    async fn get_user(&self, user_id: i64) -> relaydesk_tickets::Result<Option<User>> {
        if self.fail_get_user.load(Ordering::SeqCst) {
            return Err(store_down());
        }
        self.inner.get_user(user_id).await
    }

    async fn find_user_by_external(
        &self,
        external_id: i64,
    ) -> relaydesk_tickets::Result<Option<User>> {
        self.inner.find_user_by_external(external_id).await
    }

    async fn delete_user(&self, user_id: i64) -> relaydesk_tickets::Result<bool> {
        self.inner.delete_user(user_id).await
    }

    async fn create_ticket(&self, user_id: i64, now: i64) -> relaydesk_tickets::Result<Ticket> {
        self.inner.create_ticket(user_id, now).await
    }

    async fn get_ticket(&self, ticket_id: i64) -> relaydesk_tickets::Result<Option<Ticket>> {
        self.inner.get_ticket(ticket_id).await
    }

    async fn claim_ticket(
        &self,
        ticket_id: i64,
        operator_id: i64,
        now: i64,
    ) -> relaydesk_tickets::Result<Option<Ticket>> {
        self.inner.claim_ticket(ticket_id, operator_id, now).await
    }

    async fn close_ticket(
        &self,
        ticket_id: i64,
        operator_id: i64,
        now: i64,
    ) -> relaydesk_tickets::Result<Option<Ticket>> {
        self.inner.close_ticket(ticket_id, operator_id, now).await
    }

    async fn assigned_ticket_for_operator(
        &self,
        operator_id: i64,
    ) -> relaydesk_tickets::Result<Option<Ticket>> {
        self.inner.assigned_ticket_for_operator(operator_id).await
    }

    async fn assigned_ticket_for_user(
        &self,
        user_id: i64,
    ) -> relaydesk_tickets::Result<Option<Ticket>> {
        self.inner.assigned_ticket_for_user(user_id).await
    }

    async fn tickets_for_user(&self, user_id: i64) -> relaydesk_tickets::Result<Vec<Ticket>> {
        self.inner.tickets_for_user(user_id).await
    }

    async fn append_message(
        &self,
        message: &NewMessage,
    ) -> relaydesk_tickets::Result<StoredMessage> {
        self.inner.append_message(message).await
    }

    async fn add_attachments(
        &self,
        message: &StoredMessage,
        attachments: &[AttachmentDescriptor],
    ) -> relaydesk_tickets::Result<Vec<Attachment>> {
        self.inner.add_attachments(message, attachments).await
    }

    async fn messages_for_ticket(
        &self,
        ticket_id: i64,
    ) -> relaydesk_tickets::Result<Vec<StoredMessage>> {
        self.inner.messages_for_ticket(ticket_id).await
    }

    async fn attachments_for_message(
        &self,
        message_id: i64,
    ) -> relaydesk_tickets::Result<Vec<Attachment>> {
        self.inner.attachments_for_message(message_id).await
    }

    async fn get_intake(&self, user_id: i64) -> relaydesk_tickets::Result<Option<IntakeSession>> {
        self.inner.get_intake(user_id).await
    }

    async fn set_intake(
        &self,
        user_id: i64,
        step: IntakeStep,
        now: i64,
    ) -> relaydesk_tickets::Result<()> {
        self.inner.set_intake(user_id, step, now).await
    }

    async fn clear_intake(&self, user_id: i64) -> relaydesk_tickets::Result<()> {
        self.inner.clear_intake(user_id).await
    }

    async fn clear_intake_for_ticket(&self, ticket_id: i64) -> relaydesk_tickets::Result<()> {
        self.inner.clear_intake_for_ticket(ticket_id).await
    }
}

pub fn sender(id: i64, first_name: &str, username: Option<&str>) -> SenderProfile {
    SenderProfile {
        id,
        first_name: first_name.into(),
        last_name: None,
        username: username.map(str::to_string),
        is_bot: false,
    }
}

pub fn text_from(from: &SenderProfile, message_id: i64, text: &str) -> InboundMessage {
    InboundMessage {
        message_id,
        chat_id: from.id,
        chat_kind: ChatKind::Private,
        sender: Some(from.clone()),
        content_kind: ContentKind::Text,
        text: Some(text.into()),
        caption: None,
        media: MediaPayload::default(),
    }
}

pub fn photo_from(from: &SenderProfile, message_id: i64, caption: Option<&str>) -> InboundMessage {
    let variant = |id: &str, side: u32| MediaFile {
        file_id: id.into(),
        file_unique_id: Some(format!("{id}-u")),
        width: Some(side),
        height: Some(side),
        ..Default::default()
    };
    InboundMessage {
        message_id,
        chat_id: from.id,
        chat_kind: ChatKind::Private,
        sender: Some(from.clone()),
        content_kind: ContentKind::Photo,
        text: None,
        caption: caption.map(str::to_string),
        media: MediaPayload {
            photo: vec![variant("small", 90), variant("large", 1280), variant("mid", 320)],
            ..Default::default()
        },
    }
}

/// A photo (largest variant `large`) sent together with a PDF `doc-1`.
pub fn photo_with_document_from(from: &SenderProfile, message_id: i64) -> InboundMessage {
    let mut msg = photo_from(from, message_id, Some("receipt attached"));
    msg.media.document = Some(MediaFile {
        file_id: "doc-1".into(),
        file_unique_id: Some("doc-1-u".into()),
        file_name: Some("receipt.pdf".into()),
        mime_type: Some("application/pdf".into()),
        ..Default::default()
    });
    msg
}
