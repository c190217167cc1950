//! Ticket intake: topic menu, phone capture, ticket creation and the
//! details-collection step that runs until an operator claims the ticket.
//!
//! The per-user step lives in the store, so a restart resumes where the
//! user left off. A step untouched for longer than the configured
//! abandonment window is dropped on the user's next contact.

use std::{sync::Arc, time::Duration};

use {
    relaydesk_channels::{ChannelOutbound, InboundMessage, InlineKeyboard},
    relaydesk_common::now_ms,
    relaydesk_tickets::{
        IntakeStep, SenderRole, TicketMachine, TicketStatus, TicketStore, User,
    },
    tracing::{debug, info, warn},
};

use crate::{
    Result,
    keyboards::{self, CallbackAction},
    recorder::MessageRecorder,
    texts,
};

/// Turns free-form user input into a canonical phone number.
pub trait PhoneNormalizer: Send + Sync {
    fn normalize(&self, raw: &str) -> Option<String>;
}

/// Digit-based E.164 normalizer.
///
/// Accepts `+` or `00` international prefixes, and national numbers when a
/// default country code is configured (one leading trunk `0` is dropped).
#[derive(Debug, Clone, Default)]
pub struct E164Normalizer {
    default_country_code: Option<String>,
}

impl E164Normalizer {
    pub fn new(default_country_code: Option<String>) -> Self {
        Self {
            default_country_code: default_country_code
                .map(|cc| cc.trim().trim_start_matches('+').to_string())
                .filter(|cc| !cc.is_empty() && cc.chars().all(|c| c.is_ascii_digit())),
        }
    }
}

impl PhoneNormalizer for E164Normalizer {
    fn normalize(&self, raw: &str) -> Option<String> {
        let raw = raw.trim();
        let (international, rest) = if let Some(rest) = raw.strip_prefix('+') {
            (true, rest)
        } else if let Some(rest) = raw.strip_prefix("00") {
            (true, rest)
        } else {
            (false, raw)
        };

        let mut digits = String::with_capacity(rest.len());
        for c in rest.chars() {
            match c {
                '0'..='9' => digits.push(c),
                ' ' | '-' | '(' | ')' | '.' => {},
                _ => return None,
            }
        }

        let full = if international {
            digits
        } else if let Some(cc) = &self.default_country_code {
            let national = digits.strip_prefix('0').unwrap_or(&digits);
            if !(6..=12).contains(&national.len()) {
                return None;
            }
            format!("{cc}{national}")
        } else if digits.len() >= 11 {
            digits
        } else {
            return None;
        };

        ((8..=15).contains(&full.len()) && !full.starts_with('0')).then(|| format!("+{full}"))
    }
}

#[derive(Debug, Clone)]
pub struct IntakeSettings {
    /// Chat that receives new-ticket announcements.
    pub operators_chat_id: i64,
    pub abandon_after: Duration,
}

#[derive(Clone)]
pub struct Intake {
    machine: TicketMachine,
    outbound: Arc<dyn ChannelOutbound>,
    recorder: MessageRecorder,
    normalizer: Arc<dyn PhoneNormalizer>,
    settings: IntakeSettings,
}

impl Intake {
    pub fn new(
        machine: TicketMachine,
        outbound: Arc<dyn ChannelOutbound>,
        recorder: MessageRecorder,
        normalizer: Arc<dyn PhoneNormalizer>,
        settings: IntakeSettings,
    ) -> Self {
        Self {
            machine,
            outbound,
            recorder,
            normalizer,
            settings,
        }
    }

    fn store(&self) -> &Arc<dyn TicketStore> {
        self.machine.store()
    }

    fn abandon_after_ms(&self) -> i64 {
        i64::try_from(self.settings.abandon_after.as_millis()).unwrap_or(i64::MAX)
    }

    async fn reply(&self, chat_id: i64, text: &str, keyboard: Option<&InlineKeyboard>) -> Result<()> {
        self.outbound.send_text(chat_id, text, keyboard).await?;
        Ok(())
    }

    /// `/start`: show the topic menu.
    pub async fn start(&self, user: &User) -> Result<()> {
        self.reply(user.external_id, texts::WELCOME, Some(&keyboards::start_menu()))
            .await
    }

    /// Handle an intake button. Ticket actions are ignored here.
    pub async fn on_action(&self, user: &User, action: CallbackAction) -> Result<()> {
        let chat_id = user.external_id;
        match action {
            CallbackAction::ToStart => {
                if let Some(session) = self.store().get_intake(user.id).await?
                    && session.step == IntakeStep::AwaitingPhone
                {
                    self.store().clear_intake(user.id).await?;
                }
                self.start(user).await
            },
            CallbackAction::TopicWarranty => {
                self.reply(chat_id, texts::WARRANTY, Some(&keyboards::topic()))
                    .await
            },
            CallbackAction::TopicRefund => {
                self.reply(chat_id, texts::REFUND, Some(&keyboards::topic()))
                    .await
            },
            CallbackAction::TopicOther => {
                self.reply(chat_id, texts::ASK_OPERATOR, Some(&keyboards::topic()))
                    .await
            },
            CallbackAction::ToOperator => self.ask_phone(user).await,
            CallbackAction::Claim(_) | CallbackAction::Finish(_) | CallbackAction::History(_) => {
                Ok(())
            },
        }
    }

    async fn ask_phone(&self, user: &User) -> Result<()> {
        if let Some(ticket_id) = self.pending_ticket(user).await? {
            debug!(user_id = user.id, ticket_id, "ticket already waiting, not opening another");
            return self.reply(user.external_id, texts::CONNECTING, None).await;
        }
        self.store()
            .set_intake(user.id, IntakeStep::AwaitingPhone, now_ms())
            .await?;
        self.reply(user.external_id, texts::ASK_PHONE, None).await
    }

    /// The WAITING ticket this user is still describing, if any.
    async fn pending_ticket(&self, user: &User) -> Result<Option<i64>> {
        let Some(session) = self.store().get_intake(user.id).await? else {
            return Ok(None);
        };
        let IntakeStep::CollectingDetails { ticket_id } = session.step else {
            return Ok(None);
        };
        let waiting = self
            .store()
            .get_ticket(ticket_id)
            .await?
            .is_some_and(|t| t.status == TicketStatus::Waiting);
        Ok(waiting.then_some(ticket_id))
    }

    /// Feed a private message into the user's intake step.
    ///
    /// Returns `false` when the user has no active step and the message
    /// was left untouched.
    pub async fn on_message(&self, user: &User, msg: &InboundMessage) -> Result<bool> {
        let Some(session) = self.store().get_intake(user.id).await? else {
            return Ok(false);
        };

        let now = now_ms();
        if session.is_stale(now, self.abandon_after_ms()) {
            info!(user_id = user.id, step = ?session.step, "intake abandoned");
            self.store().clear_intake(user.id).await?;
            self.reply(user.external_id, texts::SESSION_ABANDONED, None)
                .await?;
            self.start(user).await?;
            return Ok(true);
        }

        match session.step {
            IntakeStep::AwaitingPhone => self.receive_phone(user, msg).await.map(|()| true),
            IntakeStep::CollectingDetails { ticket_id } => {
                self.collect_details(user, msg, ticket_id).await
            },
        }
    }

    async fn receive_phone(&self, user: &User, msg: &InboundMessage) -> Result<()> {
        let Some(phone) = msg.text.as_deref().and_then(|t| self.normalizer.normalize(t)) else {
            return self.reply(user.external_id, texts::BAD_PHONE, None).await;
        };

        self.store().set_user_phone(user.id, &phone).await?;
        let user = User {
            phone: Some(phone),
            ..user.clone()
        };
        let ticket = self.machine.create(&user).await?;
        self.store()
            .set_intake(
                user.id,
                IntakeStep::CollectingDetails {
                    ticket_id: ticket.id,
                },
                now_ms(),
            )
            .await?;

        self.reply(user.external_id, texts::CONNECTING, None).await?;
        if let Err(e) = self
            .outbound
            .send_text(
                self.settings.operators_chat_id,
                &texts::new_ticket(&ticket, &user),
                Some(&keyboards::claim(ticket.id)),
            )
            .await
        {
            warn!(ticket_id = ticket.id, error = %e, "failed to announce ticket to operators");
        }
        Ok(())
    }

    async fn collect_details(
        &self,
        user: &User,
        msg: &InboundMessage,
        ticket_id: i64,
    ) -> Result<bool> {
        let waiting = self
            .store()
            .get_ticket(ticket_id)
            .await?
            .is_some_and(|t| t.status == TicketStatus::Waiting);
        if !waiting {
            self.store().clear_intake(user.id).await?;
            return Ok(false);
        }

        let recorded = self
            .recorder
            .record(ticket_id, user.external_id, SenderRole::User, msg)
            .await?;
        self.store()
            .set_intake(user.id, IntakeStep::CollectingDetails { ticket_id }, now_ms())
            .await?;
        debug!(
            ticket_id,
            message_id = recorded.message.id,
            attachments = recorded.attachments.len(),
            "intake details logged"
        );
        Ok(true)
    }
}
