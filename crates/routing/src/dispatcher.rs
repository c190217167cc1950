//! Entry point for inbound updates.
//!
//! Private messages are tried in order: `/start`, then the relay for an
//! ASSIGNED ticket, then the intake step. Anything left over is accepted
//! and dropped. Button presses are always answered, denials as alerts.

use std::{sync::Arc, time::Duration};

use {
    relaydesk_channels::{
        ChannelOutbound, ChatKind, InboundCallback, InboundMessage, InboundUpdate,
    },
    relaydesk_common::now_ms,
    relaydesk_media::{CaptureSettings, MediaCapture},
    relaydesk_tickets::{SenderRole, TicketError, TicketMachine, TicketStore, User, UserProfile},
    tracing::{debug, warn},
};

use crate::{
    Error, Result,
    history::HistoryReconstructor,
    intake::{E164Normalizer, Intake, IntakeSettings, PhoneNormalizer},
    keyboards::CallbackAction,
    lifecycle::TicketLifecycle,
    recorder::MessageRecorder,
    relay::{MessageRelay, RelayOutcome},
    texts,
};

/// Process-wide knobs for the support desk.
#[derive(Debug, Clone)]
pub struct DeskConfig {
    pub operators_chat_id: i64,
    pub abandon_after: Duration,
    pub capture: CaptureSettings,
    pub default_country_code: Option<String>,
}

#[derive(Clone)]
pub struct Dispatcher {
    store: Arc<dyn TicketStore>,
    outbound: Arc<dyn ChannelOutbound>,
    relay: MessageRelay,
    lifecycle: TicketLifecycle,
    history: HistoryReconstructor,
    intake: Intake,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn TicketStore>,
        outbound: Arc<dyn ChannelOutbound>,
        config: DeskConfig,
    ) -> Self {
        let normalizer = Arc::new(E164Normalizer::new(config.default_country_code.clone()));
        Self::with_normalizer(store, outbound, config, normalizer)
    }

    pub fn with_normalizer(
        store: Arc<dyn TicketStore>,
        outbound: Arc<dyn ChannelOutbound>,
        config: DeskConfig,
        normalizer: Arc<dyn PhoneNormalizer>,
    ) -> Self {
        let machine = TicketMachine::new(Arc::clone(&store));
        let recorder = MessageRecorder::new(
            Arc::clone(&store),
            Arc::clone(&outbound),
            MediaCapture::new(config.capture),
        );
        Self {
            relay: MessageRelay::new(Arc::clone(&store), Arc::clone(&outbound), recorder.clone()),
            lifecycle: TicketLifecycle::new(machine.clone(), Arc::clone(&outbound)),
            history: HistoryReconstructor::new(machine.clone(), Arc::clone(&outbound)),
            intake: Intake::new(
                machine,
                Arc::clone(&outbound),
                recorder,
                normalizer,
                IntakeSettings {
                    operators_chat_id: config.operators_chat_id,
                    abandon_after: config.abandon_after,
                },
            ),
            store,
            outbound,
        }
    }

    /// Route one update. Callers must not run two of these concurrently: a
    /// relay racing a close could log against the closed ticket.
    pub async fn handle(&self, update: InboundUpdate) -> Result<()> {
        match update {
            InboundUpdate::Message(msg) => self.handle_message(&msg).await,
            InboundUpdate::Callback(cb) => self.handle_callback(&cb).await,
        }
    }

    async fn upsert(&self, profile: &UserProfile, mark_operator: bool) -> Result<User> {
        Ok(self
            .store
            .upsert_user(profile, mark_operator, now_ms())
            .await?)
    }

    pub async fn handle_message(&self, msg: &InboundMessage) -> Result<()> {
        if msg.chat_kind != ChatKind::Private {
            debug!(chat_id = msg.chat_id, "ignoring non-private message");
            return Ok(());
        }
        let Some(sender) = msg.sender.as_ref().filter(|s| !s.is_bot) else {
            return Ok(());
        };
        let profile = UserProfile::from(sender);

        if msg.is_command("start") {
            let user = self.upsert(&profile, false).await?;
            return self.intake.start(&user).await;
        }

        let route = self.relay.resolve(sender.id).await?;
        let is_operator = route
            .as_ref()
            .is_some_and(|r| r.role == SenderRole::Operator);
        let user = self.upsert(&profile, is_operator).await?;

        if let Some(route) = route {
            if let RelayOutcome::Relayed {
                forward_error: Some(_),
                ..
            } = self.relay.relay_via(route, msg, sender.id).await?
                && let Err(e) = self
                    .outbound
                    .send_text(msg.chat_id, texts::DELIVERY_FAILED, None)
                    .await
            {
                warn!(chat_id = msg.chat_id, error = %e, "failed to report delivery failure");
            }
            return Ok(());
        }

        if !self.intake.on_message(&user, msg).await? {
            debug!(sender_id = sender.id, "no ticket or intake step, message dropped");
        }
        Ok(())
    }

    pub async fn handle_callback(&self, cb: &InboundCallback) -> Result<()> {
        let data = cb.data.as_deref().unwrap_or_default();
        let action = match data.parse::<CallbackAction>() {
            Ok(action) => action,
            Err(e) => {
                debug!(error = %e, "ignoring callback");
                self.answer(cb, None, false).await;
                return Ok(());
            },
        };

        let profile = UserProfile::from(&cb.from);
        let result = match action {
            CallbackAction::Claim(ticket_id) => self
                .lifecycle
                .claim(&profile, ticket_id)
                .await
                .map(|_| Some(texts::CLAIMED)),
            CallbackAction::Finish(ticket_id) => self
                .lifecycle
                .close(&profile, ticket_id)
                .await
                .map(|_| None),
            CallbackAction::History(ticket_id) => {
                match self.history.deliver(ticket_id, cb.from.id).await {
                    Ok(_) => self.upsert(&profile, true).await.map(|_| None),
                    Err(e) => Err(e),
                }
            },
            CallbackAction::ToStart
            | CallbackAction::TopicWarranty
            | CallbackAction::TopicRefund
            | CallbackAction::TopicOther
            | CallbackAction::ToOperator => match self.upsert(&profile, false).await {
                Ok(user) => self.intake.on_action(&user, action).await.map(|()| None),
                Err(e) => Err(e),
            },
        };

        match result {
            Ok(text) => {
                self.answer(cb, text, false).await;
                Ok(())
            },
            Err(e) if e.is_user_facing() => {
                debug!(%action, error = %e, "callback denied");
                self.answer(cb, Some(denial_text(&e)), true).await;
                Ok(())
            },
            Err(e) => {
                self.answer(cb, None, false).await;
                Err(e)
            },
        }
    }

    async fn answer(&self, cb: &InboundCallback, text: Option<&str>, alert: bool) {
        if let Err(e) = self.outbound.answer_callback(&cb.id, text, alert).await {
            warn!(callback_id = %cb.id, error = %e, "failed to answer callback");
        }
    }
}

fn denial_text(error: &Error) -> &'static str {
    match error {
        Error::Ticket(TicketError::AlreadyClaimed { .. }) => texts::ALREADY_TAKEN,
        Error::Ticket(TicketError::NotOwner { .. }) => texts::NOT_YOURS,
        _ => texts::NOT_FOUND,
    }
}
