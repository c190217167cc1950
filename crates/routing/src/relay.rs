//! User ↔ operator message relay for ASSIGNED tickets.

use std::sync::Arc;

use {
    relaydesk_channels::{ChannelOutbound, InboundMessage},
    relaydesk_tickets::{SenderRole, Ticket, TicketStatus, TicketStore},
    tracing::{debug, warn},
};

#[cfg(feature = "metrics")]
use relaydesk_metrics::{counter, relay as relay_metrics};

use crate::{
    Result,
    recorder::{MessageRecorder, Recorded},
};

/// Where a sender's messages go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub ticket: Ticket,
    pub role: SenderRole,
    /// Chat id of the other party.
    pub counterpart: i64,
}

#[derive(Debug)]
pub enum RelayOutcome {
    /// Copied to the counterpart (or tried to) and logged.
    Relayed {
        route: Route,
        recorded: Recorded,
        /// Transport failure on the copy, reported back as a soft failure.
        forward_error: Option<relaydesk_channels::Error>,
    },
    /// No ASSIGNED ticket links the sender to anyone. Nothing was sent or
    /// stored.
    Unrouted,
}

#[derive(Clone)]
pub struct MessageRelay {
    store: Arc<dyn TicketStore>,
    outbound: Arc<dyn ChannelOutbound>,
    recorder: MessageRecorder,
}

impl MessageRelay {
    pub fn new(
        store: Arc<dyn TicketStore>,
        outbound: Arc<dyn ChannelOutbound>,
        recorder: MessageRecorder,
    ) -> Self {
        Self {
            store,
            outbound,
            recorder,
        }
    }

    /// Resolve the counterpart for `sender_id`.
    ///
    /// An operator holding an ASSIGNED ticket wins over the same id being a
    /// user with one.
    pub async fn resolve(&self, sender_id: i64) -> Result<Option<Route>> {
        if let Some(ticket) = self.store.assigned_ticket_for_operator(sender_id).await? {
            return match self.store.get_user(ticket.user_id).await? {
                Some(user) => Ok(Some(Route {
                    ticket,
                    role: SenderRole::Operator,
                    counterpart: user.external_id,
                })),
                None => {
                    warn!(ticket_id = ticket.id, "assigned ticket without a user");
                    Ok(None)
                },
            };
        }

        let Some(user) = self.store.find_user_by_external(sender_id).await? else {
            return Ok(None);
        };
        let Some(ticket) = self.store.assigned_ticket_for_user(user.id).await? else {
            return Ok(None);
        };
        Ok(ticket.operator_id.map(|operator_id| Route {
            ticket,
            role: SenderRole::User,
            counterpart: operator_id,
        }))
    }

    /// Resolve, forward and log one inbound message.
    pub async fn relay(&self, msg: &InboundMessage, sender_id: i64) -> Result<RelayOutcome> {
        match self.resolve(sender_id).await? {
            Some(route) => self.relay_via(route, msg, sender_id).await,
            None => {
                debug!(sender_id, "no active ticket, message not relayed");
                #[cfg(feature = "metrics")]
                counter!(relay_metrics::MESSAGES_UNROUTED_TOTAL).increment(1);
                Ok(RelayOutcome::Unrouted)
            },
        }
    }

    /// Forward along an already resolved route, then log.
    ///
    /// The ticket is re-read first, so a route resolved before a close is
    /// dropped. A close landing between that check and the append is only
    /// excluded by handling updates one at a time.
    pub async fn relay_via(
        &self,
        route: Route,
        msg: &InboundMessage,
        sender_id: i64,
    ) -> Result<RelayOutcome> {
        #[cfg(feature = "metrics")]
        let started = std::time::Instant::now();

        let current = self.store.get_ticket(route.ticket.id).await?;
        if current.map(|t| t.status) != Some(TicketStatus::Assigned) {
            debug!(ticket_id = route.ticket.id, "route went stale, message not relayed");
            #[cfg(feature = "metrics")]
            counter!(relay_metrics::MESSAGES_UNROUTED_TOTAL).increment(1);
            return Ok(RelayOutcome::Unrouted);
        }

        let forward_error = match self
            .outbound
            .copy_message(route.counterpart, msg.chat_id, msg.message_id)
            .await
        {
            Ok(_) => None,
            Err(e) => {
                warn!(
                    ticket_id = route.ticket.id,
                    role = %route.role,
                    to = route.counterpart,
                    error = %e,
                    "failed to forward message"
                );
                #[cfg(feature = "metrics")]
                counter!(relay_metrics::FORWARD_ERRORS_TOTAL).increment(1);
                Some(e)
            },
        };

        let recorded = self
            .recorder
            .record(route.ticket.id, sender_id, route.role, msg)
            .await?;

        debug!(
            ticket_id = route.ticket.id,
            role = %route.role,
            message_id = recorded.message.id,
            attachments = recorded.attachments.len(),
            "message relayed"
        );
        #[cfg(feature = "metrics")]
        {
            counter!(relay_metrics::MESSAGES_RELAYED_TOTAL, "role" => route.role.as_str())
                .increment(1);
            relaydesk_metrics::histogram!(relay_metrics::DURATION_SECONDS)
                .record(started.elapsed().as_secs_f64());
        }

        Ok(RelayOutcome::Relayed {
            route,
            recorded,
            forward_error,
        })
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::testing::{
            Forward, MockOutbound, memory_store, photo_from, photo_with_document_from, sender,
            text_from,
        },
        relaydesk_channels::{ContentKind, MediaKind},
        relaydesk_media::{CaptureSettings, MediaCapture},
        relaydesk_tickets::{TicketMachine, UserProfile},
    };

    const OPERATOR: i64 = 500;

    struct Fixture {
        store: Arc<relaydesk_tickets::SqliteTicketStore>,
        outbound: Arc<MockOutbound>,
        relay: MessageRelay,
        machine: TicketMachine,
    }

    async fn fixture() -> Fixture {
        fixture_with(CaptureSettings::default()).await
    }

    async fn fixture_with(capture: CaptureSettings) -> Fixture {
        let store = memory_store().await;
        let outbound = MockOutbound::new();
        let recorder = MessageRecorder::new(
            store.clone(),
            outbound.clone(),
            MediaCapture::new(capture),
        );
        Fixture {
            relay: MessageRelay::new(store.clone(), outbound.clone(), recorder),
            machine: TicketMachine::new(store.clone()),
            store,
            outbound,
        }
    }

    async fn assigned_ticket(f: &Fixture, user_external: i64) -> Ticket {
        let user = f
            .store
            .upsert_user(&UserProfile::new(user_external), false, 1)
            .await
            .unwrap();
        let ticket = f.machine.create(&user).await.unwrap();
        f.machine.claim(ticket.id, OPERATOR).await.unwrap()
    }

    #[tokio::test]
    async fn user_without_assigned_ticket_is_not_relayed() {
        let f = fixture().await;
        let ann = sender(100, "Ann", None);
        let user = f
            .store
            .upsert_user(&UserProfile::from(&ann), false, 1)
            .await
            .unwrap();
        let waiting = f.machine.create(&user).await.unwrap();

        let outcome = f.relay.relay(&text_from(&ann, 1, "anyone?"), ann.id).await.unwrap();

        assert!(matches!(outcome, RelayOutcome::Unrouted));
        assert!(f.outbound.calls().is_empty());
        assert!(f.store.messages_for_ticket(waiting.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn stranger_is_not_relayed() {
        let f = fixture().await;
        let who = sender(999, "Who", None);
        let outcome = f.relay.relay(&text_from(&who, 1, "hi"), who.id).await.unwrap();
        assert!(matches!(outcome, RelayOutcome::Unrouted));
    }

    #[tokio::test]
    async fn user_message_goes_to_operator() {
        let f = fixture().await;
        let ticket = assigned_ticket(&f, 100).await;
        let ann = sender(100, "Ann", None);

        let outcome = f.relay.relay(&text_from(&ann, 11, "help"), ann.id).await.unwrap();

        let RelayOutcome::Relayed {
            route,
            recorded,
            forward_error,
        } = outcome
        else {
            panic!("expected relay");
        };
        assert_eq!(route.role, SenderRole::User);
        assert_eq!(route.counterpart, OPERATOR);
        assert!(forward_error.is_none());
        assert_eq!(recorded.message.text.as_deref(), Some("help"));
        assert_eq!(f.outbound.copies(), vec![Forward {
            to: OPERATOR,
            from: 100,
            message_id: 11
        }]);
        assert_eq!(f.store.messages_for_ticket(ticket.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn operator_message_goes_to_user() {
        let f = fixture().await;
        let ticket = assigned_ticket(&f, 100).await;
        let op = sender(OPERATOR, "Olga", Some("olga"));

        f.relay.relay(&text_from(&op, 21, "thanks"), OPERATOR).await.unwrap();

        assert_eq!(f.outbound.copies(), vec![Forward {
            to: 100,
            from: OPERATOR,
            message_id: 21
        }]);
        let log = f.store.messages_for_ticket(ticket.id).await.unwrap();
        assert_eq!(log[0].role, SenderRole::Operator);
        assert_eq!(log[0].sender_id, OPERATOR);
    }

    #[tokio::test]
    async fn photo_is_logged_with_one_attachment() {
        let f = fixture().await;
        let ticket = assigned_ticket(&f, 100).await;
        let ann = sender(100, "Ann", None);

        let outcome = f
            .relay
            .relay(&photo_from(&ann, 12, Some("broken")), ann.id)
            .await
            .unwrap();

        let RelayOutcome::Relayed { recorded, .. } = outcome else {
            panic!("expected relay");
        };
        assert_eq!(recorded.message.content_kind, ContentKind::Photo);
        assert_eq!(recorded.message.caption.as_deref(), Some("broken"));
        assert_eq!(recorded.attachments.len(), 1);
        assert_eq!(recorded.attachments[0].kind, MediaKind::Photo);
        assert_eq!(recorded.attachments[0].file_id, "large");
        assert_eq!(recorded.attachments[0].ticket_id, ticket.id);
    }

    #[tokio::test]
    async fn forward_failure_is_soft_and_message_still_logged() {
        let f = fixture().await;
        let ticket = assigned_ticket(&f, 100).await;
        let ann = sender(100, "Ann", None);
        f.outbound.fail_copy(100, 13);

        let outcome = f.relay.relay(&text_from(&ann, 13, "lost?"), ann.id).await.unwrap();

        assert!(matches!(outcome, RelayOutcome::Relayed {
            forward_error: Some(_),
            ..
        }));
        assert_eq!(f.store.messages_for_ticket(ticket.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn closed_ticket_stops_relay() {
        let f = fixture().await;
        let ticket = assigned_ticket(&f, 100).await;
        f.machine.close(ticket.id, OPERATOR).await.unwrap();
        let ann = sender(100, "Ann", None);

        let outcome = f.relay.relay(&text_from(&ann, 14, "still there?"), ann.id).await.unwrap();

        assert!(matches!(outcome, RelayOutcome::Unrouted));
        assert!(f.outbound.copies().is_empty());
        assert!(f.store.messages_for_ticket(ticket.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_download_keeps_message_and_descriptor() {
        let dir = tempfile::tempdir().unwrap();
        let f = fixture_with(CaptureSettings {
            persist: true,
            root: dir.path().to_path_buf(),
            download_timeout: std::time::Duration::from_secs(5),
        })
        .await;
        let ticket = assigned_ticket(&f, 100).await;
        let ann = sender(100, "Ann", None);
        f.outbound.serve_file("large", b"\xff\xd8jpeg");

        let outcome = f
            .relay
            .relay(&photo_with_document_from(&ann, 15), ann.id)
            .await
            .unwrap();

        assert!(matches!(outcome, RelayOutcome::Relayed {
            forward_error: None,
            ..
        }));
        assert_eq!(f.outbound.copies(), vec![Forward {
            to: OPERATOR,
            from: 100,
            message_id: 15
        }]);
        let log = f.store.messages_for_ticket(ticket.id).await.unwrap();
        assert_eq!(log.len(), 1);
        let stored = f.store.attachments_for_message(log[0].id).await.unwrap();
        assert_eq!(stored.len(), 2);
        let photo = stored.iter().find(|a| a.kind == MediaKind::Photo).unwrap();
        let document = stored.iter().find(|a| a.kind == MediaKind::Document).unwrap();
        let expected = dir
            .path()
            .join(format!("ticket_{}", ticket.id))
            .join(log[0].id.to_string())
            .join("photo_large-u.jpg");
        assert_eq!(photo.local_path.as_deref(), Some(expected.as_path()));
        assert_eq!(std::fs::read(&expected).unwrap(), b"\xff\xd8jpeg");
        assert_eq!(document.file_id, "doc-1");
        assert_eq!(document.file_name.as_deref(), Some("receipt.pdf"));
        assert!(document.local_path.is_none());
    }

    #[tokio::test]
    async fn stale_route_is_not_relayed() {
        let f = fixture().await;
        let ticket = assigned_ticket(&f, 100).await;
        let ann = sender(100, "Ann", None);
        let route = f.relay.resolve(ann.id).await.unwrap().unwrap();
        f.machine.close(ticket.id, OPERATOR).await.unwrap();

        let outcome = f
            .relay
            .relay_via(route, &text_from(&ann, 16, "bye?"), ann.id)
            .await
            .unwrap();

        assert!(matches!(outcome, RelayOutcome::Unrouted));
        assert!(f.outbound.copies().is_empty());
        assert!(f.store.messages_for_ticket(ticket.id).await.unwrap().is_empty());
    }
}
