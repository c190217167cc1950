//! Conversion from Bot API updates into the platform-neutral model.

use {
    relaydesk_channels::{
        ChatKind, ContentKind, InboundCallback, InboundMessage, InboundUpdate, MediaFile,
        MediaPayload, SenderProfile,
    },
    relaydesk_routing::Dispatcher,
    teloxide::types::{
        CallbackQuery, Chat, FileMeta, MediaKind, Message, MessageKind, UpdateKind, User,
    },
    tracing::debug,
};

#[cfg(feature = "metrics")]
use relaydesk_metrics::{counter, telegram as tg_metrics};

use crate::Result;

/// Convert and dispatch one update. Unsupported kinds are skipped.
pub async fn handle_update(dispatcher: &Dispatcher, kind: UpdateKind) -> Result<()> {
    let Some(update) = inbound_update(kind) else {
        return Ok(());
    };
    #[cfg(feature = "metrics")]
    counter!(tg_metrics::UPDATES_RECEIVED_TOTAL, "kind" => match &update {
        InboundUpdate::Message(_) => "message",
        InboundUpdate::Callback(_) => "callback",
    })
    .increment(1);

    dispatcher.handle(update).await?;
    Ok(())
}

pub fn inbound_update(kind: UpdateKind) -> Option<InboundUpdate> {
    match kind {
        UpdateKind::Message(msg) => inbound_message(&msg).map(InboundUpdate::Message),
        UpdateKind::CallbackQuery(query) => inbound_callback(&query).map(InboundUpdate::Callback),
        other => {
            debug!("ignoring update: {other:?}");
            None
        },
    }
}

pub fn inbound_message(msg: &Message) -> Option<InboundMessage> {
    let MessageKind::Common(common) = &msg.kind else {
        return None;
    };
    let (content_kind, text, caption, media) = content(&common.media_kind);
    Some(InboundMessage {
        message_id: i64::from(msg.id.0),
        chat_id: msg.chat.id.0,
        chat_kind: chat_kind(&msg.chat),
        sender: msg.from.as_ref().and_then(sender_profile),
        content_kind,
        text,
        caption,
        media,
    })
}

pub fn inbound_callback(query: &CallbackQuery) -> Option<InboundCallback> {
    Some(InboundCallback {
        id: query.id.clone(),
        from: sender_profile(&query.from)?,
        data: query.data.clone(),
        chat_id: query.message.as_ref().map(|m| m.chat().id.0),
        message_id: query.message.as_ref().map(|m| i64::from(m.id().0)),
    })
}

fn sender_profile(user: &User) -> Option<SenderProfile> {
    Some(SenderProfile {
        id: i64::try_from(user.id.0).ok()?,
        first_name: user.first_name.clone(),
        last_name: user.last_name.clone(),
        username: user.username.clone(),
        is_bot: user.is_bot,
    })
}

fn chat_kind(chat: &Chat) -> ChatKind {
    if chat.is_private() {
        ChatKind::Private
    } else if chat.is_channel() {
        ChatKind::Channel
    } else {
        ChatKind::Group
    }
}

fn file(meta: &FileMeta) -> MediaFile {
    MediaFile {
        file_id: meta.id.clone(),
        file_unique_id: Some(meta.unique_id.clone()),
        file_size: Some(u64::from(meta.size)),
        ..Default::default()
    }
}

type Content = (ContentKind, Option<String>, Option<String>, MediaPayload);

fn content(kind: &MediaKind) -> Content {
    let mut media = MediaPayload::default();
    let (content_kind, text, caption) = match kind {
        MediaKind::Text(t) => (ContentKind::Text, Some(t.text.clone()), None),
        MediaKind::Photo(p) => {
            media.photo = p
                .photo
                .iter()
                .map(|ps| MediaFile {
                    width: Some(ps.width),
                    height: Some(ps.height),
                    ..file(&ps.file)
                })
                .collect();
            (ContentKind::Photo, None, p.caption.clone())
        },
        MediaKind::Document(d) => {
            media.document = Some(MediaFile {
                file_name: d.document.file_name.clone(),
                mime_type: d.document.mime_type.as_ref().map(ToString::to_string),
                ..file(&d.document.file)
            });
            (ContentKind::Document, None, d.caption.clone())
        },
        MediaKind::Video(v) => {
            media.video = Some(MediaFile {
                file_name: v.video.file_name.clone(),
                mime_type: v.video.mime_type.as_ref().map(ToString::to_string),
                width: Some(v.video.width),
                height: Some(v.video.height),
                duration: Some(v.video.duration.seconds()),
                ..file(&v.video.file)
            });
            (ContentKind::Video, None, v.caption.clone())
        },
        MediaKind::Voice(v) => {
            media.voice = Some(MediaFile {
                mime_type: v.voice.mime_type.as_ref().map(ToString::to_string),
                duration: Some(v.voice.duration.seconds()),
                ..file(&v.voice.file)
            });
            (ContentKind::Voice, None, v.caption.clone())
        },
        MediaKind::Audio(a) => {
            media.audio = Some(MediaFile {
                file_name: a.audio.file_name.clone(),
                mime_type: a.audio.mime_type.as_ref().map(ToString::to_string),
                duration: Some(a.audio.duration.seconds()),
                ..file(&a.audio.file)
            });
            (ContentKind::Audio, None, a.caption.clone())
        },
        MediaKind::Animation(a) => {
            media.animation = Some(MediaFile {
                file_name: a.animation.file_name.clone(),
                mime_type: a.animation.mime_type.as_ref().map(ToString::to_string),
                width: Some(a.animation.width),
                height: Some(a.animation.height),
                duration: Some(a.animation.duration.seconds()),
                ..file(&a.animation.file)
            });
            (ContentKind::Animation, None, a.caption.clone())
        },
        MediaKind::VideoNote(v) => {
            media.video_note = Some(MediaFile {
                width: Some(v.video_note.length),
                height: Some(v.video_note.length),
                duration: Some(v.video_note.duration.seconds()),
                ..file(&v.video_note.file)
            });
            (ContentKind::VideoNote, None, None)
        },
        MediaKind::Sticker(_) => (ContentKind::Sticker, None, None),
        MediaKind::Location(_) => (ContentKind::Location, None, None),
        MediaKind::Contact(_) => (ContentKind::Contact, None, None),
        _ => (ContentKind::Other, None, None),
    };
    (content_kind, text, caption, media)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest, serde_json::json};

    fn message(body: serde_json::Value) -> Message {
        message_in(
            json!({ "id": 42, "type": "private", "first_name": "Alice" }),
            body,
        )
    }

    fn message_in(chat: serde_json::Value, body: serde_json::Value) -> Message {
        let mut value = json!({
            "message_id": 9,
            "date": 1,
            "chat": chat,
            "from": {
                "id": 42,
                "is_bot": false,
                "first_name": "Alice",
                "username": "alice"
            },
        });
        value
            .as_object_mut()
            .unwrap()
            .extend(body.as_object().unwrap().clone());
        serde_json::from_value(value).expect("deserialize message")
    }

    #[test]
    fn text_message() {
        let msg = inbound_message(&message(json!({ "text": "/start" }))).unwrap();

        assert_eq!(msg.message_id, 9);
        assert_eq!(msg.chat_id, 42);
        assert_eq!(msg.chat_kind, ChatKind::Private);
        assert_eq!(msg.content_kind, ContentKind::Text);
        assert!(msg.is_command("start"));
        let sender = msg.sender.unwrap();
        assert_eq!(sender.id, 42);
        assert_eq!(sender.username.as_deref(), Some("alice"));
        assert!(msg.media.is_empty());
    }

    #[test]
    fn photo_keeps_every_variant_and_caption() {
        let msg = inbound_message(&message(json!({
            "caption": "broken screen",
            "photo": [
                { "file_id": "s", "file_unique_id": "su", "file_size": 10, "width": 90, "height": 90 },
                { "file_id": "l", "file_unique_id": "lu", "file_size": 900, "width": 1280, "height": 960 },
            ]
        })))
        .unwrap();

        assert_eq!(msg.content_kind, ContentKind::Photo);
        assert_eq!(msg.caption.as_deref(), Some("broken screen"));
        assert_eq!(msg.media.photo.len(), 2);
        assert_eq!(msg.media.photo[1].file_id, "l");
        assert_eq!(msg.media.photo[1].width, Some(1280));
        assert_eq!(msg.media.photo[1].file_size, Some(900));
    }

    #[test]
    fn document_carries_name_and_mime() {
        let msg = inbound_message(&message(json!({
            "document": {
                "file_id": "doc",
                "file_unique_id": "docu",
                "file_size": 2048,
                "file_name": "receipt.pdf",
                "mime_type": "application/pdf"
            }
        })))
        .unwrap();

        assert_eq!(msg.content_kind, ContentKind::Document);
        let doc = msg.media.document.unwrap();
        assert_eq!(doc.file_name.as_deref(), Some("receipt.pdf"));
        assert_eq!(doc.mime_type.as_deref(), Some("application/pdf"));
        assert_eq!(doc.file_unique_id.as_deref(), Some("docu"));
    }

    #[test]
    fn voice_has_duration() {
        let msg = inbound_message(&message(json!({
            "voice": {
                "file_id": "voice-file-id",
                "file_unique_id": "voice-unique-id",
                "duration": 3,
                "mime_type": "audio/ogg",
                "file_size": 123
            }
        })))
        .unwrap();

        assert_eq!(msg.content_kind, ContentKind::Voice);
        let voice = msg.media.voice.unwrap();
        assert_eq!(voice.duration, Some(3));
        assert_eq!(voice.mime_type.as_deref(), Some("audio/ogg"));
    }

    #[test]
    fn location_is_not_media() {
        let msg = inbound_message(&message(json!({
            "location": { "latitude": 48.8566, "longitude": 2.3522 }
        })))
        .unwrap();

        assert_eq!(msg.content_kind, ContentKind::Location);
        assert!(msg.media.is_empty());
    }

    #[rstest]
    #[case(json!({ "id": 42, "type": "private", "first_name": "Alice" }), ChatKind::Private)]
    #[case(json!({ "id": -5, "type": "group", "title": "Ops" }), ChatKind::Group)]
    #[case(json!({ "id": -100, "type": "supergroup", "title": "Operators" }), ChatKind::Group)]
    #[case(json!({ "id": -200, "type": "channel", "title": "News" }), ChatKind::Channel)]
    fn chat_kinds(#[case] chat: serde_json::Value, #[case] expected: ChatKind) {
        let id = chat["id"].as_i64().unwrap();
        let msg = inbound_message(&message_in(chat, json!({ "text": "hi" }))).unwrap();
        assert_eq!(msg.chat_kind, expected);
        assert_eq!(msg.chat_id, id);
    }

    #[test]
    fn callback_query() {
        let query: CallbackQuery = serde_json::from_value(json!({
            "id": "cb-7",
            "from": { "id": 500, "is_bot": false, "first_name": "Olga" },
            "chat_instance": "ci",
            "data": "claim:3",
            "message": {
                "message_id": 55,
                "date": 1,
                "chat": { "id": -100, "type": "supergroup", "title": "Operators" },
                "text": "New client #3"
            }
        }))
        .expect("deserialize callback");

        let cb = inbound_callback(&query).unwrap();

        assert_eq!(cb.id, "cb-7");
        assert_eq!(cb.from.id, 500);
        assert_eq!(cb.data.as_deref(), Some("claim:3"));
        assert_eq!(cb.chat_id, Some(-100));
        assert_eq!(cb.message_id, Some(55));
    }
}
