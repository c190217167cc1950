use std::{path::PathBuf, time::Duration};

use {
    relaydesk_channels::{ChannelOutbound, InboundMessage, MediaFile, MediaKind},
    serde::Serialize,
    tracing::{debug, warn},
};

#[cfg(feature = "metrics")]
use relaydesk_metrics::{counter, media as media_metrics};

use crate::{
    Error, Result,
    store::{MediaStore, storage_path},
};

/// Telegram does not always declare a MIME type for photos; they are JPEG.
const PHOTO_MIME: &str = "image/jpeg";

/// Structured record of one media item found in a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttachmentDescriptor {
    pub kind: MediaKind,
    pub file_id: String,
    pub file_unique_id: Option<String>,
    pub file_name: Option<String>,
    pub mime_type: Option<String>,
    pub file_size: Option<u64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub duration: Option<u32>,
    /// Set only when persistence is enabled and the download succeeded.
    pub local_path: Option<PathBuf>,
}

impl AttachmentDescriptor {
    fn from_file(kind: MediaKind, file: &MediaFile) -> Self {
        Self {
            kind,
            file_id: file.file_id.clone(),
            file_unique_id: file.file_unique_id.clone(),
            file_name: file.file_name.clone(),
            mime_type: file.mime_type.clone(),
            file_size: file.file_size,
            width: file.width,
            height: file.height,
            duration: file.duration,
            local_path: None,
        }
    }
}

/// Extract one descriptor per media kind present in `msg`.
///
/// Photos contribute only their largest variant. Text-only messages yield
/// nothing.
pub fn classify(msg: &InboundMessage) -> Vec<AttachmentDescriptor> {
    MediaKind::ALL
        .into_iter()
        .filter_map(|kind| capture_rule(kind, msg))
        .collect()
}

fn capture_rule(kind: MediaKind, msg: &InboundMessage) -> Option<AttachmentDescriptor> {
    let media = &msg.media;
    match kind {
        MediaKind::Photo => largest_photo(&media.photo).map(|file| {
            let mut descriptor = AttachmentDescriptor::from_file(kind, file);
            descriptor.mime_type.get_or_insert_with(|| PHOTO_MIME.to_string());
            descriptor
        }),
        MediaKind::Document => media.document.as_ref().map(|f| AttachmentDescriptor::from_file(kind, f)),
        MediaKind::Video => media.video.as_ref().map(|f| AttachmentDescriptor::from_file(kind, f)),
        MediaKind::Voice => media.voice.as_ref().map(|f| AttachmentDescriptor::from_file(kind, f)),
        MediaKind::Audio => media.audio.as_ref().map(|f| AttachmentDescriptor::from_file(kind, f)),
        MediaKind::Animation => media
            .animation
            .as_ref()
            .map(|f| AttachmentDescriptor::from_file(kind, f)),
        MediaKind::VideoNote => media
            .video_note
            .as_ref()
            .map(|f| AttachmentDescriptor::from_file(kind, f)),
    }
}

/// Highest resolution wins; ties go to the later variant (the platform
/// lists sizes in ascending order).
fn largest_photo(variants: &[MediaFile]) -> Option<&MediaFile> {
    variants
        .iter()
        .max_by_key(|f| (f.area(), f.file_size.unwrap_or(0)))
}

/// Process-wide capture configuration.
#[derive(Debug, Clone)]
pub struct CaptureSettings {
    pub persist: bool,
    pub root: PathBuf,
    pub download_timeout: Duration,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            persist: false,
            root: PathBuf::from("media"),
            download_timeout: Duration::from_secs(30),
        }
    }
}

/// Classifies media and, when enabled, downloads it into a [`MediaStore`].
#[derive(Debug, Clone)]
pub struct MediaCapture {
    persist: bool,
    download_timeout: Duration,
    store: MediaStore,
}

impl MediaCapture {
    pub fn new(settings: CaptureSettings) -> Self {
        Self {
            persist: settings.persist,
            download_timeout: settings.download_timeout,
            store: MediaStore::new(settings.root),
        }
    }

    /// Classify `msg` and persist each item for `(ticket_id, message_id)`.
    ///
    /// Never fails: a download error is logged and the descriptor is kept
    /// without a local path. Siblings are unaffected.
    pub async fn capture(
        &self,
        outbound: &dyn ChannelOutbound,
        msg: &InboundMessage,
        ticket_id: i64,
        message_id: i64,
    ) -> Vec<AttachmentDescriptor> {
        let mut descriptors = classify(msg);
        if descriptors.is_empty() {
            return descriptors;
        }
        debug!(
            ticket_id,
            message_id,
            count = descriptors.len(),
            persist = self.persist,
            "captured attachments"
        );

        if self.persist {
            for descriptor in &mut descriptors {
                match self
                    .download(outbound, descriptor, ticket_id, message_id)
                    .await
                {
                    Ok(path) => descriptor.local_path = Some(path),
                    Err(e) => {
                        warn!(
                            ticket_id,
                            message_id,
                            kind = %descriptor.kind,
                            error = %e,
                            "attachment download failed, keeping metadata only"
                        );
                        #[cfg(feature = "metrics")]
                        counter!(media_metrics::DOWNLOAD_FAILURES_TOTAL).increment(1);
                    },
                }
            }
        }

        #[cfg(feature = "metrics")]
        for descriptor in &descriptors {
            counter!(media_metrics::ATTACHMENTS_CAPTURED_TOTAL, "kind" => descriptor.kind.as_str())
                .increment(1);
        }

        descriptors
    }

    async fn download(
        &self,
        outbound: &dyn ChannelOutbound,
        descriptor: &AttachmentDescriptor,
        ticket_id: i64,
        message_id: i64,
    ) -> Result<PathBuf> {
        let bytes = tokio::time::timeout(
            self.download_timeout,
            outbound.fetch_file(&descriptor.file_id),
        )
        .await
        .map_err(|_| Error::Timeout {
            file_id: descriptor.file_id.clone(),
            timeout: self.download_timeout,
        })?
        .map_err(|source| Error::Download {
            file_id: descriptor.file_id.clone(),
            source,
        })?;

        let relative = storage_path(
            ticket_id,
            message_id,
            descriptor.kind,
            descriptor.file_unique_id.as_deref(),
            descriptor.mime_type.as_deref(),
        );
        self.store.write(&relative, &bytes).await
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        async_trait::async_trait,
        relaydesk_channels::{ChatKind, ContentKind, InlineKeyboard, MediaPayload},
        std::sync::Mutex,
    };

    /// Serves file bytes by id; unknown ids fail like a purged file.
    #[derive(Default)]
    struct FileServer {
        files: Vec<(&'static str, &'static [u8])>,
        fetched: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ChannelOutbound for FileServer {
        async fn send_text(
            &self,
            _chat_id: i64,
            _text: &str,
            _keyboard: Option<&InlineKeyboard>,
        ) -> relaydesk_channels::Result<i64> {
            Ok(0)
        }

        async fn copy_message(
            &self,
            _to_chat_id: i64,
            _from_chat_id: i64,
            _message_id: i64,
        ) -> relaydesk_channels::Result<i64> {
            Ok(0)
        }

        async fn fetch_file(&self, file_id: &str) -> relaydesk_channels::Result<Vec<u8>> {
            self.fetched.lock().unwrap().push(file_id.to_string());
            self.files
                .iter()
                .find(|(id, _)| *id == file_id)
                .map(|(_, bytes)| bytes.to_vec())
                .ok_or_else(|| relaydesk_channels::Error::rejected("getFile", "file is gone"))
        }

        async fn answer_callback(
            &self,
            _callback_id: &str,
            _text: Option<&str>,
            _alert: bool,
        ) -> relaydesk_channels::Result<()> {
            Ok(())
        }
    }

    fn file(id: &str, width: u32, height: u32) -> MediaFile {
        MediaFile {
            file_id: id.into(),
            file_unique_id: Some(format!("u-{id}")),
            width: Some(width),
            height: Some(height),
            ..Default::default()
        }
    }

    fn message(kind: ContentKind, media: MediaPayload) -> InboundMessage {
        InboundMessage {
            message_id: 77,
            chat_id: 1001,
            chat_kind: ChatKind::Private,
            sender: None,
            content_kind: kind,
            text: None,
            caption: None,
            media,
        }
    }

    #[test]
    fn photo_keeps_only_largest_variant() {
        let msg = message(ContentKind::Photo, MediaPayload {
            photo: vec![file("s", 90, 60), file("l", 1280, 853), file("m", 320, 213)],
            ..Default::default()
        });

        let found = classify(&msg);

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].kind, MediaKind::Photo);
        assert_eq!(found[0].file_id, "l");
        assert_eq!(found[0].mime_type.as_deref(), Some("image/jpeg"));
    }

    #[test]
    fn text_message_has_no_attachments() {
        let mut msg = message(ContentKind::Text, MediaPayload::default());
        msg.text = Some("hello".into());
        assert!(classify(&msg).is_empty());
    }

    #[test]
    fn one_descriptor_per_kind_present() {
        let msg = message(ContentKind::Document, MediaPayload {
            document: Some(MediaFile {
                file_id: "doc".into(),
                file_name: Some("invoice.pdf".into()),
                mime_type: Some("application/pdf".into()),
                file_size: Some(2048),
                ..Default::default()
            }),
            voice: Some(MediaFile {
                file_id: "voice".into(),
                duration: Some(4),
                ..Default::default()
            }),
            ..Default::default()
        });

        let found = classify(&msg);

        let kinds: Vec<_> = found.iter().map(|d| d.kind).collect();
        assert_eq!(kinds, vec![MediaKind::Document, MediaKind::Voice]);
        assert_eq!(found[0].file_name.as_deref(), Some("invoice.pdf"));
        assert_eq!(found[0].file_size, Some(2048));
        assert_eq!(found[1].duration, Some(4));
    }

    #[tokio::test]
    async fn persistence_disabled_never_downloads() {
        let server = FileServer::default();
        let capture = MediaCapture::new(CaptureSettings::default());
        let msg = message(ContentKind::Photo, MediaPayload {
            photo: vec![file("p", 10, 10)],
            ..Default::default()
        });

        let found = capture.capture(&server, &msg, 1, 2).await;

        assert_eq!(found.len(), 1);
        assert!(found[0].local_path.is_none());
        assert!(server.fetched.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_download_keeps_descriptor_and_siblings() {
        let dir = tempfile::tempdir().unwrap();
        let server = FileServer {
            files: vec![("video", b"mp4-bytes".as_slice())],
            ..Default::default()
        };
        let capture = MediaCapture::new(CaptureSettings {
            persist: true,
            root: dir.path().to_path_buf(),
            download_timeout: Duration::from_secs(5),
        });
        let msg = message(ContentKind::Video, MediaPayload {
            photo: vec![file("missing", 10, 10)],
            video: Some(MediaFile {
                file_id: "video".into(),
                file_unique_id: Some("vid1".into()),
                mime_type: Some("video/mp4".into()),
                ..Default::default()
            }),
            ..Default::default()
        });

        let found = capture.capture(&server, &msg, 3, 9).await;

        assert_eq!(found.len(), 2);
        assert!(found[0].local_path.is_none(), "photo download failed");
        let stored = found[1].local_path.as_ref().expect("video stored");
        assert_eq!(stored, &dir.path().join("ticket_3/9/video_vid1.mp4"));
        assert_eq!(std::fs::read(stored).unwrap(), b"mp4-bytes");
    }
}
