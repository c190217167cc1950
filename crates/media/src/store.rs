use std::path::{Path, PathBuf};

use {relaydesk_channels::MediaKind, tracing::debug};

use crate::{Result, mime::guess_extension};

/// Relative storage path for one attachment:
/// `ticket_<ticket>/<message>/<kind>_<unique-or-"file"><ext>`.
pub fn storage_path(
    ticket_id: i64,
    message_id: i64,
    kind: MediaKind,
    unique_id: Option<&str>,
    mime: Option<&str>,
) -> PathBuf {
    let stem = unique_id
        .map(sanitize)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "file".to_string());
    let ext = guess_extension(mime);
    PathBuf::from(format!("ticket_{ticket_id}"))
        .join(message_id.to_string())
        .join(format!("{kind}_{stem}{ext}"))
}

/// Keep ids path-safe: anything outside `[A-Za-z0-9_-]` becomes `_`.
fn sanitize(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Directory-backed content store rooted at the configured media root.
#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
}

impl MediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Write bytes under `relative`, creating parent directories.
    /// Returns the full path written.
    pub async fn write(&self, relative: &Path, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.root.join(relative);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;
        debug!(path = %path.display(), size = bytes.len(), "stored attachment");
        Ok(path)
    }
}
