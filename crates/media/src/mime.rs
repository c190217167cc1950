//! File extension guessing from declared MIME types.

/// Extension used when the MIME type is missing or unknown.
pub const FALLBACK_EXTENSION: &str = ".bin";

/// Preferred extensions for types where `mime_guess` lists several.
const PREFERRED: &[(&str, &str)] = &[
    ("image/jpeg", ".jpg"),
    ("image/png", ".png"),
    ("image/webp", ".webp"),
    ("image/gif", ".gif"),
    ("video/mp4", ".mp4"),
    ("video/quicktime", ".mov"),
    ("audio/ogg", ".ogg"),
    ("audio/mpeg", ".mp3"),
    ("audio/mp4", ".m4a"),
    ("application/pdf", ".pdf"),
    ("application/zip", ".zip"),
    ("text/plain", ".txt"),
];

/// Guess a dotted extension (`".jpg"`) for a MIME type.
pub fn guess_extension(mime: Option<&str>) -> String {
    let Some(essence) = mime
        .map(|m| m.split(';').next().unwrap_or(m).trim().to_ascii_lowercase())
        .filter(|m| !m.is_empty())
    else {
        return FALLBACK_EXTENSION.to_string();
    };

    if let Some((_, ext)) = PREFERRED.iter().find(|(m, _)| *m == essence) {
        return (*ext).to_string();
    }

    mime_guess::get_mime_extensions_str(&essence)
        .and_then(|exts| exts.first())
        .map(|ext| format!(".{ext}"))
        .unwrap_or_else(|| FALLBACK_EXTENSION.to_string())
}
