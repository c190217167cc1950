use std::time::Duration;

/// Capture failures. Always isolated to one attachment.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to download {file_id}: {source}")]
    Download {
        file_id: String,
        #[source]
        source: relaydesk_channels::Error,
    },

    #[error("download of {file_id} timed out after {timeout:?}")]
    Timeout { file_id: String, timeout: Duration },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("{message}")]
    InvalidInput { message: String },
}

impl Error {
    #[must_use]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
