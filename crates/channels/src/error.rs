use std::error::Error as StdError;

/// Crate-wide result type for transport operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Failures reported by a messaging transport.
///
/// Callers treat every variant as a soft failure: it is logged and the
/// surrounding unit of work carries on.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Input payload or parameter is invalid.
    #[error("invalid channel input: {message}")]
    InvalidInput { message: String },

    /// The platform refused the call (blocked bot, purged message, ...).
    #[error("channel rejected {operation}: {message}")]
    Rejected {
        operation: &'static str,
        message: String,
    },

    /// The call did not complete within the transport timeout.
    #[error("channel call timed out: {operation}")]
    Timeout { operation: &'static str },

    /// Wrapped source error from an external dependency.
    #[error("channel operation failed: {context}: {source}")]
    External {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    /// JSON (de)serialization failed.
    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
}

impl Error {
    #[must_use]
    pub fn invalid_input(message: impl std::fmt::Display) -> Self {
        Self::InvalidInput {
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn rejected(operation: &'static str, message: impl std::fmt::Display) -> Self {
        Self::Rejected {
            operation,
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn external(
        context: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::External {
            context: context.into(),
            source: Box::new(source),
        }
    }
}
