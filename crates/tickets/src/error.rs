use relaydesk_common::FromMessage;

/// Storage failures.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),

    /// A stored column held a value the model does not know.
    #[error("corrupt row in {table}: {message}")]
    Corrupt {
        table: &'static str,
        message: String,
    },

    #[error("{message}")]
    Message { message: String },
}

impl Error {
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }

    pub(crate) fn corrupt(table: &'static str, message: impl std::fmt::Display) -> Self {
        Self::Corrupt {
            table,
            message: message.to_string(),
        }
    }
}

impl FromMessage for Error {
    fn from_message(message: String) -> Self {
        Self::Message { message }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

relaydesk_common::impl_context!();

/// Rejected state transitions, reported to whoever attempted them.
#[derive(Debug, thiserror::Error)]
pub enum TicketError {
    /// Claim on a ticket that is not WAITING, or does not exist.
    #[error("ticket #{ticket_id} is already taken")]
    AlreadyClaimed { ticket_id: i64 },

    /// Close or history view by someone other than the assigned operator.
    #[error("ticket #{ticket_id} is not assigned to you")]
    NotOwner { ticket_id: i64 },

    #[error("ticket #{ticket_id} not found")]
    NotFound { ticket_id: i64 },

    #[error(transparent)]
    Store(#[from] Error),
}

impl TicketError {
    /// `true` for violations the actor should be told about.
    #[must_use]
    pub fn is_denial(&self) -> bool {
        !matches!(self, Self::Store(_))
    }
}

impl From<sqlx::Error> for TicketError {
    fn from(err: sqlx::Error) -> Self {
        Self::Store(err.into())
    }
}
