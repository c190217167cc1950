use relaydesk_tickets::TicketError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Rejected state transition (already claimed, not owner, not found).
    #[error(transparent)]
    Ticket(#[from] TicketError),

    #[error(transparent)]
    Store(#[from] relaydesk_tickets::Error),

    #[error(transparent)]
    Channel(#[from] relaydesk_channels::Error),

    #[error("unrecognised callback data: {data}")]
    UnknownCallback { data: String },
}

impl Error {
    /// Errors the triggering actor is told about. Everything else is
    /// logged only.
    #[must_use]
    pub fn is_user_facing(&self) -> bool {
        match self {
            Self::Ticket(e) => e.is_denial(),
            Self::Store(_) | Self::Channel(_) | Self::UnknownCallback { .. } => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
