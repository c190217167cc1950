use std::sync::Arc;

use {tokio::task::JoinHandle, tokio_util::sync::CancellationToken};

use crate::outbound::TelegramOutbound;

/// A connected bot, ready to poll.
#[derive(Clone)]
pub struct TelegramBot {
    pub bot: teloxide::Bot,
    pub username: Option<String>,
    pub outbound: Arc<TelegramOutbound>,
    pub poll_timeout_secs: u32,
}

/// Running polling loop.
pub struct PollingHandle {
    pub cancel: CancellationToken,
    pub task: JoinHandle<()>,
}

impl PollingHandle {
    /// Stop polling and wait for the in-flight batch to finish.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "telegram polling task ended abnormally");
        }
    }
}
