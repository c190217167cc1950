use async_trait::async_trait;

use crate::{Result, keyboard::InlineKeyboard};

/// Calls the routing core makes into the messaging platform.
///
/// Every method is fallible on its own; callers decide per call whether a
/// failure is reported or swallowed.
#[async_trait]
pub trait ChannelOutbound: Send + Sync {
    /// Send a text message, optionally with an inline keyboard. Returns the
    /// new message id.
    async fn send_text(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<&InlineKeyboard>,
    ) -> Result<i64>;

    /// Copy a message into another chat. The copy is independent of the
    /// original, so it survives deletion on the sender side.
    async fn copy_message(&self, to_chat_id: i64, from_chat_id: i64, message_id: i64)
    -> Result<i64>;

    /// Download the bytes behind a platform file reference.
    async fn fetch_file(&self, file_id: &str) -> Result<Vec<u8>>;

    /// Acknowledge a button press, optionally with a toast or alert.
    async fn answer_callback(&self, callback_id: &str, text: Option<&str>, alert: bool)
    -> Result<()>;
}
