use std::{future::Future, time::Duration};

use {
    async_trait::async_trait,
    relaydesk_channels::{ChannelOutbound, Error, InlineKeyboard, Result},
    teloxide::{
        ApiError, RequestError,
        payloads::SendMessageSetters,
        prelude::*,
        types::{ChatId, InlineKeyboardButton, InlineKeyboardMarkup, MessageId},
    },
    tracing::{debug, warn},
};

#[cfg(feature = "metrics")]
use relaydesk_metrics::{counter, telegram as tg_metrics};

const TELEGRAM_RETRY_AFTER_MAX_RETRIES: usize = 4;

/// Bot API transport behind the routing core.
pub struct TelegramOutbound {
    bot: Bot,
    http: reqwest::Client,
}

impl TelegramOutbound {
    pub fn new(bot: Bot) -> Self {
        Self {
            bot,
            http: reqwest::Client::new(),
        }
    }

    async fn run_with_retry<T, F, Fut>(
        &self,
        operation: &'static str,
        mut request: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, RequestError>>,
    {
        let mut retries = 0usize;

        loop {
            match request().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    let Some(wait) = retry_after_duration(&err) else {
                        #[cfg(feature = "metrics")]
                        counter!(tg_metrics::API_ERRORS_TOTAL, "operation" => operation)
                            .increment(1);
                        return Err(channel_error(operation, err));
                    };

                    if retries >= TELEGRAM_RETRY_AFTER_MAX_RETRIES {
                        warn!(
                            operation,
                            retries,
                            retry_after_secs = wait.as_secs(),
                            "telegram rate limit persisted after retries"
                        );
                        return Err(channel_error(operation, err));
                    }

                    retries += 1;
                    warn!(
                        operation,
                        retries,
                        max_retries = TELEGRAM_RETRY_AFTER_MAX_RETRIES,
                        retry_after_secs = wait.as_secs(),
                        "telegram rate limited, waiting before retry"
                    );
                    tokio::time::sleep(wait).await;
                },
            }
        }
    }
}

fn retry_after_duration(error: &RequestError) -> Option<Duration> {
    match error {
        RequestError::RetryAfter(wait) => Some(wait.duration()),
        _ => None,
    }
}

/// Map a Bot API failure onto the transport-neutral error.
fn channel_error(operation: &'static str, error: RequestError) -> Error {
    match error {
        RequestError::Api(api) => Error::rejected(operation, api_description(&api)),
        RequestError::RetryAfter(wait) => Error::rejected(
            operation,
            format!("rate limited for {}s", wait.duration().as_secs()),
        ),
        RequestError::Network(e) if e.is_timeout() => Error::Timeout { operation },
        other => Error::external(operation, other),
    }
}

fn api_description(error: &ApiError) -> String {
    match error {
        ApiError::Unknown(description) => description.clone(),
        known => known.to_string(),
    }
}

fn markup(keyboard: &InlineKeyboard) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(keyboard.rows.iter().map(|row| {
        row.iter()
            .map(|b| InlineKeyboardButton::callback(b.label.clone(), b.data.clone()))
            .collect::<Vec<_>>()
    }))
}

fn message_id(id: i64) -> Result<MessageId> {
    i32::try_from(id)
        .map(MessageId)
        .map_err(|_| Error::invalid_input(format!("message id out of range: {id}")))
}

#[async_trait]
impl ChannelOutbound for TelegramOutbound {
    async fn send_text(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<&InlineKeyboard>,
    ) -> Result<i64> {
        let reply_markup = keyboard.map(markup);
        let sent = self
            .run_with_retry("sendMessage", || {
                let mut req = self.bot.send_message(ChatId(chat_id), text);
                if let Some(ref kb) = reply_markup {
                    req = req.reply_markup(kb.clone());
                }
                async move { req.await }
            })
            .await?;
        Ok(i64::from(sent.id.0))
    }

    async fn copy_message(
        &self,
        to_chat_id: i64,
        from_chat_id: i64,
        message_id: i64,
    ) -> Result<i64> {
        let id = self::message_id(message_id)?;
        let copied = self
            .run_with_retry("copyMessage", || {
                let req = self
                    .bot
                    .copy_message(ChatId(to_chat_id), ChatId(from_chat_id), id);
                async move { req.await }
            })
            .await?;
        debug!(to_chat_id, from_chat_id, message_id, "message copied");
        Ok(i64::from(copied.0))
    }

    async fn fetch_file(&self, file_id: &str) -> Result<Vec<u8>> {
        let file = self
            .run_with_retry("getFile", || {
                let req = self.bot.get_file(file_id);
                async move { req.await }
            })
            .await?;

        let url = self
            .bot
            .api_url()
            .join(&format!("file/bot{}/{}", self.bot.token(), file.path))
            .map_err(|e| Error::external("build file url", e))?;

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| Error::external("download file", e))?;
        if !response.status().is_success() {
            return Err(Error::rejected(
                "downloadFile",
                format!("HTTP {}", response.status()),
            ));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::external("read file body", e))?;
        Ok(bytes.to_vec())
    }

    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
        alert: bool,
    ) -> Result<()> {
        self.run_with_retry("answerCallbackQuery", || {
            let mut req = self.bot.answer_callback_query(callback_id);
            if let Some(text) = text {
                req = req.text(text).show_alert(alert);
            }
            async move { req.await }
        })
        .await?;
        Ok(())
    }
}
