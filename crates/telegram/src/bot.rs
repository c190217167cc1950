use std::{sync::Arc, time::Duration};

use {
    relaydesk_config::TelegramConfig,
    relaydesk_routing::Dispatcher,
    secrecy::ExposeSecret,
    teloxide::{
        ApiError, RequestError,
        prelude::*,
        types::{AllowedUpdate, BotCommand},
    },
    tokio_util::sync::CancellationToken,
    tracing::{debug, error, info, warn},
};

use crate::{
    Error, Result, handlers,
    outbound::TelegramOutbound,
    state::{PollingHandle, TelegramBot},
};

/// Verify the token, clear any webhook and register the command list.
pub async fn connect(config: &TelegramConfig) -> Result<TelegramBot> {
    if !config.has_token() {
        return Err(Error::message("telegram.token is not set"));
    }

    // The client timeout has to outlast the long poll or every idle
    // getUpdates call aborts.
    let client = teloxide::net::default_reqwest_settings()
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .build()?;
    let bot = Bot::with_client(config.token.expose_secret(), client);
    connect_bot(bot, config.poll_timeout_secs).await
}

pub(crate) async fn connect_bot(bot: Bot, poll_timeout_secs: u32) -> Result<TelegramBot> {
    let me = bot.get_me().await?;
    let username = me.username.clone();

    bot.delete_webhook().send().await?;

    let commands = vec![BotCommand::new("start", "Open the support menu")];
    if let Err(e) = bot.set_my_commands(commands).await {
        warn!("failed to register bot commands: {e}");
    }

    info!(username = ?username, "telegram bot connected (webhook cleared)");

    Ok(TelegramBot {
        outbound: Arc::new(TelegramOutbound::new(bot.clone())),
        bot,
        username,
        poll_timeout_secs,
    })
}

/// Spawn the long-polling loop. Updates are handled one at a time, in
/// order, until the returned handle is shut down.
pub fn start_polling(bot: TelegramBot, dispatcher: Dispatcher) -> PollingHandle {
    let cancel = CancellationToken::new();
    let loop_cancel = cancel.clone();

    let task = tokio::spawn(async move {
        info!("starting telegram polling loop");
        let TelegramBot {
            bot,
            poll_timeout_secs,
            ..
        } = bot;
        let mut offset: i32 = 0;

        loop {
            let request = bot
                .get_updates()
                .offset(offset)
                .timeout(poll_timeout_secs)
                .allowed_updates(vec![AllowedUpdate::Message, AllowedUpdate::CallbackQuery]);

            let result = tokio::select! {
                () = loop_cancel.cancelled() => {
                    info!("telegram polling stopped");
                    break;
                },
                result = request.send() => result,
            };

            match result {
                Ok(updates) => {
                    debug!(count = updates.len(), "got telegram updates");
                    for update in updates {
                        offset = update.id.as_offset();
                        if let Err(e) = handlers::handle_update(&dispatcher, update.kind).await {
                            error!(error = %e, "error handling telegram update");
                        }
                    }
                },
                Err(RequestError::Api(ApiError::TerminatedByOtherGetUpdates)) => {
                    warn!(
                        "telegram polling disabled: another instance is already running with this token"
                    );
                    loop_cancel.cancel();
                    break;
                },
                Err(e) => {
                    warn!(error = %e, "telegram getUpdates failed");
                    tokio::select! {
                        () = loop_cancel.cancelled() => break,
                        () = tokio::time::sleep(Duration::from_secs(5)) => {},
                    }
                },
            }
        }
    });

    PollingHandle { cancel, task }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    };

    use {
        axum::{Json, Router, body::Bytes, extract::State, http::Uri, routing::post},
        relaydesk_media::CaptureSettings,
        relaydesk_routing::DeskConfig,
        relaydesk_tickets::{SqliteTicketStore, TicketStore},
        serde_json::{Value, json},
    };

    use super::*;

    #[derive(Clone, Default)]
    struct MockApi {
        sent: Arc<Mutex<Vec<Value>>>,
        polls: Arc<AtomicUsize>,
    }

    async fn api_handler(State(state): State<MockApi>, uri: Uri, body: Bytes) -> Json<Value> {
        let method = uri
            .path()
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        let body: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);

        Json(match method.as_str() {
            "getme" => json!({
                "ok": true,
                "result": {
                    "id": 1,
                    "is_bot": true,
                    "first_name": "Desk",
                    "username": "desk_bot",
                    "can_join_groups": true,
                    "can_read_all_group_messages": false,
                    "supports_inline_queries": false,
                    "can_connect_to_business": false,
                    "has_main_web_app": false
                }
            }),
            "getupdates" if state.polls.fetch_add(1, Ordering::SeqCst) == 0 => json!({
                "ok": true,
                "result": [{
                    "update_id": 10,
                    "message": {
                        "message_id": 1,
                        "date": 1,
                        "chat": { "id": 42, "type": "private", "first_name": "Ann" },
                        "from": { "id": 42, "is_bot": false, "first_name": "Ann" },
                        "text": "/start"
                    }
                }]
            }),
            "getupdates" => {
                tokio::time::sleep(Duration::from_millis(50)).await;
                json!({ "ok": true, "result": [] })
            },
            "sendmessage" => {
                state.sent.lock().unwrap().push(body.clone());
                json!({
                    "ok": true,
                    "result": {
                        "message_id": 2,
                        "date": 1,
                        "chat": { "id": body["chat_id"], "type": "private", "first_name": "Ann" },
                        "text": body["text"]
                    }
                })
            },
            _ => json!({ "ok": true, "result": true }),
        })
    }

    #[tokio::test]
    async fn polls_and_dispatches_start() {
        let api = MockApi::default();
        let app = Router::new()
            .route("/{*path}", post(api_handler))
            .with_state(api.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        let api_url = reqwest::Url::parse(&format!("http://{addr}/")).unwrap();
        let bot = Bot::new("test-token").set_api_url(api_url);
        let connected = connect_bot(bot, 0).await.unwrap();
        assert_eq!(connected.username.as_deref(), Some("desk_bot"));

        let store: Arc<dyn TicketStore> =
            Arc::new(SqliteTicketStore::new("sqlite::memory:", 1).await.unwrap());
        let dispatcher = Dispatcher::new(
            Arc::clone(&store),
            connected.outbound.clone(),
            DeskConfig {
                operators_chat_id: -100,
                abandon_after: Duration::from_secs(60),
                capture: CaptureSettings::default(),
                default_country_code: None,
            },
        );

        let handle = start_polling(connected, dispatcher);
        for _ in 0..100 {
            if !api.sent.lock().unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        handle.shutdown().await;

        let sent = api.sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0]["chat_id"], 42);
        assert!(sent[0]["reply_markup"]["inline_keyboard"].is_array());
        assert!(store.find_user_by_external(42).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn connect_requires_token() {
        let err = connect(&TelegramConfig::default()).await.err().unwrap();
        assert!(err.to_string().contains("token"));
    }
}
