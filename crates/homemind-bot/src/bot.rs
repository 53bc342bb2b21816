//! The bot loop: authorization, per-participant serialization, and
//! dispatch to admin commands or the message pipeline.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{info, warn};

use homemind_agent::{AgentContext, Notifier, handle_message};
use homemind_core::config::TelegramConfig;

use crate::commands::{handle_command, parse_command};
use crate::telegram::TelegramApi;

/// Long-polling Telegram bot.
pub struct Bot {
    api: Arc<TelegramApi>,
    ctx: Arc<AgentContext>,
    authorized_users: Vec<i64>,
    /// One guard per chat: a participant's messages are processed
    /// end-to-end, one at a time; different participants run in parallel.
    locks: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl Bot {
    pub fn new(api: Arc<TelegramApi>, ctx: Arc<AgentContext>, config: &TelegramConfig) -> Self {
        if config.authorized_users.is_empty() {
            warn!("no authorized users configured - allowing all users");
        }
        Self {
            api,
            ctx,
            authorized_users: config.authorized_users.clone(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn is_authorized(&self, user_id: i64) -> bool {
        self.authorized_users.is_empty() || self.authorized_users.contains(&user_id)
    }

    async fn chat_lock(&self, chat_id: i64) -> Arc<Mutex<()>> {
        self.locks
            .lock()
            .await
            .entry(chat_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Poll forever, spawning a task per incoming message.
    pub async fn run(self: Arc<Self>) {
        let mut offset = 0i64;
        loop {
            for update in self.api.get_updates(offset).await {
                offset = update.update_id + 1;

                let Some(message) = update.message else {
                    continue;
                };
                let Some(text) = message
                    .text
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty())
                else {
                    continue;
                };
                let chat_id = message.chat.id;
                let user_id = message.from.map(|u| u.id).unwrap_or(chat_id);

                let bot = self.clone();
                tokio::spawn(async move {
                    bot.handle(chat_id, user_id, text).await;
                });
            }
        }
    }

    async fn handle(&self, chat_id: i64, user_id: i64, text: String) {
        if !self.is_authorized(user_id) {
            self.api
                .send_message(
                    chat_id,
                    &format!("Sorry, you're not authorized. Your user ID: {user_id}"),
                )
                .await;
            return;
        }

        let lock = self.chat_lock(chat_id).await;
        let _guard = lock.lock().await;

        if let Some((command, args)) = parse_command(&text) {
            let reply = handle_command(&self.ctx, chat_id, command, args).await;
            self.api.send_message(chat_id, &reply).await;
            return;
        }

        info!("message from {user_id}: {text}");
        self.api.send_typing(chat_id).await;

        let reply = handle_message(&self.ctx, chat_id, &text).await;
        self.api.send_message(chat_id, &reply.text).await;
        if let Some(warning) = reply.warning {
            self.api.send_message(chat_id, &warning).await;
        }
    }
}

/// Routes scheduler output to the configured notification chat.
pub struct BotNotifier {
    api: Arc<TelegramApi>,
    chat_id: Option<i64>,
}

impl BotNotifier {
    pub fn new(api: Arc<TelegramApi>, chat_id: Option<i64>) -> Self {
        Self { api, chat_id }
    }
}

#[async_trait]
impl Notifier for BotNotifier {
    async fn notify(&self, text: &str) {
        self.api.send_notification(self.chat_id, text).await;
    }
}
