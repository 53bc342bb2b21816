//! Telegram transport: long-polling updates, chunked replies, and the
//! notification channel used by the scheduler.
//!
//! Plain reqwest against the Bot API — no SDK. Transport errors are logged
//! and retried with a short backoff; they never take the process down.

use std::time::Duration;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

/// Telegram's hard per-message length limit.
pub const MAX_MESSAGE_LEN: usize = 4096;

/// Long-poll window; the HTTP timeout leaves headroom above it.
const POLL_TIMEOUT_SECS: u64 = 30;
const HTTP_TIMEOUT: Duration = Duration::from_secs(35);
const ERROR_BACKOFF: Duration = Duration::from_secs(5);

#[derive(Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
}

#[derive(Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

#[derive(Deserialize)]
pub struct Message {
    pub from: Option<User>,
    pub chat: Chat,
    pub text: Option<String>,
}

#[derive(Deserialize)]
pub struct User {
    pub id: i64,
}

#[derive(Deserialize)]
pub struct Chat {
    pub id: i64,
}

/// Thin Bot API client.
pub struct TelegramApi {
    client: reqwest::Client,
    api_base: String,
}

impl TelegramApi {
    pub fn new(token: &str) -> homemind_core::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| homemind_core::Error::Transport(e.to_string()))?;
        Ok(Self {
            client,
            api_base: format!("https://api.telegram.org/bot{token}"),
        })
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, payload: Value) -> Option<T> {
        let url = format!("{}/{method}", self.api_base);
        let response = match self.client.post(&url).json(&payload).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!("telegram {method} error: {e}");
                tokio::time::sleep(ERROR_BACKOFF).await;
                return None;
            }
        };
        if !response.status().is_success() {
            warn!("telegram {method} failed: HTTP {}", response.status());
            return None;
        }
        match response.json::<ApiResponse<T>>().await {
            Ok(body) if body.ok => body.result,
            Ok(_) => {
                warn!("telegram {method} returned ok=false");
                None
            }
            Err(e) => {
                warn!("telegram {method} parse error: {e}");
                None
            }
        }
    }

    /// Long-poll for updates past `offset`.
    pub async fn get_updates(&self, offset: i64) -> Vec<Update> {
        self.call(
            "getUpdates",
            json!({
                "offset": offset,
                "timeout": POLL_TIMEOUT_SECS,
                "allowed_updates": ["message"],
            }),
        )
        .await
        .unwrap_or_default()
    }

    /// Send a reply, chunked at the transport's message-size limit.
    pub async fn send_message(&self, chat_id: i64, text: &str) {
        for chunk in chunk_text(text, MAX_MESSAGE_LEN) {
            let sent: Option<Value> = self
                .call("sendMessage", json!({"chat_id": chat_id, "text": chunk}))
                .await;
            if sent.is_some() {
                debug!("sent reply chunk to chat {chat_id}");
            }
        }
    }

    /// Show the typing indicator while a turn is processed.
    pub async fn send_typing(&self, chat_id: i64) {
        let _: Option<Value> = self
            .call(
                "sendChatAction",
                json!({"chat_id": chat_id, "action": "typing"}),
            )
            .await;
    }

    /// Send a scheduler notification, if a destination is configured.
    pub async fn send_notification(&self, chat_id: Option<i64>, text: &str) {
        match chat_id {
            Some(chat_id) => {
                self.send_message(chat_id, text).await;
                info!("sent notification to {chat_id}");
            }
            None => warn!("no notification chat configured, dropping message"),
        }
    }
}

/// Split text into chunks of at most `max` characters, on char boundaries.
pub fn chunk_text(text: &str, max: usize) -> Vec<String> {
    if text.chars().count() <= max {
        return vec![text.to_string()];
    }
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(max)
        .map(|chunk| chunk.iter().collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_is_one_chunk() {
        assert_eq!(chunk_text("hello", 4096), vec!["hello".to_string()]);
    }

    #[test]
    fn test_long_text_is_chunked() {
        let text = "a".repeat(9000);
        let chunks = chunk_text(&text, 4096);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), 4096);
        assert_eq!(chunks[2].len(), 9000 - 2 * 4096);
    }

    #[test]
    fn test_chunking_respects_char_boundaries() {
        let text = "°".repeat(10);
        let chunks = chunk_text(&text, 4);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.chars().all(|ch| ch == '°')));
    }
}
