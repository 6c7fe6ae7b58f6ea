//! Self-archive sink: posts into the operator's own Telegram chat.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::channels::telegram::TELEGRAM_API_BASE;
use crate::error::DeliveryError;
use crate::notify::{Notifier, is_placeholder};

/// Maximum message length for Telegram's sendMessage API.
const TELEGRAM_MAX_MESSAGE_LENGTH: usize = 4096;

const SINK_NAME: &str = "telegram";

/// Sends payloads to the operator chat through the Bot API.
pub struct TelegramArchiveSink {
    bot_token: SecretString,
    chat_id: Option<String>,
    api_base: String,
    client: reqwest::Client,
}

impl TelegramArchiveSink {
    pub fn new(bot_token: SecretString, chat_id: Option<String>) -> Self {
        Self {
            bot_token,
            chat_id,
            api_base: TELEGRAM_API_BASE.to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Point the sink at a different Bot API host.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    fn api_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{method}",
            self.api_base,
            self.bot_token.expose_secret()
        )
    }

    async fn send_chunk(&self, chat_id: &str, text: &str) -> Result<(), DeliveryError> {
        let body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
            "disable_web_page_preview": true,
        });

        let resp = self
            .client
            .post(self.api_url("sendMessage"))
            .json(&body)
            .send()
            .await
            .map_err(|e| DeliveryError::Request {
                sink: SINK_NAME.into(),
                // reqwest includes the URL, which carries the token
                reason: e.without_url().to_string(),
            })?;

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }

        let body: serde_json::Value = resp.json().await.unwrap_or_default();
        let description = body
            .get("description")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("no description")
            .to_string();
        Err(DeliveryError::Status {
            sink: SINK_NAME.into(),
            status: status.as_u16(),
            body: description,
        })
    }
}

#[async_trait]
impl Notifier for TelegramArchiveSink {
    fn name(&self) -> &str {
        SINK_NAME
    }

    fn missing_configuration(&self) -> Option<String> {
        if is_placeholder(self.bot_token.expose_secret()) {
            return Some("TELEGRAM_BOT_TOKEN is not set".to_string());
        }
        match self.chat_id.as_deref() {
            Some(id) if !is_placeholder(id) => None,
            _ => Some("TELEGRAM_ARCHIVE_CHAT_ID is not set".to_string()),
        }
    }

    async fn send(&self, payload: &str) -> Result<(), DeliveryError> {
        let chat_id = self
            .chat_id
            .as_deref()
            .ok_or_else(|| DeliveryError::NotConfigured {
                sink: SINK_NAME.into(),
                reason: "no archive chat id".into(),
            })?;

        for chunk in split_message(payload, TELEGRAM_MAX_MESSAGE_LENGTH) {
            self.send_chunk(chat_id, &chunk).await?;
        }
        Ok(())
    }
}

/// Split a message into chunks that fit Telegram's character limit.
/// Tries to split on newlines, then spaces, then hard-cuts.
fn split_message(text: &str, max_chars: usize) -> Vec<String> {
    if text.chars().count() <= max_chars {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        if remaining.chars().count() <= max_chars {
            chunks.push(remaining.to_string());
            break;
        }

        // Byte offset of the char limit, so slicing stays on a boundary
        let limit = remaining
            .char_indices()
            .nth(max_chars)
            .map(|(i, _)| i)
            .unwrap_or(remaining.len());
        let window = &remaining[..limit];
        let split_at = window
            .rfind('\n')
            .or_else(|| window.rfind(' '))
            .filter(|&i| i > 0)
            .unwrap_or(limit);

        chunks.push(remaining[..split_at].to_string());
        remaining = remaining[split_at..].trim_start();
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sink(token: &str, chat: Option<&str>) -> TelegramArchiveSink {
        TelegramArchiveSink::new(SecretString::from(token), chat.map(String::from))
    }

    #[test]
    fn archive_api_url() {
        let s = sink("123:ABC", Some("42"));
        assert_eq!(
            s.api_url("sendMessage"),
            "https://api.telegram.org/bot123:ABC/sendMessage"
        );
    }

    #[test]
    fn archive_api_base_override() {
        let s = sink("t", Some("42")).with_api_base("http://127.0.0.1:8081/");
        assert_eq!(s.api_url("getMe"), "http://127.0.0.1:8081/bott/getMe");
    }

    #[test]
    fn archive_ready_when_token_and_chat_set() {
        assert!(sink("123:ABC", Some("42")).missing_configuration().is_none());
    }

    #[test]
    fn archive_skipped_without_chat_id() {
        let reason = sink("123:ABC", None).missing_configuration().unwrap();
        assert!(reason.contains("TELEGRAM_ARCHIVE_CHAT_ID"));
    }

    #[test]
    fn archive_skipped_with_placeholder_token() {
        let reason = sink("YOUR_BOT_TOKEN", Some("42")).missing_configuration().unwrap();
        assert!(reason.contains("TELEGRAM_BOT_TOKEN"));
    }

    // ── Message splitting ───────────────────────────────────────────

    #[test]
    fn split_message_short() {
        assert_eq!(split_message("hello", 10), vec!["hello"]);
    }

    #[test]
    fn split_message_exact_limit() {
        let text = "a".repeat(10);
        assert_eq!(split_message(&text, 10), vec![text.clone()]);
    }

    #[test]
    fn split_message_over_limit_on_newline() {
        let chunks = split_message("first line\nsecond line", 15);
        assert_eq!(chunks, vec!["first line", "second line"]);
    }

    #[test]
    fn split_message_over_limit_on_space() {
        let chunks = split_message("alpha beta gamma", 11);
        assert_eq!(chunks, vec!["alpha beta", "gamma"]);
    }

    #[test]
    fn split_message_no_good_split_point() {
        let chunks = split_message(&"x".repeat(25), 10);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), 10);
        assert_eq!(chunks[2].len(), 5);
    }

    #[test]
    fn split_message_counts_chars_not_bytes() {
        let text = "🚨".repeat(12);
        let chunks = split_message(&text, 5);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.chars().count() <= 5));
    }
}
