//! Telegram source: long-polls the Bot API for channel posts and messages.
//!
//! Only chats listed in the monitored set are forwarded. The bot must be a
//! member (or admin, for broadcast channels) of each monitored chat.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};

use crate::channels::{IngestionSource, MessageStream};
use crate::error::SourceError;
use crate::pipeline::types::{InboundMessage, UNKNOWN_SOURCE};

/// Public Bot API host.
pub const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Long-poll window passed to getUpdates.
const POLL_TIMEOUT_SECS: u64 = 30;

/// Bound on the startup `getMe` check.
const STARTUP_TIMEOUT: Duration = Duration::from_secs(15);

/// Pause after a failed poll.
const ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// Failed polls in a row before the source gives up.
const MAX_CONSECUTIVE_FAILURES: u32 = 10;

/// Bot API error codes that no amount of retrying will fix: revoked token,
/// bot removed, unknown bot, another poller or webhook holding the updates.
const FATAL_ERROR_CODES: [i64; 4] = [401, 403, 404, 409];

/// Telegram ingestion source.
pub struct TelegramSource {
    bot_token: SecretString,
    monitored: Vec<String>,
    api_base: String,
    client: reqwest::Client,
    shutdown: Arc<AtomicBool>,
}

impl TelegramSource {
    pub fn new(bot_token: SecretString, monitored: Vec<String>) -> Self {
        Self {
            bot_token,
            monitored,
            api_base: TELEGRAM_API_BASE.to_string(),
            client: reqwest::Client::new(),
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Point the source at a different Bot API host.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    fn api_url(&self, method: &str) -> String {
        api_url(&self.api_base, &self.bot_token, method)
    }

    /// Whether a chat, identified by username or numeric id, is monitored.
    pub fn is_monitored(&self, username: Option<&str>, chat_id: Option<i64>) -> bool {
        is_monitored(&self.monitored, username, chat_id)
    }
}

fn api_url(api_base: &str, bot_token: &SecretString, method: &str) -> String {
    format!("{api_base}/bot{}/{method}", bot_token.expose_secret())
}

// ── IngestionSource implementation ──────────────────────────────────

#[async_trait]
impl IngestionSource for TelegramSource {
    fn name(&self) -> &str {
        "telegram"
    }

    fn monitored(&self) -> Vec<String> {
        self.monitored.clone()
    }

    async fn start(&self) -> Result<MessageStream, SourceError> {
        // Fail fast on a bad token.
        let resp = self
            .client
            .get(self.api_url("getMe"))
            .timeout(STARTUP_TIMEOUT)
            .send()
            .await
            .map_err(|e| SourceError::StartupFailed {
                name: "telegram".into(),
                reason: e.without_url().to_string(),
            })?;
        if !resp.status().is_success() {
            return Err(SourceError::StartupFailed {
                name: "telegram".into(),
                reason: format!("getMe returned {}", resp.status()),
            });
        }

        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let api_base = self.api_base.clone();
        let bot_token = self.bot_token.clone();
        let monitored = self.monitored.clone();
        let client = self.client.clone();
        let shutdown = Arc::clone(&self.shutdown);

        tokio::spawn(async move {
            let mut offset: i64 = 0;
            let mut health = PollHealth::default();
            let url = api_url(&api_base, &bot_token, "getUpdates");

            tracing::info!(chats = monitored.len(), "Telegram source listening for messages...");

            while !shutdown.load(Ordering::SeqCst) {
                let body = serde_json::json!({
                    "offset": offset,
                    "timeout": POLL_TIMEOUT_SECS,
                    "allowed_updates": ["message", "channel_post"]
                });

                let reply = match client
                    .post(&url)
                    .json(&body)
                    .timeout(Duration::from_secs(POLL_TIMEOUT_SECS + 10))
                    .send()
                    .await
                {
                    // The Bot API answers errors with a JSON body too, so
                    // non-2xx replies are inspected rather than discarded.
                    Ok(resp) => match resp.json::<serde_json::Value>().await {
                        Ok(data) => inspect_reply(&data),
                        Err(e) => PollReply::Retry(format!("unreadable reply: {}", e.without_url())),
                    },
                    Err(e) => PollReply::Retry(e.without_url().to_string()),
                };

                let results = match reply {
                    PollReply::Updates(results) => {
                        health.record_success();
                        results
                    }
                    PollReply::Fatal(reason) => {
                        tracing::error!(reason = %reason, "Telegram getUpdates failed permanently");
                        let _ = tx.send(Err(disconnected(reason)));
                        return;
                    }
                    PollReply::Retry(reason) => {
                        tracing::warn!(reason = %reason, "Telegram poll failed");
                        if health.record_failure() {
                            let reason = format!(
                                "{} consecutive getUpdates failures, last: {reason}",
                                health.consecutive_failures
                            );
                            tracing::error!(reason = %reason, "Telegram source giving up");
                            let _ = tx.send(Err(disconnected(reason)));
                            return;
                        }
                        tokio::time::sleep(ERROR_BACKOFF).await;
                        continue;
                    }
                };

                for update in &results {
                    // Advance offset past this update
                    if let Some(uid) = update.get("update_id").and_then(serde_json::Value::as_i64) {
                        offset = uid + 1;
                    }

                    let Some(message) = parse_update(update, &monitored) else {
                        continue;
                    };

                    if tx.send(Ok(message)).is_err() {
                        tracing::info!("Telegram listener channel closed");
                        return;
                    }
                }
            }

            tracing::info!("Telegram source stopped polling");
        });

        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|msg| (msg, rx))
        });

        Ok(Box::pin(stream))
    }

    async fn shutdown(&self) -> Result<(), SourceError> {
        tracing::info!("Telegram source shutting down");
        self.shutdown.store(true, Ordering::SeqCst);
        Ok(())
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

fn disconnected(reason: String) -> SourceError {
    SourceError::Disconnected {
        name: "telegram".into(),
        reason,
    }
}

/// What one getUpdates reply means for the poll loop.
#[derive(Debug)]
enum PollReply {
    Updates(Vec<serde_json::Value>),
    Retry(String),
    Fatal(String),
}

fn inspect_reply(data: &serde_json::Value) -> PollReply {
    if data.get("ok").and_then(serde_json::Value::as_bool) == Some(false) {
        let description = data
            .get("description")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("unknown error");
        let code = data.get("error_code").and_then(serde_json::Value::as_i64);
        return match code {
            Some(code) if FATAL_ERROR_CODES.contains(&code) => {
                PollReply::Fatal(format!("getUpdates rejected: {description} ({code})"))
            }
            Some(code) => PollReply::Retry(format!("getUpdates rejected: {description} ({code})")),
            None => PollReply::Retry(format!("getUpdates rejected: {description}")),
        };
    }

    match data.get("result").and_then(serde_json::Value::as_array) {
        Some(results) => PollReply::Updates(results.clone()),
        None => PollReply::Retry("getUpdates reply had no result".to_string()),
    }
}

/// Tracks failed polls in a row.
#[derive(Debug, Default)]
struct PollHealth {
    consecutive_failures: u32,
}

impl PollHealth {
    /// Count a failure. True once the source should give up.
    fn record_failure(&mut self) -> bool {
        self.consecutive_failures += 1;
        self.consecutive_failures >= MAX_CONSECUTIVE_FAILURES
    }

    fn record_success(&mut self) {
        self.consecutive_failures = 0;
    }
}

/// Normalise a configured chat reference: trim, drop `@` and any
/// `t.me/` prefix, lowercase.
pub fn normalize_chat_ref(raw: &str) -> String {
    let trimmed = raw.trim();
    let trimmed = trimmed
        .strip_prefix("https://t.me/")
        .or_else(|| trimmed.strip_prefix("t.me/"))
        .unwrap_or(trimmed);
    trimmed.trim_start_matches('@').to_lowercase()
}

fn is_monitored(monitored: &[String], username: Option<&str>, chat_id: Option<i64>) -> bool {
    let username = username.map(normalize_chat_ref);
    let chat_id = chat_id.map(|id| id.to_string());
    monitored.iter().map(|m| normalize_chat_ref(m)).any(|m| {
        username.as_deref() == Some(m.as_str()) || chat_id.as_deref() == Some(m.as_str())
    })
}

/// Turn one getUpdates entry into an inbound message, if it is a text
/// post from a monitored chat.
fn parse_update(update: &serde_json::Value, monitored: &[String]) -> Option<InboundMessage> {
    let message = update
        .get("channel_post")
        .or_else(|| update.get("message"))?;

    let text = message
        .get("text")
        .or_else(|| message.get("caption"))
        .and_then(serde_json::Value::as_str)?;

    let chat = message.get("chat")?;
    let username = chat.get("username").and_then(serde_json::Value::as_str);
    let chat_id = chat.get("id").and_then(serde_json::Value::as_i64);

    if !is_monitored(monitored, username, chat_id) {
        tracing::debug!(
            chat = username.unwrap_or("unknown"),
            chat_id = chat_id.unwrap_or_default(),
            "Ignoring message from unmonitored chat"
        );
        return None;
    }

    let label = chat
        .get("title")
        .and_then(serde_json::Value::as_str)
        .filter(|t| !t.trim().is_empty())
        .map(String::from)
        .or_else(|| username.map(|u| format!("@{u}")))
        .unwrap_or_else(|| UNKNOWN_SOURCE.to_string());

    let received_at = message
        .get("date")
        .and_then(serde_json::Value::as_i64)
        .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0))
        .unwrap_or_else(Utc::now);

    Some(InboundMessage::new(label, text, received_at))
}

// ── Tests ───────────────────────────────────────────────────────────
