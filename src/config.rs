//! Configuration types.
//!
//! Everything is read once at startup from the environment (after loading
//! an optional `.env`) into an immutable `RelayConfig`. Missing or invalid
//! required settings are fatal.

use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::llm::LlmConfig;
use crate::notify::whatsapp::WhatsAppConfig;
use crate::pipeline::classifier::{ClassifierConfig, DEFAULT_TIMEOUT};

const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_TEMPERATURE: f32 = 0.2;

/// Which ingestion source to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Telegram,
    Cli,
}

/// Telegram bot settings shared by the source and the archive sink.
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: SecretString,
    /// Chat usernames or numeric ids to listen to.
    pub monitored: Vec<String>,
    /// Operator chat that receives the self-archive copy.
    pub archive_chat_id: Option<String>,
}

/// Per-sink toggles and addressing.
#[derive(Debug, Clone)]
pub struct SinkConfig {
    pub telegram_enabled: bool,
    pub whatsapp_enabled: bool,
    pub whatsapp: WhatsAppConfig,
    pub webhook_enabled: bool,
    pub webhook_url: Option<String>,
}

/// Complete relay configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub source: SourceKind,
    pub llm: LlmConfig,
    pub classifier: ClassifierConfig,
    pub telegram: TelegramConfig,
    pub sinks: SinkConfig,
    /// Surface runtime failures through the notifier side channel.
    pub announce_errors: bool,
    /// Directory for rolling log files, if file logging is wanted.
    pub log_dir: Option<String>,
}

impl RelayConfig {
    /// Build config from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from any key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let source = match get("RELAY_SOURCE").as_deref().map(str::to_ascii_lowercase) {
            None => SourceKind::Telegram,
            Some(s) if s == "telegram" => SourceKind::Telegram,
            Some(s) if s == "cli" => SourceKind::Cli,
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    key: "RELAY_SOURCE".into(),
                    message: format!("expected `telegram` or `cli`, got `{other}`"),
                });
            }
        };

        // ── Model ───────────────────────────────────────────────────
        let api_key = get("OPENAI_API_KEY").ok_or_else(|| ConfigError::MissingRequired {
            key: "OPENAI_API_KEY".into(),
            hint: "Create one at https://platform.openai.com/api-keys".into(),
        })?;
        let model = get("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let temperature = match get("AI_TEMPERATURE") {
            None => DEFAULT_TEMPERATURE,
            Some(raw) => parse_temperature(&raw)?,
        };

        let timeout = match get("CLASSIFIER_TIMEOUT_SECS") {
            None => DEFAULT_TIMEOUT,
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: "CLASSIFIER_TIMEOUT_SECS".into(),
                        message: format!("expected a positive number of seconds, got `{raw}`"),
                    });
                }
            },
        };

        let max_tokens = match get("CLASSIFIER_MAX_TOKENS") {
            None => None,
            Some(raw) => match raw.parse::<u32>() {
                Ok(n) if n > 0 => Some(n),
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: "CLASSIFIER_MAX_TOKENS".into(),
                        message: format!("expected a positive token count, got `{raw}`"),
                    });
                }
            },
        };

        // ── Sinks ───────────────────────────────────────────────────
        let telegram_enabled = parse_flag(&get, "SEND_TO_TELEGRAM", false)?;
        let whatsapp_enabled = parse_flag(&get, "SEND_TO_WHATSAPP", false)?;
        let webhook_enabled = parse_flag(&get, "SEND_TO_WEBHOOK", false)?;
        let announce_errors = parse_flag(&get, "RELAY_ANNOUNCE_ERRORS", true)?;

        // ── Telegram ────────────────────────────────────────────────
        let bot_token = get("TELEGRAM_BOT_TOKEN");
        if bot_token.is_none() && (source == SourceKind::Telegram || telegram_enabled) {
            return Err(ConfigError::MissingRequired {
                key: "TELEGRAM_BOT_TOKEN".into(),
                hint: "Create a bot with @BotFather and add it to the monitored channels".into(),
            });
        }

        let monitored: Vec<String> = get("CHANNELS_TO_MONITOR")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if monitored.is_empty() && source == SourceKind::Telegram {
            return Err(ConfigError::MissingRequired {
                key: "CHANNELS_TO_MONITOR".into(),
                hint: "Comma-separated channel usernames or ids, e.g. `fxroom,goldsignals`".into(),
            });
        }

        Ok(Self {
            source,
            llm: LlmConfig {
                api_key: SecretString::from(api_key),
                model,
            },
            classifier: ClassifierConfig {
                temperature,
                timeout,
                max_tokens,
            },
            telegram: TelegramConfig {
                bot_token: SecretString::from(bot_token.unwrap_or_default()),
                monitored,
                archive_chat_id: get("TELEGRAM_ARCHIVE_CHAT_ID"),
            },
            sinks: SinkConfig {
                telegram_enabled,
                whatsapp_enabled,
                whatsapp: WhatsAppConfig {
                    account_sid: get("TWILIO_ACCOUNT_SID").unwrap_or_default(),
                    auth_token: SecretString::from(get("TWILIO_AUTH_TOKEN").unwrap_or_default()),
                    from_number: get("WHATSAPP_FROM_NUMBER").unwrap_or_default(),
                    to_number: get("WHATSAPP_TO_NUMBER").unwrap_or_default(),
                },
                webhook_enabled,
                webhook_url: get("WEBHOOK_URL"),
            },
            announce_errors,
            log_dir: get("RELAY_LOG_DIR"),
        })
    }

    /// Human-readable startup summary. Never includes secrets.
    pub fn summary(&self) -> Vec<String> {
        let on_off = |b: bool| if b { "enabled" } else { "disabled" };
        let mut lines = vec![
            format!("Model: {} (temperature {})", self.llm.model, self.classifier.temperature),
            format!("Classifier timeout: {}s", self.classifier.timeout.as_secs()),
        ];
        match self.source {
            SourceKind::Telegram => lines.push(format!(
                "Monitoring {} channel(s): {}",
                self.telegram.monitored.len(),
                self.telegram.monitored.join(", ")
            )),
            SourceKind::Cli => lines.push("Source: stdin".to_string()),
        }
        lines.push(format!("Telegram archive: {}", on_off(self.sinks.telegram_enabled)));
        lines.push(format!("WhatsApp: {}", on_off(self.sinks.whatsapp_enabled)));
        lines.push(format!("Webhook: {}", on_off(self.sinks.webhook_enabled)));
        lines
    }
}

fn parse_temperature(raw: &str) -> Result<f32, ConfigError> {
    match raw.parse::<f32>() {
        Ok(t) if (0.0..=2.0).contains(&t) => Ok(t),
        _ => Err(ConfigError::InvalidValue {
            key: "AI_TEMPERATURE".into(),
            message: format!("expected a number between 0.0 and 2.0, got `{raw}`"),
        }),
    }
}

fn parse_flag(
    get: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: bool,
) -> Result<bool, ConfigError> {
    let Some(raw) = get(key) else {
        return Ok(default);
    };
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected true or false, got `{raw}`"),
        }),
    }
}
