//! Notification sinks and the fan-out set that drives them.
//!
//! Each sink is toggled independently. A disabled sink is never called; a
//! sink with unset or placeholder credentials is reported as skipped without
//! a network call; a failing sink never blocks the others.

pub mod telegram;
pub mod webhook;
pub mod whatsapp;

pub use telegram::TelegramArchiveSink;
pub use webhook::WebhookSink;
pub use whatsapp::WhatsAppSink;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::DeliveryError;

/// Default bound on a single sink send.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(30);

/// A delivery target for accepted payloads and lifecycle notices.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Sink name used in logs and delivery results.
    fn name(&self) -> &str;

    /// Why the sink cannot send, when its credentials or address are unset
    /// or still placeholders. `None` means ready.
    fn missing_configuration(&self) -> Option<String> {
        None
    }

    /// Deliver one text payload.
    async fn send(&self, payload: &str) -> Result<(), DeliveryError>;
}

/// Whether a configured value is absent or an unfilled template value.
pub fn is_placeholder(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.is_empty()
        || trimmed.to_ascii_uppercase().starts_with("YOUR_")
        || (trimmed.starts_with('<') && trimmed.ends_with('>'))
}

// ── Delivery result ─────────────────────────────────────────────────

/// Outcome of one send attempt on one sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryResult {
    pub sink_name: String,
    pub success: bool,
    /// The sink was not attempted because it is not configured.
    pub skipped: bool,
    pub error_detail: Option<String>,
}

impl DeliveryResult {
    pub fn delivered(sink_name: impl Into<String>) -> Self {
        Self {
            sink_name: sink_name.into(),
            success: true,
            skipped: false,
            error_detail: None,
        }
    }

    pub fn skipped(sink_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            sink_name: sink_name.into(),
            success: false,
            skipped: true,
            error_detail: Some(reason.into()),
        }
    }

    pub fn failed(sink_name: impl Into<String>, error: &DeliveryError) -> Self {
        Self {
            sink_name: sink_name.into(),
            success: false,
            skipped: false,
            error_detail: Some(error.to_string()),
        }
    }

    /// An attempt was made and it failed.
    pub fn is_failure(&self) -> bool {
        !self.success && !self.skipped
    }
}

// ── Lifecycle events ────────────────────────────────────────────────

/// Operator-facing notices sent outside the per-message flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    Started { sources: Vec<String> },
    Stopped { reason: String },
    Crashed { reason: String },
    ClassificationFailed { source_label: String, detail: String },
    DeliveryFailed { source_label: String, failed: Vec<String> },
}

impl LifecycleEvent {
    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Started { .. } => "started",
            Self::Stopped { .. } => "stopped",
            Self::Crashed { .. } => "crashed",
            Self::ClassificationFailed { .. } => "classification_failed",
            Self::DeliveryFailed { .. } => "delivery_failed",
        }
    }

    /// Text sent to the sinks.
    pub fn render(&self) -> String {
        match self {
            Self::Started { sources } if sources.is_empty() => {
                "🚦 Signal Relay has started and is now monitoring your channels.".to_string()
            }
            Self::Started { sources } => format!(
                "🚦 Signal Relay has started and is now monitoring {} channel(s): {}",
                sources.len(),
                sources.join(", ")
            ),
            Self::Stopped { reason } => format!("🛑 Signal Relay has been stopped: {reason}."),
            Self::Crashed { reason } => format!("❌ Signal Relay crashed with error: {reason}"),
            Self::ClassificationFailed {
                source_label,
                detail,
            } => format!(
                "⚠️ Could not classify a message from {source_label}: {detail}. The message was skipped."
            ),
            Self::DeliveryFailed {
                source_label,
                failed,
            } => format!(
                "⚠️ A signal from {source_label} could not be delivered to: {}",
                failed.join(", ")
            ),
        }
    }
}

// ── Notifier set ────────────────────────────────────────────────────

struct RegisteredSink {
    notifier: Arc<dyn Notifier>,
    enabled: bool,
}

/// Independently toggled sinks with concurrent, isolated fan-out.
pub struct NotifierSet {
    sinks: Vec<RegisteredSink>,
    send_timeout: Duration,
}

impl Default for NotifierSet {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifierSet {
    pub fn new() -> Self {
        Self {
            sinks: Vec::new(),
            send_timeout: DEFAULT_SEND_TIMEOUT,
        }
    }

    pub fn with_send_timeout(mut self, send_timeout: Duration) -> Self {
        self.send_timeout = send_timeout;
        self
    }

    /// Add a sink. Disabled sinks are kept only so startup logs can list them.
    pub fn register(&mut self, notifier: Arc<dyn Notifier>, enabled: bool) {
        info!(
            sink = notifier.name(),
            enabled,
            "Registered notification sink"
        );
        self.sinks.push(RegisteredSink { notifier, enabled });
    }

    pub fn with_sink(mut self, notifier: Arc<dyn Notifier>, enabled: bool) -> Self {
        self.register(notifier, enabled);
        self
    }

    /// Names of enabled sinks, in registration order.
    pub fn enabled_names(&self) -> Vec<&str> {
        self.sinks
            .iter()
            .filter(|s| s.enabled)
            .map(|s| s.notifier.name())
            .collect()
    }

    pub fn has_enabled(&self) -> bool {
        self.sinks.iter().any(|s| s.enabled)
    }

    /// Fan a payload out to every enabled sink.
    pub async fn deliver(&self, payload: &str) -> Vec<DeliveryResult> {
        self.fan_out(payload, |_| true).await
    }

    /// Send a lifecycle notice to every enabled sink.
    pub async fn announce(&self, event: &LifecycleEvent) -> Vec<DeliveryResult> {
        self.announce_via(event, |_| true).await
    }

    /// Send a lifecycle notice to the enabled sinks `include` accepts.
    pub async fn announce_via(
        &self,
        event: &LifecycleEvent,
        include: impl Fn(&str) -> bool,
    ) -> Vec<DeliveryResult> {
        info!(event = event.label(), "Announcing lifecycle event");
        self.fan_out(&event.render(), include).await
    }

    async fn fan_out(&self, text: &str, include: impl Fn(&str) -> bool) -> Vec<DeliveryResult> {
        let text: Arc<str> = Arc::from(text);
        let mut pending = Vec::new();

        for sink in self.sinks.iter().filter(|s| s.enabled) {
            let name = sink.notifier.name().to_string();
            if !include(&name) {
                continue;
            }

            if let Some(reason) = sink.notifier.missing_configuration() {
                info!(sink = %name, reason = %reason, "Sink not configured - skipping");
                pending.push(Pending::Ready(DeliveryResult::skipped(name, reason)));
                continue;
            }

            let notifier = Arc::clone(&sink.notifier);
            let text = Arc::clone(&text);
            let send_timeout = self.send_timeout;
            let handle = tokio::spawn(async move {
                match tokio::time::timeout(send_timeout, notifier.send(&text)).await {
                    Ok(result) => result,
                    Err(_) => Err(DeliveryError::Timeout {
                        sink: notifier.name().to_string(),
                        after: send_timeout,
                    }),
                }
            });
            pending.push(Pending::Running { name, handle });
        }

        let mut results = Vec::with_capacity(pending.len());
        for item in pending {
            let result = match item {
                Pending::Ready(result) => result,
                Pending::Running { name, handle } => match handle.await {
                    Ok(Ok(())) => {
                        info!(sink = %name, "Delivered");
                        DeliveryResult::delivered(name)
                    }
                    Ok(Err(e)) => {
                        warn!(sink = %name, error = %e, "Delivery failed");
                        DeliveryResult::failed(name, &e)
                    }
                    Err(join_err) => {
                        let e = DeliveryError::Panicked {
                            sink: name.clone(),
                            reason: join_err.to_string(),
                        };
                        warn!(sink = %name, error = %e, "Delivery task aborted");
                        DeliveryResult::failed(name, &e)
                    }
                },
            };
            results.push(result);
        }
        results
    }
}

enum Pending {
    Ready(DeliveryResult),
    Running {
        name: String,
        handle: tokio::task::JoinHandle<Result<(), DeliveryError>>,
    },
}
