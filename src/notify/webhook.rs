//! Automation webhook sink: forwards payloads as JSON.

use async_trait::async_trait;
use chrono::Utc;

use crate::error::DeliveryError;
use crate::notify::{Notifier, is_placeholder};
use crate::pipeline::signal::SignalSummary;

const SINK_NAME: &str = "webhook";

/// POSTs `{"message", "signal", "sent_at"}` to an automation endpoint.
pub struct WebhookSink {
    url: Option<String>,
    client: reqwest::Client,
}

impl WebhookSink {
    pub fn new(url: Option<String>) -> Self {
        Self {
            url,
            client: reqwest::Client::new(),
        }
    }
}

/// Build the JSON body. `signal` is null unless the payload names a pair.
pub fn webhook_body(payload: &str) -> serde_json::Value {
    let summary = SignalSummary::parse(payload);
    let signal = if summary.pair.is_some() {
        serde_json::to_value(&summary).unwrap_or(serde_json::Value::Null)
    } else {
        serde_json::Value::Null
    };
    serde_json::json!({
        "message": payload,
        "signal": signal,
        "sent_at": Utc::now().to_rfc3339(),
    })
}

#[async_trait]
impl Notifier for WebhookSink {
    fn name(&self) -> &str {
        SINK_NAME
    }

    fn missing_configuration(&self) -> Option<String> {
        match self.url.as_deref() {
            Some(url) if !is_placeholder(url) => None,
            _ => Some("WEBHOOK_URL is not set".to_string()),
        }
    }

    async fn send(&self, payload: &str) -> Result<(), DeliveryError> {
        let url = self
            .url
            .as_deref()
            .ok_or_else(|| DeliveryError::NotConfigured {
                sink: SINK_NAME.into(),
                reason: "no webhook url".into(),
            })?;

        let resp = self
            .client
            .post(url)
            .json(&webhook_body(payload))
            .send()
            .await
            .map_err(|e| DeliveryError::Request {
                sink: SINK_NAME.into(),
                reason: e.to_string(),
            })?;

        let status = resp.status();
        tracing::debug!(status = status.as_u16(), "Webhook responded");
        if status.is_success() {
            return Ok(());
        }

        let body = resp.text().await.unwrap_or_default();
        Err(DeliveryError::Status {
            sink: SINK_NAME.into(),
            status: status.as_u16(),
            body: body.chars().take(300).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn webhook_body_includes_signal_fields() {
        let body = webhook_body("Pair: XAU/USD\nAction: BUY\nEntry: 2330\nSL: 2325\nTPs: TP1 2340");
        assert!(body["message"].as_str().unwrap().starts_with("Pair: XAU/USD"));
        assert_eq!(body["signal"]["pair"], "XAU/USD");
        assert_eq!(body["signal"]["direction"], "BUY");
        assert!(body["sent_at"].is_string());
    }

    #[test]
    fn webhook_body_signal_null_for_notices() {
        let body = webhook_body("🚦 Signal Relay has started");
        assert!(body["signal"].is_null());
    }

    #[test]
    fn webhook_skipped_without_url() {
        assert!(WebhookSink::new(None).missing_configuration().is_some());
        assert!(WebhookSink::new(Some("  ".into())).missing_configuration().is_some());
        assert!(
            WebhookSink::new(Some("https://hooks.example.com/x".into()))
                .missing_configuration()
                .is_none()
        );
    }
}
