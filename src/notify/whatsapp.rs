//! Push-notification sink: WhatsApp messages through Twilio.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::error::DeliveryError;
use crate::notify::{Notifier, is_placeholder};

const TWILIO_API_BASE: &str = "https://api.twilio.com";

const SINK_NAME: &str = "whatsapp";

/// Twilio credentials and WhatsApp addressing.
#[derive(Debug, Clone)]
pub struct WhatsAppConfig {
    pub account_sid: String,
    pub auth_token: SecretString,
    pub from_number: String,
    pub to_number: String,
}

/// Delivers payloads via the Twilio Messages API (basic auth, 201 on success).
pub struct WhatsAppSink {
    config: WhatsAppConfig,
    api_base: String,
    client: reqwest::Client,
}

impl WhatsAppSink {
    pub fn new(config: WhatsAppConfig) -> Self {
        Self {
            config,
            api_base: TWILIO_API_BASE.to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Point the sink at a different Twilio-compatible host.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.api_base, self.config.account_sid
        )
    }
}

/// Twilio expects `whatsapp:+15550001111`; bare numbers get the prefix.
pub fn whatsapp_address(number: &str) -> String {
    let number = number.trim();
    if number.starts_with("whatsapp:") {
        number.to_string()
    } else {
        format!("whatsapp:{number}")
    }
}

#[async_trait]
impl Notifier for WhatsAppSink {
    fn name(&self) -> &str {
        SINK_NAME
    }

    fn missing_configuration(&self) -> Option<String> {
        let fields = [
            ("TWILIO_ACCOUNT_SID", self.config.account_sid.as_str()),
            ("TWILIO_AUTH_TOKEN", self.config.auth_token.expose_secret()),
            ("WHATSAPP_FROM_NUMBER", self.config.from_number.as_str()),
            ("WHATSAPP_TO_NUMBER", self.config.to_number.as_str()),
        ];
        let unset: Vec<&str> = fields
            .iter()
            .filter(|(_, value)| is_placeholder(value))
            .map(|(key, _)| *key)
            .collect();

        if unset.is_empty() {
            None
        } else {
            Some(format!("WhatsApp not configured ({})", unset.join(", ")))
        }
    }

    async fn send(&self, payload: &str) -> Result<(), DeliveryError> {
        let form = [
            ("From", whatsapp_address(&self.config.from_number)),
            ("To", whatsapp_address(&self.config.to_number)),
            ("Body", payload.to_string()),
        ];

        let resp = self
            .client
            .post(self.messages_url())
            .basic_auth(
                &self.config.account_sid,
                Some(self.config.auth_token.expose_secret()),
            )
            .form(&form)
            .send()
            .await
            .map_err(|e| DeliveryError::Request {
                sink: SINK_NAME.into(),
                reason: e.to_string(),
            })?;

        let status = resp.status();
        if status == reqwest::StatusCode::CREATED {
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

    fn config(sid: &str) -> WhatsAppConfig {
        WhatsAppConfig {
            account_sid: sid.to_string(),
            auth_token: SecretString::from("token"),
            from_number: "+14155238886".to_string(),
            to_number: "whatsapp:+15551234567".to_string(),
        }
    }

    #[test]
    fn whatsapp_messages_url() {
        let sink = WhatsAppSink::new(config("AC123"));
        assert_eq!(
            sink.messages_url(),
            "https://api.twilio.com/2010-04-01/Accounts/AC123/Messages.json"
        );
    }

    #[test]
    fn whatsapp_address_prefix() {
        assert_eq!(whatsapp_address("+14155238886"), "whatsapp:+14155238886");
        assert_eq!(whatsapp_address(" whatsapp:+1555 "), "whatsapp:+1555");
    }

    #[test]
    fn whatsapp_ready_with_real_credentials() {
        assert!(WhatsAppSink::new(config("AC123")).missing_configuration().is_none());
    }

    #[test]
    fn whatsapp_placeholder_sid_skips() {
        let reason = WhatsAppSink::new(config("YOUR_TWILIO_SID"))
            .missing_configuration()
            .unwrap();
        assert!(reason.contains("TWILIO_ACCOUNT_SID"));
    }

    #[test]
    fn whatsapp_lists_every_unset_field() {
        let sink = WhatsAppSink::new(WhatsAppConfig {
            account_sid: String::new(),
            auth_token: SecretString::from(""),
            from_number: "+1".into(),
            to_number: String::new(),
        });
        let reason = sink.missing_configuration().unwrap();
        assert!(reason.contains("TWILIO_ACCOUNT_SID"));
        assert!(reason.contains("TWILIO_AUTH_TOKEN"));
        assert!(reason.contains("WHATSAPP_TO_NUMBER"));
        assert!(!reason.contains("WHATSAPP_FROM_NUMBER"));
    }
}
