//! Shared types for the classification pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::notify::DeliveryResult;

// ── Inbound message ─────────────────────────────────────────────────

/// One message event delivered by an ingestion source.
///
/// Sources normalise their native format into this struct before it enters
/// the pipeline; `source_label` is always a display string, never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Generated id, used to correlate log lines for one message.
    pub id: String,
    /// Display name of the originating chat or channel.
    pub source_label: String,
    /// Message body.
    pub text: String,
    /// When the source received the message.
    pub received_at: DateTime<Utc>,
}

impl InboundMessage {
    pub fn new(
        source_label: impl Into<String>,
        text: impl Into<String>,
        received_at: DateTime<Utc>,
    ) -> Self {
        let source_label = source_label.into();
        let source_label = if source_label.trim().is_empty() {
            UNKNOWN_SOURCE.to_string()
        } else {
            source_label
        };
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            source_label,
            text: text.into(),
            received_at,
        }
    }

    /// First 100 characters of the text, for logs.
    pub fn preview(&self) -> String {
        preview(&self.text, 100)
    }
}

/// Label used when a source cannot name the chat a message came from.
pub const UNKNOWN_SOURCE: &str = "Unknown Channel";

pub(crate) fn preview(text: &str, max_chars: usize) -> String {
    let mut out: String = text.chars().take(max_chars).collect();
    if text.chars().count() > max_chars {
        out.push('…');
    }
    out
}

// ── Verdict ─────────────────────────────────────────────────────────

/// Classifier decision for one message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    /// Noise: promotion, chatter, incomplete signal.
    Rejected,
    /// A signal, with the model's formatted rendering of it.
    Accepted { formatted_payload: String },
}

impl Verdict {
    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Rejected => "rejected",
            Self::Accepted { .. } => "accepted",
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }
}

// ── Outcome ─────────────────────────────────────────────────────────

/// Terminal state of one pass through the pipeline.
#[derive(Debug, Clone)]
pub enum HandleOutcome {
    /// Classified as noise; no sink was touched.
    Rejected,
    /// Classified as a signal and fanned out.
    Delivered {
        payload: String,
        results: Vec<DeliveryResult>,
    },
    /// Could not be classified; the message was dropped.
    Skipped { reason: String },
}

impl HandleOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Rejected => "rejected",
            Self::Delivered { .. } => "delivered",
            Self::Skipped { .. } => "skipped",
        }
    }

    /// Delivery results, empty unless the message was accepted.
    pub fn results(&self) -> &[DeliveryResult] {
        match self {
            Self::Delivered { results, .. } => results,
            _ => &[],
        }
    }
}
