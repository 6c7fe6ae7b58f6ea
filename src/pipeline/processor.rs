//! Pipeline: classifies inbound messages and fans signals out to sinks.
//!
//! Flow per message (one pass, no retries, no queue):
//! 1. Classifier → `Rejected` ends here
//! 2. Provenance (source label, receive time) appended to the payload
//! 3. `NotifierSet::deliver` to every enabled sink
//!
//! A classification failure skips the message and is surfaced through the
//! notifier side channel instead of being treated as noise.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::notify::{DeliveryResult, LifecycleEvent, NotifierSet};
use crate::pipeline::classifier::Classifier;
use crate::pipeline::signal::SignalSummary;
use crate::pipeline::types::{HandleOutcome, InboundMessage, Verdict};

/// Timestamp format used in the provenance footer.
pub const RECEIVED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

/// Pipeline behaviour switches.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Surface classification and delivery failures to the operator.
    pub announce_errors: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            announce_errors: true,
        }
    }
}

/// Classification and delivery pipeline.
pub struct Pipeline {
    classifier: Classifier,
    notifiers: Arc<NotifierSet>,
    options: PipelineOptions,
}

impl Pipeline {
    pub fn new(classifier: Classifier, notifiers: Arc<NotifierSet>, options: PipelineOptions) -> Self {
        Self {
            classifier,
            notifiers,
            options,
        }
    }

    pub fn notifiers(&self) -> &Arc<NotifierSet> {
        &self.notifiers
    }

    /// Handle one inbound message. Never fails; every error becomes an outcome.
    pub async fn handle(&self, message: InboundMessage) -> HandleOutcome {
        info!(
            id = %message.id,
            source = %message.source_label,
            preview = %message.preview(),
            "New message"
        );

        let verdict = match self
            .classifier
            .classify(&message.text, &message.source_label)
            .await
        {
            Ok(verdict) => verdict,
            Err(e) => {
                warn!(
                    id = %message.id,
                    source = %message.source_label,
                    error = %e,
                    "Classification failed - message skipped"
                );
                if self.options.announce_errors {
                    self.notifiers
                        .announce(&LifecycleEvent::ClassificationFailed {
                            source_label: message.source_label.clone(),
                            detail: e.to_string(),
                        })
                        .await;
                }
                return HandleOutcome::Skipped {
                    reason: e.to_string(),
                };
            }
        };

        let formatted_payload = match verdict {
            Verdict::Rejected => {
                info!(id = %message.id, source = %message.source_label, "Filtered out (not a valid signal)");
                return HandleOutcome::Rejected;
            }
            Verdict::Accepted { formatted_payload } => formatted_payload,
        };

        let summary = SignalSummary::parse(&formatted_payload);
        if summary.is_complete() {
            debug!(
                id = %message.id,
                pair = summary.pair.as_deref().unwrap_or_default(),
                direction = ?summary.direction,
                take_profits = summary.take_profits.len(),
                "Signal fields recovered"
            );
        } else {
            warn!(
                id = %message.id,
                missing = ?summary.missing_fields(),
                "Accepted payload is missing signal fields; forwarding as-is"
            );
        }

        let payload = with_provenance(&formatted_payload, &message);
        let results = self.notifiers.deliver(&payload).await;
        self.report_delivery(&message, &results).await;

        HandleOutcome::Delivered { payload, results }
    }

    async fn report_delivery(&self, message: &InboundMessage, results: &[DeliveryResult]) {
        let delivered = results.iter().filter(|r| r.success).count();
        let failed: Vec<String> = results
            .iter()
            .filter(|r| r.is_failure())
            .map(|r| r.sink_name.clone())
            .collect();

        info!(
            id = %message.id,
            source = %message.source_label,
            delivered,
            failed = failed.len(),
            skipped = results.iter().filter(|r| r.skipped).count(),
            "Signal forwarded"
        );

        if results.is_empty() {
            warn!(id = %message.id, "No notification sink is enabled; signal was not delivered anywhere");
        }

        if failed.is_empty() || !self.options.announce_errors {
            return;
        }

        // Only sinks that just worked are told about the ones that did not.
        let succeeded: Vec<&str> = results
            .iter()
            .filter(|r| r.success)
            .map(|r| r.sink_name.as_str())
            .collect();
        if succeeded.is_empty() {
            return;
        }
        self.notifiers
            .announce_via(
                &LifecycleEvent::DeliveryFailed {
                    source_label: message.source_label.clone(),
                    failed,
                },
                |name| succeeded.iter().any(|s| *s == name),
            )
            .await;
    }
}

/// Append the source label and receive time so every sink gets a
/// self-describing message.
pub fn with_provenance(payload: &str, message: &InboundMessage) -> String {
    format!(
        "{payload}\n\n📊 Source: {}\n⏰ Time: {}",
        message.source_label,
        message.received_at.format(RECEIVED_AT_FORMAT)
    )
}
