//! Ingestion source abstraction.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::error::SourceError;
use crate::pipeline::types::InboundMessage;

/// Stream of normalised inbound messages.
///
/// An `Err` item means the source lost its connection for good; nothing
/// follows it.
pub type MessageStream = Pin<Box<dyn Stream<Item = Result<InboundMessage, SourceError>> + Send>>;

/// Delivers inbound messages to the relay. Pure I/O; no classification.
///
/// Implementations normalise every event to an `InboundMessage` with a
/// non-empty `source_label` and decide which origins to listen to from
/// their own configuration.
#[async_trait]
pub trait IngestionSource: Send + Sync {
    /// Source name (e.g. "telegram", "cli").
    fn name(&self) -> &str;

    /// Labels of the origins being monitored, for the startup notice.
    fn monitored(&self) -> Vec<String> {
        Vec::new()
    }

    /// Start listening. The stream ends when the source runs dry and
    /// yields a `SourceError` when it disconnects.
    async fn start(&self) -> Result<MessageStream, SourceError>;

    /// Stop listening.
    async fn shutdown(&self) -> Result<(), SourceError> {
        Ok(())
    }
}
