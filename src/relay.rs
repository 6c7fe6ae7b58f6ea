//! Relay: ties one ingestion source to the pipeline.
//!
//! Announces startup, dispatches each inbound message to its own task, and
//! announces shutdown (or a crash) to the operator.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::task::JoinSet;

use crate::channels::{CliSource, IngestionSource, TelegramSource};
use crate::config::{RelayConfig, SourceKind};
use crate::error::{self, SourceError};
use crate::llm::create_provider;
use crate::notify::{
    LifecycleEvent, NotifierSet, TelegramArchiveSink, WebhookSink, WhatsAppSink,
};
use crate::pipeline::{Classifier, Pipeline, PipelineOptions};

/// Upper bound on shutdown work (in-flight messages, stop notice).
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Why the relay is winding down.
enum Exit {
    Stopped(&'static str),
    Crashed(SourceError),
}

/// Long-running relay process.
pub struct Relay {
    source: Arc<dyn IngestionSource>,
    pipeline: Arc<Pipeline>,
    grace: Duration,
}

impl Relay {
    pub fn new(source: Arc<dyn IngestionSource>, pipeline: Arc<Pipeline>) -> Self {
        Self {
            source,
            pipeline,
            grace: SHUTDOWN_GRACE,
        }
    }

    /// Wire the classifier, sinks and source described by `config`.
    pub fn from_config(config: &RelayConfig) -> error::Result<Self> {
        let llm = create_provider(&config.llm)?;
        let classifier = Classifier::new(llm, config.classifier.clone());

        let notifiers = NotifierSet::new()
            .with_sink(
                Arc::new(TelegramArchiveSink::new(
                    config.telegram.bot_token.clone(),
                    config.telegram.archive_chat_id.clone(),
                )),
                config.sinks.telegram_enabled,
            )
            .with_sink(
                Arc::new(WhatsAppSink::new(config.sinks.whatsapp.clone())),
                config.sinks.whatsapp_enabled,
            )
            .with_sink(
                Arc::new(WebhookSink::new(config.sinks.webhook_url.clone())),
                config.sinks.webhook_enabled,
            );
        if !notifiers.has_enabled() {
            tracing::warn!("No sink is enabled; accepted signals will only be logged");
        }

        let pipeline = Arc::new(Pipeline::new(
            classifier,
            Arc::new(notifiers),
            PipelineOptions {
                announce_errors: config.announce_errors,
            },
        ));

        let source: Arc<dyn IngestionSource> = match config.source {
            SourceKind::Telegram => Arc::new(TelegramSource::new(
                config.telegram.bot_token.clone(),
                config.telegram.monitored.clone(),
            )),
            SourceKind::Cli => Arc::new(CliSource::new()),
        };

        Ok(Self::new(source, pipeline))
    }

    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Run until `shutdown` resolves or the source stream ends.
    ///
    /// `shutdown` is honoured from the first poll, including while the
    /// start notice is sent and the source connects. A source that fails
    /// to start or disconnects later is announced as a crash and returned
    /// as an error.
    pub async fn run(self, shutdown: impl Future<Output = ()>) -> error::Result<()> {
        let notifiers = Arc::clone(self.pipeline.notifiers());
        tokio::pin!(shutdown);

        let startup = async {
            notifiers
                .announce(&LifecycleEvent::Started {
                    sources: self.source.monitored(),
                })
                .await;
            self.source.start().await
        };

        let started = tokio::select! {
            biased;
            _ = &mut shutdown => None,
            started = startup => Some(started),
        };

        let mut stream = match started {
            Some(Ok(stream)) => stream,
            Some(Err(e)) => {
                tracing::error!(source = self.source.name(), error = %e, "Source failed to start");
                return self.finish(JoinSet::new(), Exit::Crashed(e)).await;
            }
            None => {
                tracing::info!("Shutdown requested during startup, stopping relay...");
                return self
                    .finish(JoinSet::new(), Exit::Stopped("stopped by the operator"))
                    .await;
            }
        };

        tracing::info!(source = self.source.name(), "Relay ready and listening");

        let mut in_flight = JoinSet::new();

        let exit = loop {
            let message = tokio::select! {
                biased;
                _ = &mut shutdown => {
                    tracing::info!("Shutdown requested, stopping relay...");
                    break Exit::Stopped("stopped by the operator");
                }
                item = stream.next() => match item {
                    Some(Ok(m)) => m,
                    Some(Err(e)) => {
                        tracing::error!(source = self.source.name(), error = %e, "Source disconnected");
                        break Exit::Crashed(e);
                    }
                    None => {
                        tracing::info!("Source stream ended, stopping relay...");
                        break Exit::Stopped("source stream ended");
                    }
                },
            };

            // Reap finished tasks so the set does not grow unbounded.
            while in_flight.try_join_next().is_some() {}

            let pipeline = Arc::clone(&self.pipeline);
            in_flight.spawn(async move {
                let id = message.id.clone();
                let outcome = pipeline.handle(message).await;
                tracing::debug!(id = %id, outcome = outcome.label(), "Message handled");
            });
        };

        self.finish(in_flight, exit).await
    }

    /// Stop the source, drain in-flight messages and send the final notice,
    /// each bounded by the grace period.
    async fn finish(&self, mut in_flight: JoinSet<()>, exit: Exit) -> error::Result<()> {
        let notifiers = self.pipeline.notifiers();

        if let Err(e) = self.source.shutdown().await {
            tracing::warn!(source = self.source.name(), error = %e, "Source shutdown failed");
        }

        let drained = tokio::time::timeout(self.grace, async {
            while in_flight.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            tracing::warn!(
                pending = in_flight.len(),
                "In-flight messages did not finish within the grace period; aborting"
            );
            in_flight.abort_all();
        }

        let event = match &exit {
            Exit::Stopped(reason) => LifecycleEvent::Stopped {
                reason: reason.to_string(),
            },
            Exit::Crashed(e) => LifecycleEvent::Crashed {
                reason: e.to_string(),
            },
        };
        if tokio::time::timeout(self.grace, notifiers.announce(&event))
            .await
            .is_err()
        {
            tracing::warn!(event = event.label(), "Final announcement did not finish within the grace period");
        }

        match exit {
            Exit::Stopped(_) => {
                tracing::info!("Relay stopped");
                Ok(())
            }
            Exit::Crashed(e) => Err(e.into()),
        }
    }
}
