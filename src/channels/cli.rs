//! CLI source: stdin lines for local runs.
//!
//! Each line is `label | text`; a line without a separator is attributed
//! to the `cli` label.

use async_trait::async_trait;
use chrono::Utc;
use futures::stream;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::channels::{IngestionSource, MessageStream};
use crate::error::SourceError;
use crate::pipeline::types::InboundMessage;

const DEFAULT_LABEL: &str = "cli";

/// A simple source that reads messages from stdin.
pub struct CliSource;

impl CliSource {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CliSource {
    fn default() -> Self {
        Self::new()
    }
}

/// Split a stdin line into `(label, text)`. Blank lines yield `None`.
pub fn parse_line(line: &str) -> Option<(String, String)> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match line.split_once('|') {
        Some((label, text)) if !label.trim().is_empty() && !text.trim().is_empty() => {
            Some((label.trim().to_string(), text.trim().to_string()))
        }
        _ => Some((DEFAULT_LABEL.to_string(), line.to_string())),
    }
}

fn read_failed(err: &std::io::Error) -> SourceError {
    SourceError::Disconnected {
        name: "cli".into(),
        reason: format!("stdin read failed: {err}"),
    }
}

#[async_trait]
impl IngestionSource for CliSource {
    fn name(&self) -> &str {
        "cli"
    }

    fn monitored(&self) -> Vec<String> {
        vec!["stdin".to_string()]
    }

    async fn start(&self) -> Result<MessageStream, SourceError> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();

        tokio::spawn(async move {
            let stdin = tokio::io::stdin();
            let reader = BufReader::new(stdin);
            let mut lines = reader.lines();

            eprintln!("Type `label | message` and press Enter. Ctrl+D to stop.");

            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let Some((label, text)) = parse_line(&line) else {
                            continue;
                        };
                        let msg = InboundMessage::new(label, text, Utc::now());
                        if tx.send(Ok(msg)).is_err() {
                            break;
                        }
                    }
                    Ok(None) => break, // EOF
                    Err(e) => {
                        tracing::error!("Error reading stdin: {}", e);
                        let _ = tx.send(Err(read_failed(&e)));
                        break;
                    }
                }
            }
        });

        let stream = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|msg| (msg, rx))
        });

        Ok(Box::pin(stream))
    }
}
