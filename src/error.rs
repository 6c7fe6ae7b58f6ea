//! Error types for Signal Relay.

use std::time::Duration;

/// Top-level error type for the relay.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Source error: {0}")]
    Source(#[from] SourceError),
}

/// Configuration-related errors. Always fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} rejected the request: {reason}")]
    Rejected { provider: String, reason: String },
}

/// The classifier could not reach a verdict.
///
/// Distinct from a rejection: a message that hits one of these was never
/// judged, so it must not be reported as noise.
#[derive(Debug, thiserror::Error)]
pub enum ClassificationError {
    #[error("model call timed out after {after:?}")]
    Timeout { after: Duration },

    #[error("model backend failed: {0}")]
    Backend(#[from] LlmError),

    #[error("model returned an empty completion")]
    EmptyResponse,
}

/// Per-sink delivery errors.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("Sink {sink} is not configured: {reason}")]
    NotConfigured { sink: String, reason: String },

    #[error("Sink {sink} request failed: {reason}")]
    Request { sink: String, reason: String },

    #[error("Sink {sink} returned HTTP {status}: {body}")]
    Status {
        sink: String,
        status: u16,
        body: String,
    },

    #[error("Sink {sink} timed out after {after:?}")]
    Timeout { sink: String, after: Duration },

    #[error("Sink {sink} panicked: {reason}")]
    Panicked { sink: String, reason: String },
}

/// Ingestion source errors.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Source {name} failed to start: {reason}")]
    StartupFailed { name: String, reason: String },

    #[error("Source {name} disconnected: {reason}")]
    Disconnected { name: String, reason: String },
}

/// Result type alias for the relay.
pub type Result<T> = std::result::Result<T, Error>;
