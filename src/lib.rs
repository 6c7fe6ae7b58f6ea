//! Signal Relay: filters trading-signal chatter and forwards real signals.

pub mod channels;
pub mod config;
pub mod error;
pub mod llm;
pub mod notify;
pub mod pipeline;
pub mod relay;
