//! Ingestion sources that feed the pipeline.

pub mod cli;
pub mod source;
pub mod telegram;

pub use cli::CliSource;
pub use source::*;
pub use telegram::TelegramSource;
