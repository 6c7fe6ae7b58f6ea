//! Message classification and delivery pipeline.
//!
//! Every inbound message flows through:
//! 1. `Classifier::classify()`: one model call, `IGNORE` sentinel check
//! 2. `Pipeline::handle()`: provenance footer, fan-out to enabled sinks
//!
//! A message that cannot be classified is skipped, never reported as noise.

pub mod classifier;
pub mod processor;
pub mod signal;
pub mod types;

pub use classifier::{Classifier, ClassifierConfig};
pub use processor::{Pipeline, PipelineOptions};
pub use signal::{Direction, SignalSummary};
pub use types::{HandleOutcome, InboundMessage, Verdict};
