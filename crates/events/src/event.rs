// In crates/events/src/event.rs

use chrono::{DateTime, Utc};
use core_types::ExecutionReport;
use serde::Serialize;

/// Something observable that happened during a decision cycle.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineEvent {
    pub timestamp: DateTime<Utc>,
    pub trader: String,
    pub kind: EventKind,
}

impl PipelineEvent {
    pub fn new(trader: impl Into<String>, kind: EventKind) -> Self {
        Self {
            timestamp: Utc::now(),
            trader: trader.into(),
            kind,
        }
    }
}

/// `tag` and `content` are used by serde for clean JSON representation.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "payload")]
pub enum EventKind {
    CycleStarted,
    /// The first response could not be parsed and the model was asked again.
    ExtractionRetried { reason: String },
    DecisionsAccepted { count: usize },
    BatchRejected { reason: String },
    ExecutionFinished(ExecutionReport),
}
