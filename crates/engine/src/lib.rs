// In crates/engine/src/lib.rs

pub mod error;
pub mod model;
pub mod pipeline;

pub use error::{Error, Result};
pub use model::{ModelClient, ModelRequest};
pub use pipeline::{
    CycleInput, CycleOutcome, DecisionPipeline, LifecycleFailure, SkippedEntry,
    SYSTEM_PROMPT_MODULE,
};
