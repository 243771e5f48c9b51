// In crates/events/src/lib.rs

pub mod error;
pub mod event;
pub mod prompt;
pub mod registry;
pub mod stream;

pub use error::{Error, Result};
pub use event::{EventKind, PipelineEvent};
pub use prompt::PromptCache;
pub use registry::Registry;
pub use stream::{StreamCallback, StreamSink};
