// In crates/decision/src/error.rs

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum Error {
    /// No decodable decision array could be found, even after repair.
    #[error("Decision extraction failed: {reason}")]
    ExtractionFailed {
        reason: String,
        /// Whatever reasoning text preceded the payload.
        reasoning: String,
        /// The start of the raw model output, for diagnostics.
        raw_excerpt: String,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
