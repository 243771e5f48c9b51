// In crates/engine/src/error.rs

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// The model invocation itself failed. Fatal for the cycle.
    #[error("Model call failed: {0}")]
    RiskCallFailed(String),

    /// No decision payload could be extracted, even after the reformat retry.
    #[error(transparent)]
    ExtractionFailed(#[from] decision::Error),

    #[error("Prompt unavailable: {0}")]
    Prompt(#[from] events::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
