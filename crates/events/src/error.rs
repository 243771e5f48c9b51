// In crates/events/src/error.rs

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Stream callback failed: {0}")]
    CallbackFailed(String),

    #[error("Failed to load prompt module '{name}': {source}")]
    PromptLoad {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Prompt module name '{0}' is not a plain file name")]
    InvalidPromptName(String),
}

pub type Result<T> = std::result::Result<T, Error>;
