// In crates/engine/src/model.rs

use crate::Result;
use async_trait::async_trait;
use events::StreamSink;
use std::sync::Arc;

/// One request to the language model.
#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub trader: String,
    pub system_prompt: Arc<str>,
    pub user_prompt: String,
}

impl ModelRequest {
    /// A follow-up asking the model to restate its previous answer as a
    /// well-formed decision array.
    pub fn reformat(&self, previous: &str, problem: &str) -> Self {
        let user_prompt = format!(
            "Your previous answer could not be parsed ({problem}).\n\
             Repeat the same decisions as a single JSON array of objects, after your reasoning, \
             with no markdown checklists and with every string value in double quotes.\n\n\
             Previous answer:\n{previous}"
        );
        Self {
            trader: self.trader.clone(),
            system_prompt: self.system_prompt.clone(),
            user_prompt,
        }
    }
}

/// The language model collaborator. The transport is up to the implementation.
#[async_trait]
pub trait ModelClient: Send + Sync {
    fn name(&self) -> &'static str;

    /// Returns the full response text. When `stream` is given, incremental
    /// output is pushed to it as it arrives.
    ///
    /// Failures should be reported as [`crate::Error::RiskCallFailed`].
    async fn complete(&self, request: &ModelRequest, stream: Option<&StreamSink>)
    -> Result<String>;
}
