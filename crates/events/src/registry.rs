// In crates/events/src/registry.rs

use crate::event::PipelineEvent;
use crate::prompt::PromptCache;
use crate::stream::StreamCallback;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;
use tokio::sync::broadcast;

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Process-wide shared state, created once at startup and passed by reference.
///
/// Holds the per-trader stream callbacks, the prompt module cache and the
/// pipeline event channel.
pub struct Registry {
    streams: RwLock<HashMap<String, StreamCallback>>,
    prompts: PromptCache,
    events: broadcast::Sender<PipelineEvent>,
}

impl Registry {
    pub fn new(prompt_dir: impl Into<PathBuf>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            streams: RwLock::new(HashMap::new()),
            prompts: PromptCache::new(prompt_dir),
            events,
        }
    }

    // --- Stream callbacks ---

    /// Registers the callback for a trader, returning the one it replaces.
    pub fn register(&self, trader: &str, callback: StreamCallback) -> Option<StreamCallback> {
        let previous = self
            .streams
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .insert(trader.to_string(), callback);
        tracing::debug!(trader, replaced = previous.is_some(), "Stream callback registered.");
        previous
    }

    pub fn unregister(&self, trader: &str) -> bool {
        self.streams
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .remove(trader)
            .is_some()
    }

    pub fn lookup(&self, trader: &str) -> Option<StreamCallback> {
        self.streams
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .get(trader)
            .cloned()
    }

    // --- Prompts ---

    pub fn prompts(&self) -> &PromptCache {
        &self.prompts
    }

    // --- Events ---

    /// Publishes an event. Having no subscribers is not an error.
    pub fn publish(&self, event: PipelineEvent) {
        let _ = self.events.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.events.subscribe()
    }

    /// Drops every stream callback and cached prompt.
    pub fn shutdown(&self) {
        let streams = {
            let mut streams = self.streams.write().unwrap_or_else(|p| p.into_inner());
            let count = streams.len();
            streams.clear();
            count
        };
        self.prompts.invalidate();
        tracing::info!(streams, "Registry cleared.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;
    use std::sync::Arc;

    fn noop() -> StreamCallback {
        Arc::new(|_chunk: &str| Ok(()))
    }

    #[test]
    fn test_register_lookup_unregister() {
        let registry = Registry::new("prompts");
        assert!(registry.lookup("alpha").is_none());

        assert!(registry.register("alpha", noop()).is_none());
        assert!(registry.register("alpha", noop()).is_some());
        assert!(registry.lookup("alpha").is_some());
        assert!(registry.lookup("beta").is_none());

        assert!(registry.unregister("alpha"));
        assert!(!registry.unregister("alpha"));
        assert!(registry.lookup("alpha").is_none());
    }

    #[test]
    fn test_shutdown_clears_state() {
        let registry = Registry::new("prompts");
        registry.register("alpha", noop());
        registry
            .prompts()
            .get_or_load_with("system", || Ok("prompt".to_string()))
            .unwrap();

        registry.shutdown();

        assert!(registry.lookup("alpha").is_none());
        assert!(registry.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_published_events_reach_subscribers() {
        let registry = Registry::new("prompts");
        registry.publish(PipelineEvent::new("alpha", EventKind::CycleStarted));

        let mut rx = registry.subscribe();
        registry.publish(PipelineEvent::new(
            "alpha",
            EventKind::DecisionsAccepted { count: 2 },
        ));

        let event = rx.recv().await.unwrap();
        assert!(matches!(event.kind, EventKind::DecisionsAccepted { count: 2 }));
    }
}
