// In crates/events/src/stream.rs

use crate::Result;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;

/// Receives streamed model output, one chunk at a time.
pub type StreamCallback = Arc<dyn Fn(&str) -> Result<()> + Send + Sync>;

/// The producer side of a bounded stream forwarder.
///
/// Chunks are queued on a bounded channel and handed to the callback by a
/// background task. A full channel drops the chunk rather than blocking the
/// producer.
#[derive(Debug, Clone)]
pub struct StreamSink {
    trader: Arc<str>,
    tx: mpsc::Sender<String>,
    dropped: Arc<AtomicU64>,
}

impl StreamSink {
    /// Spawns the forwarding task. It ends once every clone of the sink is dropped.
    pub fn spawn(
        trader: &str,
        callback: StreamCallback,
        capacity: usize,
    ) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<String>(capacity.max(1));
        let trader: Arc<str> = Arc::from(trader);

        let task_trader = trader.clone();
        let handle = tokio::spawn(async move {
            while let Some(chunk) = rx.recv().await {
                if let Err(e) = callback(&chunk) {
                    tracing::warn!(trader = %task_trader, error = %e, "Stream callback failed.");
                }
            }
            tracing::debug!(trader = %task_trader, "Stream forwarder finished.");
        });

        let sink = Self {
            trader,
            tx,
            dropped: Arc::new(AtomicU64::new(0)),
        };
        (sink, handle)
    }

    /// Queues a chunk. Returns `false` if it was dropped.
    pub fn push(&self, chunk: impl Into<String>) -> bool {
        match self.tx.try_send(chunk.into()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::debug!(trader = %self.trader, dropped, "Stream buffer full, chunk dropped.");
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
