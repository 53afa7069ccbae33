//! Capture events published to display collaborators

use serde::Serialize;
use tokio::sync::broadcast;

use super::store::TabId;

/// Events emitted by the capture pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum CaptureEvent {
    /// A new token was stored for a tab
    #[serde(rename_all = "camelCase")]
    TokenCaptured {
        /// Tab the token was captured in
        tab_id: TabId,
        /// Number of tokens now stored for the tab
        token_count: usize,
    },
}

/// Fire-and-forget publisher for capture events
///
/// Zero or more subscribers may listen. Publishing with nobody listening is
/// not an error, and a lagging subscriber only loses its own backlog.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<CaptureEvent>,
}

impl EventBus {
    /// Creates a bus buffering up to `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Subscribes to future events
    pub fn subscribe(&self) -> broadcast::Receiver<CaptureEvent> {
        self.tx.subscribe()
    }

    /// Publishes an event, returning how many subscribers received it
    pub fn publish(&self, event: CaptureEvent) -> usize {
        match self.tx.send(event) {
            Ok(delivered) => delivered,
            Err(_) => {
                tracing::trace!("No listeners for capture event");
                0
            }
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}
