//! Broadcast event sink
//!
//! Fans engine events out to any number of subscribers over a tokio
//! broadcast channel. Emitting with no subscriber, or to a lagging one,
//! never blocks the engine.

use meddir_core::ports::{EngineEvent, IEventSink};
use tokio::sync::broadcast;
use tracing::trace;

#[derive(Debug, Clone)]
pub struct BroadcastEvents {
    tx: broadcast::Sender<EngineEvent>,
}

impl BroadcastEvents {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastEvents {
    fn default() -> Self {
        Self::new(64)
    }
}

impl IEventSink for BroadcastEvents {
    fn emit(&self, event: EngineEvent) {
        trace!(event = event.name(), "Emitting event");
        // No receivers is not an error
        let _ = self.tx.send(event);
    }
}
