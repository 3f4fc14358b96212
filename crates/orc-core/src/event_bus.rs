use serde_json::Value;
use tokio::sync::broadcast;

/// A structured, fire-and-forget notification published by any component
/// (governance decisions, approval transitions, budget breaches, emergency
/// stop). Consumed by the Approval CLI and by log sinks; never load-bearing
/// for correctness.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Event {
    pub event_type: String,
    pub properties: Value,
}

impl Event {
    pub fn new(event_type: impl Into<String>, properties: Value) -> Self {
        Self {
            event_type: event_type.into(),
            properties,
        }
    }
}

/// Process-wide broadcast bus. Cloning an `EventBus` shares the same
/// underlying channel (matches the teacher's single-construction,
/// passed-by-`Arc`/by-clone discipline — no global singleton).
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<Event>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1024);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: Event) {
        // No subscribers is not an error: events are observability, not a queue.
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
