//! Save notifications.
//!
//! One event is published after every store write attempt. Delivery is
//! fire-and-forget over a broadcast channel; the writer never waits for
//! subscribers and a missing subscriber is not an error.

use time::OffsetDateTime;
use tokio::sync::broadcast;
use tracing::debug;

/// What caused a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveTrigger {
    Immediate,
    Debounced,
    Flush,
    Reset,
}

impl SaveTrigger {
    pub fn as_str(self) -> &'static str {
        match self {
            SaveTrigger::Immediate => "immediate",
            SaveTrigger::Debounced => "debounced",
            SaveTrigger::Flush => "flush",
            SaveTrigger::Reset => "reset",
        }
    }
}

/// Result of one write attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveEvent {
    pub success: bool,
    pub error: Option<String>,
    pub trigger: SaveTrigger,
    pub timestamp: OffsetDateTime,
}

impl SaveEvent {
    pub fn succeeded(trigger: SaveTrigger) -> Self {
        Self {
            success: true,
            error: None,
            trigger,
            timestamp: OffsetDateTime::now_utc(),
        }
    }

    pub fn failed(trigger: SaveTrigger, error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            trigger,
            timestamp: OffsetDateTime::now_utc(),
        }
    }
}

/// Publisher side of the save notification channel.
#[derive(Debug, Clone)]
pub struct SaveEvents {
    sender: broadcast::Sender<SaveEvent>,
}

impl SaveEvents {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SaveEvent> {
        self.sender.subscribe()
    }

    pub fn publish(&self, event: SaveEvent) {
        let success = event.success;
        let trigger = event.trigger.as_str();
        if self.sender.send(event).is_err() {
            debug!(success, trigger, "Save event dropped: no subscribers");
        }
    }
}
