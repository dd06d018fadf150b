//! Event broadcasting for retention activity.
//!
//! Every cleanup job run and every sweep publishes exactly one completion
//! event. Consumers (log shippers, tests, a future status endpoint) subscribe
//! to the bus and receive a copy of each event.
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │ Jobs / Sweep    │────>│    EventBus     │────>│   Subscribers   │
//! └─────────────────┘     │  (broadcast)    │     └─────────────────┘
//!                         └─────────────────┘
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::{jobs::JobReport, retention::SweepRunResult};

/// Default channel capacity for the event bus.
/// Slow receivers start missing events (lagging) once this many are buffered.
const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Event topics for filtering subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventTopic {
    /// Per-build cleanup job completions
    Cleanup,
    /// Time-based sweep completions
    Sweep,
    /// All events (wildcard subscription)
    All,
}

impl EventTopic {
    /// Check if this topic matches another topic.
    /// `All` matches everything, otherwise exact match is required.
    pub fn matches(&self, other: &EventTopic) -> bool {
        matches!(self, EventTopic::All) || matches!(other, EventTopic::All) || self == other
    }
}

/// Completion events.
///
/// Serialized with `event_type` as the discriminator:
/// ```json
/// { "event_type": "cleanup_completed", "job_id": "...", "outcome": "deleted", ... }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum RetentionEvent {
    /// A cleanup job finished one attempt.
    CleanupCompleted(JobReport),

    /// A retention sweep finished.
    SweepCompleted(SweepRunResult),
}

impl RetentionEvent {
    /// Get the topic for this event.
    pub fn topic(&self) -> EventTopic {
        match self {
            RetentionEvent::CleanupCompleted(_) => EventTopic::Cleanup,
            RetentionEvent::SweepCompleted(_) => EventTopic::Sweep,
        }
    }

    /// Get the event type name as a string.
    pub fn event_type(&self) -> &'static str {
        match self {
            RetentionEvent::CleanupCompleted(_) => "cleanup_completed",
            RetentionEvent::SweepCompleted(_) => "sweep_completed",
        }
    }
}

/// Central event bus for broadcasting retention events.
///
/// Uses a tokio broadcast channel so multiple subscribers receive the same
/// events. Events are cloned for each subscriber.
#[derive(Debug)]
pub struct EventBus {
    sender: broadcast::Sender<RetentionEvent>,
    events_published: AtomicU64,
    /// Events published while nobody was subscribed
    events_dropped: AtomicU64,
}

impl EventBus {
    /// Create a new event bus with the default channel capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a new event bus with a custom channel capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            events_published: AtomicU64::new(0),
            events_dropped: AtomicU64::new(0),
        }
    }

    /// Publish an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event.
    /// With no subscribers the event is dropped and 0 is returned.
    pub fn publish(&self, event: RetentionEvent) -> usize {
        self.events_published.fetch_add(1, Ordering::Relaxed);

        match self.sender.send(event) {
            Ok(count) => count,
            Err(_) => {
                self.events_dropped.fetch_add(1, Ordering::Relaxed);
                0
            }
        }
    }

    /// Subscribe to events from this bus.
    ///
    /// A receiver that falls behind gets `RecvError::Lagged` with the number
    /// of events it missed.
    pub fn subscribe(&self) -> broadcast::Receiver<RetentionEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    pub fn events_published(&self) -> u64 {
        self.events_published.load(Ordering::Relaxed)
    }

    pub fn events_dropped(&self) -> u64 {
        self.events_dropped.load(Ordering::Relaxed)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
