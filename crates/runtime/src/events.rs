//! Topic-based event bus for buff transitions and tick outcomes.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use solo_core::{ErrorSeverity, SessionId, TickReport};

/// Topics for event routing
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum Topic {
    /// Buff granted to or removed from a session
    Buff,
    /// Tick completions, failures and config reloads
    Tick,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuffEvent {
    Applied { session: SessionId },
    Cleared { session: SessionId },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TickEvent {
    Completed {
        evaluated: usize,
        solo: usize,
        failures: usize,
        refreshed: bool,
        next_wakeup: Option<Duration>,
    },
    Failed {
        code: String,
        severity: ErrorSeverity,
    },
    /// A new config was swapped in; `cleared` bundles were stripped.
    Reloaded { cleared: usize },
    ShutDown { cleared: usize },
}

impl TickEvent {
    pub fn completed(report: &TickReport) -> Self {
        Self::Completed {
            evaluated: report.evaluated,
            solo: report.solo,
            failures: report.failures.len(),
            refreshed: report.refreshed,
            next_wakeup: report.next_wakeup,
        }
    }
}

/// Event wrapper that carries the topic and typed event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    Buff(BuffEvent),
    Tick(TickEvent),
}

impl Event {
    pub fn topic(&self) -> Topic {
        match self {
            Event::Buff(_) => Topic::Buff,
            Event::Tick(_) => Topic::Tick,
        }
    }
}

/// Topic-based event bus
///
/// Consumers subscribe to the topics they care about. Publishing never
/// blocks; events sent while nobody listens are dropped.
#[derive(Clone, Debug)]
pub struct EventBus {
    buff: broadcast::Sender<Event>,
    tick: broadcast::Sender<Event>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(100)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buff: broadcast::channel(capacity).0,
            tick: broadcast::channel(capacity).0,
        }
    }

    pub fn publish(&self, event: Event) {
        // No receivers is fine.
        let _ = self.sender(event.topic()).send(event);
    }

    pub fn subscribe(&self, topic: Topic) -> broadcast::Receiver<Event> {
        self.sender(topic).subscribe()
    }

    pub fn publish_tick(&self, report: &TickReport) {
        for &session in &report.applied {
            self.publish(Event::Buff(BuffEvent::Applied { session }));
        }
        for &session in &report.cleared {
            self.publish(Event::Buff(BuffEvent::Cleared { session }));
        }
        self.publish(Event::Tick(TickEvent::completed(report)));
    }

    fn sender(&self, topic: Topic) -> &broadcast::Sender<Event> {
        match topic {
            Topic::Buff => &self.buff,
            Topic::Tick => &self.tick,
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
