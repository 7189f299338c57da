//! Lifecycle events and the long-running task registry.
//!
//! Both live off the render hot path. The bus tells other subsystems that
//! an animation came or went; the registry exists so shutdown can join
//! every long-running task with a bound and observability tooling can see
//! what is (still) alive.

mod registry;

pub use registry::{JoinOutcome, TaskInfo, TaskRegistry};

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use core_zone::ZoneId;
use tokio::sync::broadcast;

// -------------------------------------------------------------------------------------------------
// Telemetry
// -------------------------------------------------------------------------------------------------
// Minimal atomic counters, inspectable in tests or logged periodically.
// -------------------------------------------------------------------------------------------------
pub static EVENTS_PUBLISHED: AtomicU64 = AtomicU64::new(0);
pub static EVENTS_UNOBSERVED: AtomicU64 = AtomicU64::new(0); // published with no live subscriber

/// Default bus capacity. Lifecycle events are rare; a lagging subscriber
/// loses oldest events rather than blocking the publisher.
pub const EVENT_BUS_CAP: usize = 64;

/// Why a runner stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// An external `stop()` (or replacement by `start()`) asked it to.
    Requested,
    /// The animation reported it was done.
    Completed,
    /// The animation's step faulted.
    Faulted,
}

impl StopReason {
    pub const fn as_str(self) -> &'static str {
        match self {
            StopReason::Requested => "requested",
            StopReason::Completed => "completed",
            StopReason::Faulted => "faulted",
        }
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fire-and-forget notifications published by the animation service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    AnimationStarted { zone: ZoneId },
    AnimationStopped { zone: ZoneId, reason: StopReason },
}

/// Publish/subscribe fan-out for [`Event`].
///
/// Publishing never blocks and never fails the publisher: a bus nobody
/// listens to just counts the event as unobserved.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<Event>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(EVENT_BUS_CAP)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: Event) {
        EVENTS_PUBLISHED.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(target: "events.bus", ?event, "event_published");
        if self.tx.send(event).is_err() {
            EVENTS_UNOBSERVED.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_receives_published_events() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        bus.publish(Event::AnimationStarted {
            zone: ZoneId::Floor,
        });
        bus.publish(Event::AnimationStopped {
            zone: ZoneId::Floor,
            reason: StopReason::Completed,
        });
        assert_eq!(
            rx.recv().await.expect("first event"),
            Event::AnimationStarted {
                zone: ZoneId::Floor
            }
        );
        assert_eq!(
            rx.recv().await.expect("second event"),
            Event::AnimationStopped {
                zone: ZoneId::Floor,
                reason: StopReason::Completed
            }
        );
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_fine() {
        let bus = EventBus::new();
        let before = EVENTS_UNOBSERVED.load(Ordering::Relaxed);
        bus.publish(Event::AnimationStarted { zone: ZoneId::Lamp });
        assert!(EVENTS_UNOBSERVED.load(Ordering::Relaxed) > before);
    }

    #[tokio::test]
    async fn late_subscriber_misses_earlier_events() {
        let bus = EventBus::new();
        bus.publish(Event::AnimationStarted { zone: ZoneId::Top });
        let mut rx = bus.subscribe();
        bus.publish(Event::AnimationStopped {
            zone: ZoneId::Top,
            reason: StopReason::Requested,
        });
        assert_eq!(
            rx.recv().await.expect("only the later event"),
            Event::AnimationStopped {
                zone: ZoneId::Top,
                reason: StopReason::Requested
            }
        );
    }
}
