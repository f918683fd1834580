//! # Event bus for broadcasting runtime events.
//!
//! [`Bus`] is a thin wrapper around [`tokio::sync::broadcast`] that provides
//! non-blocking publishing from the scheduler loop, the queue, the execution
//! worker and control-plane handlers.
//!
//! ```text
//! Publishers (many):                  Consumer (one):
//!   Scheduler loop ──┐
//!   SchedulerState ──┼──► Bus ──► subscriber_listener ──► SubscriberSet
//!   Worker         ──┤  (broadcast)    (in Scheduler)
//!   Control plane  ──┘
//! ```
//!
//! ## Rules
//! - `publish()` never blocks.
//! - Slow receivers get `RecvError::Lagged(n)` and skip the `n` oldest events.
//! - Events are lost if nobody is subscribed at send time.

use tokio::sync::broadcast;

use super::event::Event;

/// Broadcast channel for runtime events.
///
/// Cheap to clone (holds an `Arc`-backed sender).
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a new bus with the given channel capacity (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel::<Event>(capacity.max(1));
        Self { tx }
    }

    /// Publishes an event to all active receivers; dropped if there are none.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Creates a new receiver that observes events sent after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;

    #[tokio::test]
    async fn receiver_sees_events_published_after_subscribe() {
        let bus = Bus::new(0);
        bus.publish(Event::new(EventKind::ModeEnqueued).with_mode("lost"));

        let mut rx = bus.subscribe();
        bus.publish(Event::new(EventKind::ModeEnqueued).with_mode("seen"));

        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.mode.as_deref(), Some("seen"));
    }
}
