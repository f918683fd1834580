//! # Runtime events emitted by the scheduler, the queue and execution workers.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Queue events**: a mode entered or replaced a queue slot
//! - **Arbitration events**: a candidate won, a priority query failed, a fallback was used
//! - **Worker events**: start, step failures and retries, completion, cleanup, exit
//! - **Runtime events**: subscriber trouble and graceful shutdown
//!
//! The [`Event`] struct carries optional metadata (mode name, priorities,
//! attempt, delay, reason) depending on the kind.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//!
//! ## Example
//! ```rust
//! use modevisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::ModeSelected)
//!     .with_mode("away")
//!     .with_priority(2)
//!     .with_previous(1);
//!
//! assert_eq!(ev.kind, EventKind::ModeSelected);
//! assert_eq!(ev.mode.as_deref(), Some("away"));
//! assert_eq!(ev.priority, Some(2));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets: `mode` (subscriber name), `reason` (panic message).
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets: `mode` (subscriber name), `reason`.
    SubscriberOverflow,

    // === Queue events ===
    /// A mode took a new queue slot.
    ///
    /// Sets: `mode`, `priority` (override, if any).
    ModeEnqueued,

    /// A queued mode was superseded by a newer instance of the same type.
    ///
    /// Sets: `mode`, `priority` (override of the new instance, if any).
    ModeReplaced,

    // === Arbitration events ===
    /// A queued candidate beat the running mode and left the queue.
    ///
    /// Sets: `mode`, `priority` (winner), `previous` (running priority).
    ModeSelected,

    /// A candidate's priority query failed; it was treated as 0 this cycle.
    ///
    /// Sets: `mode`, `reason`.
    PriorityFailed,

    /// The winner of an arbitration cycle was replaced in the queue before it
    /// could be removed; the cycle yielded nothing.
    ///
    /// Sets: `mode`.
    SelectionSuperseded,

    /// Nothing was running and no candidate wanted to run; idle was launched.
    ///
    /// Sets: `mode`.
    FallbackLaunched,

    /// The scheduler finished a switch from one mode to another.
    ///
    /// Sets: `mode` (incoming), `reason` (outgoing name, if any), `priority`.
    ModeSwitched,

    // === Worker events ===
    /// A worker was launched for a mode.
    ///
    /// Sets: `mode`, `priority` (launch priority).
    ModeStarting,

    /// The scheduler asked the running worker to stop.
    ///
    /// Sets: `mode`.
    StopRequested,

    /// One `step()` failed.
    ///
    /// Sets: `mode`, `attempt` (consecutive failures), `reason`.
    StepFailed,

    /// The worker will retry a failed step after a delay.
    ///
    /// Sets: `mode`, `attempt`, `delay_ms`.
    StepRetryScheduled,

    /// `step()` panicked; the worker ends its loop.
    ///
    /// Sets: `mode`, `reason` (panic message).
    StepPanicked,

    /// The mode reported `is_complete() == true`.
    ///
    /// Sets: `mode`.
    ModeCompleted,

    /// `cleanup()` returned an error or panicked.
    ///
    /// Sets: `mode`, `reason`.
    CleanupFailed,

    /// The worker terminated and its cleanup has run.
    ///
    /// Sets: `mode`, `reason` (exit label).
    ModeStopped,

    /// A fresh instance of an outgoing mode was put back in the queue.
    ///
    /// Sets: `mode`.
    ModeRequeued,

    /// A worker task died without reporting an exit (join error).
    ///
    /// Sets: `mode`, `reason`.
    WorkerDead,

    // === Shutdown events ===
    /// Shutdown requested (OS signal or explicit call).
    ShutdownRequested,

    /// The running mode stopped within the configured grace period.
    AllStoppedWithin,

    /// Grace period exceeded; the running mode did not stop in time.
    GraceExceeded,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Mode (or subscriber) name, if applicable.
    pub mode: Option<Arc<str>>,
    /// Priority relevant to the event (winner, launch priority, override).
    pub priority: Option<u32>,
    /// Priority the winner was compared against.
    pub previous: Option<u32>,
    /// Consecutive failure count.
    pub attempt: Option<u32>,
    /// Retry delay in milliseconds (compact).
    pub delay_ms: Option<u32>,
    /// Human-readable reason (errors, exit labels, outgoing mode).
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            mode: None,
            priority: None,
            previous: None,
            attempt: None,
            delay_ms: None,
            reason: None,
        }
    }

    /// Attaches a mode name.
    #[inline]
    pub fn with_mode(mut self, mode: impl Into<Arc<str>>) -> Self {
        self.mode = Some(mode.into());
        self
    }

    /// Attaches a priority.
    #[inline]
    pub fn with_priority(mut self, p: u32) -> Self {
        self.priority = Some(p);
        self
    }

    /// Attaches an optional priority (no-op on `None`).
    #[inline]
    pub fn with_priority_opt(mut self, p: Option<u32>) -> Self {
        self.priority = p;
        self
    }

    /// Attaches the priority a winner was compared against.
    #[inline]
    pub fn with_previous(mut self, p: u32) -> Self {
        self.previous = Some(p);
        self
    }

    /// Attaches an attempt count.
    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches a delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.delay_ms = Some(ms);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_mode(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_mode(subscriber)
            .with_reason(info)
    }

    /// True for events that report on subscribers themselves.
    #[inline]
    pub fn is_subscriber_event(&self) -> bool {
        matches!(
            self.kind,
            EventKind::SubscriberOverflow | EventKind::SubscriberPanicked
        )
    }
}
