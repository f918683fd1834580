//! # Scheduler state: the queue and the activity behind one lock.
//!
//! Control-plane handlers and the scheduler loop both read and mutate the
//! pending queue and "what is running". Keeping them in one [`RwLock`] makes
//! every observation atomic: a mode is always seen in exactly one place
//! (queued, running, or the target of a switch).
//!
//! ```text
//!                 ┌──────────────── SchedulerState (RwLock) ────────────────┐
//! enqueue() ────► │ queue: [idle][away][party]     activity: Running{away}  │
//! pop_best_above()│ version: 42                                             │
//! snapshot() ◄─── │                                                         │
//!                 └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Arbitration (`pop_best_above`)
//! 1. read lock: clone the queued handles, release
//! 2. query all priorities concurrently, **no lock held**
//! 3. pick the first strictly greatest score above the running priority
//! 4. write lock: remove the winner only if the same instance still holds
//!    its slot, and mark the switch in the same critical section
//!
//! ## Rules
//! - Every mutation bumps `version`.
//! - Priorities are never computed under the lock.

use std::fmt;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::core::queue::{select_best, Enqueued, ModeQueue};
use crate::core::runner::probe_priority;
use crate::events::{Bus, Event, EventKind};
use crate::modes::ModeRef;

/// What the scheduler is doing right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Activity {
    /// Bootstrap has not launched anything yet.
    Starting,
    /// No worker is alive (between a reap and the next launch, or after shutdown).
    Vacant,
    /// A worker is running `mode`.
    Running { mode: String },
    /// Stopping `from` (if anything ran) and about to launch `to`.
    Switching { from: Option<String>, to: String },
}

impl Activity {
    fn running_name(&self) -> Option<&str> {
        match self {
            Activity::Running { mode } => Some(mode),
            _ => None,
        }
    }

    fn phase(&self) -> Phase {
        match self {
            Activity::Starting => Phase::Starting,
            Activity::Vacant => Phase::Vacant,
            Activity::Running { .. } => Phase::Running,
            Activity::Switching { .. } => Phase::Switching,
        }
    }
}

/// Coarse scheduler phase, as exposed in snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Bootstrap in progress.
    Starting,
    /// Nothing running.
    Vacant,
    /// A mode is running.
    Running,
    /// A switch is in progress.
    Switching,
}

/// One queued mode in a [`SchedulerSnapshot`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueuedMode {
    /// Mode type name.
    pub name: String,
    /// Priority override given at enqueue time.
    pub priority_override: Option<u32>,
}

/// Consistent view of the scheduler at one instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchedulerSnapshot {
    /// State version the view was taken at.
    pub version: u64,
    /// Current phase.
    pub phase: Phase,
    /// Active mode (the switch target while switching).
    pub active: Option<String>,
    /// Outgoing mode while switching.
    pub outgoing: Option<String>,
    /// Pending modes, in tie-break order.
    pub queued: Vec<QueuedMode>,
}

struct Board {
    queue: ModeQueue,
    activity: Activity,
    version: u64,
}

impl Board {
    fn bump(&mut self) {
        self.version = self.version.wrapping_add(1);
    }
}

/// Shared scheduler state.
pub(crate) struct SchedulerState {
    board: RwLock<Board>,
    bus: Bus,
}

impl SchedulerState {
    pub(crate) fn new(bus: Bus) -> Self {
        Self {
            board: RwLock::new(Board {
                queue: ModeQueue::new(),
                activity: Activity::Starting,
                version: 0,
            }),
            bus,
        }
    }

    /// Queues `mode`, replacing a pending instance of the same type.
    pub(crate) async fn enqueue(&self, mode: ModeRef) -> Enqueued {
        let name = mode.name().to_string();
        let priority = mode.priority_override();
        let outcome = {
            let mut board = self.board.write().await;
            board.bump();
            board.queue.enqueue(mode)
        };
        let kind = match outcome {
            Enqueued::Inserted => EventKind::ModeEnqueued,
            Enqueued::Replaced => EventKind::ModeReplaced,
        };
        self.bus
            .publish(Event::new(kind).with_mode(name).with_priority_opt(priority));
        outcome
    }

    /// Removes and returns the best queued mode whose priority is strictly
    /// greater than `current`, together with that priority.
    ///
    /// On success the activity becomes `Switching` in the same critical
    /// section that removed the winner.
    pub(crate) async fn pop_best_above(
        &self,
        current: u32,
        now: DateTime<Utc>,
    ) -> Option<(ModeRef, u32)> {
        let candidates = self.board.read().await.queue.snapshot();
        if candidates.is_empty() {
            return None;
        }

        let results = join_all(candidates.iter().map(|m| probe_priority(m, now))).await;
        let scores: Vec<u32> = candidates
            .iter()
            .zip(results)
            .map(|(m, res)| {
                res.unwrap_or_else(|reason| {
                    self.bus.publish(
                        Event::new(EventKind::PriorityFailed)
                            .with_mode(m.name())
                            .with_reason(reason),
                    );
                    0
                })
            })
            .collect();

        let idx = select_best(&scores, current)?;
        let winner = candidates[idx].clone();
        let score = scores[idx];

        {
            let mut board = self.board.write().await;
            if !board.queue.remove_if_same(&winner) {
                drop(board);
                self.bus
                    .publish(Event::new(EventKind::SelectionSuperseded).with_mode(winner.name()));
                return None;
            }
            let from = board.activity.running_name().map(str::to_string);
            board.activity = Activity::Switching {
                from,
                to: winner.name().to_string(),
            };
            board.bump();
        }

        self.bus.publish(
            Event::new(EventKind::ModeSelected)
                .with_mode(winner.name())
                .with_priority(score)
                .with_previous(current),
        );
        Some((winner, score))
    }

    /// Completes a switch: re-queues the outgoing instance (if any) and marks
    /// `to` as running, atomically.
    pub(crate) async fn finish_switch(&self, to: &str, requeue: Option<ModeRef>) {
        let requeued = requeue.as_ref().map(|m| m.name().to_string());
        {
            let mut board = self.board.write().await;
            if let Some(m) = requeue {
                board.queue.enqueue(m);
            }
            board.activity = Activity::Running {
                mode: to.to_string(),
            };
            board.bump();
        }
        if let Some(name) = requeued {
            self.bus
                .publish(Event::new(EventKind::ModeRequeued).with_mode(name));
        }
    }

    /// Marks `mode` as running without going through the queue (fallback).
    pub(crate) async fn set_running(&self, mode: &str) {
        let mut board = self.board.write().await;
        board.activity = Activity::Running {
            mode: mode.to_string(),
        };
        board.bump();
    }

    /// Records that the worker is gone, re-queueing a fresh instance if given.
    pub(crate) async fn retire(&self, requeue: Option<ModeRef>) {
        let requeued = requeue.as_ref().map(|m| m.name().to_string());
        {
            let mut board = self.board.write().await;
            if let Some(m) = requeue {
                board.queue.enqueue(m);
            }
            board.activity = Activity::Vacant;
            board.bump();
        }
        if let Some(name) = requeued {
            self.bus
                .publish(Event::new(EventKind::ModeRequeued).with_mode(name));
        }
    }

    /// Name of the active mode; while switching, the incoming one.
    pub(crate) async fn active_mode(&self) -> Option<String> {
        match &self.board.read().await.activity {
            Activity::Running { mode } => Some(mode.clone()),
            Activity::Switching { to, .. } => Some(to.clone()),
            Activity::Starting | Activity::Vacant => None,
        }
    }

    pub(crate) async fn snapshot(&self) -> SchedulerSnapshot {
        let board = self.board.read().await;
        let (active, outgoing) = match &board.activity {
            Activity::Running { mode } => (Some(mode.clone()), None),
            Activity::Switching { from, to } => (Some(to.clone()), from.clone()),
            Activity::Starting | Activity::Vacant => (None, None),
        };
        SchedulerSnapshot {
            version: board.version,
            phase: board.activity.phase(),
            active,
            outgoing,
            queued: board
                .queue
                .iter()
                .map(|m| QueuedMode {
                    name: m.name().to_string(),
                    priority_override: m.priority_override(),
                })
                .collect(),
        }
    }

    #[cfg(test)]
    pub(crate) async fn queued_names(&self) -> Vec<String> {
        let board = self.board.read().await;
        board.queue.iter().map(|m| m.name().to_string()).collect()
    }
}

impl fmt::Debug for SchedulerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchedulerState").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModeError;
    use crate::modes::{ModeInstance, ModePolicy};
    use async_trait::async_trait;
    use std::sync::Arc;
    use tokio::sync::Notify;

    struct Fixed(&'static str, u32);

    #[async_trait]
    impl ModePolicy for Fixed {
        fn name(&self) -> &str {
            self.0
        }
        async fn priority(&self, _now: DateTime<Utc>) -> Result<u32, ModeError> {
            Ok(self.1)
        }
        async fn step(&self, _now: DateTime<Utc>) -> Result<(), ModeError> {
            Ok(())
        }
    }

    /// Reports its priority only once released.
    struct Gated(Arc<Notify>, Arc<Notify>);

    #[async_trait]
    impl ModePolicy for Gated {
        fn name(&self) -> &str {
            "gated"
        }
        async fn priority(&self, _now: DateTime<Utc>) -> Result<u32, ModeError> {
            self.0.notify_one();
            self.1.notified().await;
            Ok(9)
        }
        async fn step(&self, _now: DateTime<Utc>) -> Result<(), ModeError> {
            Ok(())
        }
    }

    struct Failing;

    #[async_trait]
    impl ModePolicy for Failing {
        fn name(&self) -> &str {
            "failing"
        }
        async fn priority(&self, _now: DateTime<Utc>) -> Result<u32, ModeError> {
            Err(ModeError::fail("presence down"))
        }
        async fn step(&self, _now: DateTime<Utc>) -> Result<(), ModeError> {
            Ok(())
        }
    }

    fn fixed(name: &'static str, p: u32) -> ModeRef {
        ModeInstance::arc(Box::new(Fixed(name, p)), None)
    }

    #[tokio::test]
    async fn picks_highest_and_marks_switch() {
        let state = SchedulerState::new(Bus::new(64));
        state.enqueue(fixed("idle", 1)).await;
        state.enqueue(fixed("a", 2)).await;
        state.enqueue(fixed("b", 3)).await;

        let (winner, p) = state.pop_best_above(0, Utc::now()).await.unwrap();
        assert_eq!((winner.name(), p), ("b", 3));
        assert_eq!(state.active_mode().await.as_deref(), Some("b"));
        assert_eq!(state.queued_names().await, vec!["idle", "a"]);

        let snap = state.snapshot().await;
        assert_eq!(snap.phase, Phase::Switching);
        assert_eq!(snap.outgoing, None);
    }

    #[tokio::test]
    async fn ties_do_not_preempt() {
        let state = SchedulerState::new(Bus::new(64));
        state.enqueue(fixed("a", 2)).await;
        assert!(state.pop_best_above(2, Utc::now()).await.is_none());
        assert_eq!(state.queued_names().await, vec!["a"]);
    }

    #[tokio::test]
    async fn failing_priority_counts_as_zero() {
        let bus = Bus::new(64);
        let mut rx = bus.subscribe();
        let state = SchedulerState::new(bus);
        state
            .enqueue(ModeInstance::arc(Box::new(Failing), None))
            .await;

        assert!(state.pop_best_above(0, Utc::now()).await.is_none());
        let kinds: Vec<EventKind> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|e| e.kind)
            .collect();
        assert!(kinds.contains(&EventKind::PriorityFailed));
    }

    #[tokio::test]
    async fn replacement_during_arbitration_supersedes_winner() {
        let state = Arc::new(SchedulerState::new(Bus::new(64)));
        let (entered, release) = (Arc::new(Notify::new()), Arc::new(Notify::new()));
        state
            .enqueue(ModeInstance::arc(
                Box::new(Gated(entered.clone(), release.clone())),
                None,
            ))
            .await;

        let arbiter = {
            let state = state.clone();
            tokio::spawn(async move { state.pop_best_above(0, Utc::now()).await })
        };

        entered.notified().await;
        let version = state.snapshot().await.version;
        state
            .enqueue(ModeInstance::arc(Box::new(Fixed("gated", 0)), Some(0)))
            .await;
        release.notify_one();

        assert!(arbiter.await.unwrap().is_none());
        let snap = state.snapshot().await;
        assert!(snap.version > version);
        assert_eq!(snap.queued.len(), 1);
        assert_eq!(snap.queued[0].priority_override, Some(0));
        assert_eq!(snap.active, None);
    }

    #[tokio::test]
    async fn finish_switch_requeues_outgoing_atomically() {
        let state = SchedulerState::new(Bus::new(64));
        state.set_running("away").await;
        state.enqueue(fixed("party", 5)).await;

        let (winner, _) = state.pop_best_above(2, Utc::now()).await.unwrap();
        assert_eq!(state.snapshot().await.outgoing.as_deref(), Some("away"));

        state.finish_switch(winner.name(), Some(fixed("away", 2))).await;
        let snap = state.snapshot().await;
        assert_eq!(snap.phase, Phase::Running);
        assert_eq!(snap.active.as_deref(), Some("party"));
        assert_eq!(snap.queued, vec![QueuedMode { name: "away".into(), priority_override: None }]);
    }
}
