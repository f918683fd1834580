//! # Mode queue: one pending slot per mode type.
//!
//! Plain data structure without locking; it lives inside
//! [`SchedulerState`](super::state::SchedulerState) which guards it together
//! with the scheduler activity.
//!
//! ```text
//! slots:  [ idle ][ away(override=5) ][ party ]
//!            0            1              2        ← insertion order = tie-break order
//!
//! enqueue(away')  → slot 1 now holds away'       (Replaced, order kept)
//! enqueue(movie)  → appended as slot 3           (Inserted)
//! ```
//!
//! ## Rules
//! - Never two instances of the same type.
//! - A replacement keeps the slot (and thus the tie-break rank) of the old instance.
//! - Removal after arbitration is identity-checked (`Arc::ptr_eq`): a winner
//!   that was replaced meanwhile is not removed.

use std::sync::Arc;

use crate::modes::ModeRef;

/// Outcome of queueing a mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueued {
    /// The type was not queued; a new slot was appended.
    Inserted,
    /// An instance of the same type was queued and has been replaced in place.
    Replaced,
}

/// Ordered pending instances, at most one per type.
#[derive(Debug, Default)]
pub(crate) struct ModeQueue {
    slots: Vec<ModeRef>,
}

impl ModeQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Inserts `mode`, replacing a queued instance of the same type in its slot.
    pub(crate) fn enqueue(&mut self, mode: ModeRef) -> Enqueued {
        match self.slots.iter_mut().find(|m| m.name() == mode.name()) {
            Some(slot) => {
                *slot = mode;
                Enqueued::Replaced
            }
            None => {
                self.slots.push(mode);
                Enqueued::Inserted
            }
        }
    }

    /// Shared handles to all queued instances, in slot order.
    pub(crate) fn snapshot(&self) -> Vec<ModeRef> {
        self.slots.clone()
    }

    /// Removes `mode` only if that very instance still occupies its type's slot.
    pub(crate) fn remove_if_same(&mut self, mode: &ModeRef) -> bool {
        match self.slots.iter().position(|m| Arc::ptr_eq(m, mode)) {
            Some(idx) => {
                self.slots.remove(idx);
                true
            }
            None => false,
        }
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, name: &str) -> bool {
        self.slots.iter().any(|m| m.name() == name)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &ModeRef> {
        self.slots.iter()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }
}

/// Index of the first strictly greatest score, provided it beats `above`.
///
/// Ties go to the earlier slot; a score equal to `above` never wins.
pub(crate) fn select_best(scores: &[u32], above: u32) -> Option<usize> {
    let mut best: Option<(usize, u32)> = None;
    for (idx, &score) in scores.iter().enumerate() {
        let bar = best.map_or(above, |(_, b)| b);
        if score > bar {
            best = Some((idx, score));
        }
    }
    best.map(|(idx, _)| idx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModeError;
    use crate::modes::{ModeInstance, ModePolicy};
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};

    struct Named(&'static str);

    #[async_trait]
    impl ModePolicy for Named {
        fn name(&self) -> &str {
            self.0
        }
        async fn priority(&self, _now: DateTime<Utc>) -> Result<u32, ModeError> {
            Ok(0)
        }
        async fn step(&self, _now: DateTime<Utc>) -> Result<(), ModeError> {
            Ok(())
        }
    }

    fn mode(name: &'static str, p: Option<u32>) -> ModeRef {
        ModeInstance::arc(Box::new(Named(name)), p)
    }

    #[test]
    fn replace_keeps_slot_and_last_wins() {
        let mut q = ModeQueue::new();
        assert_eq!(q.enqueue(mode("a", None)), Enqueued::Inserted);
        assert_eq!(q.enqueue(mode("b", None)), Enqueued::Inserted);
        assert_eq!(q.enqueue(mode("a", Some(7))), Enqueued::Replaced);

        let names: Vec<&str> = q.iter().map(|m| m.name()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(q.snapshot()[0].priority_override(), Some(7));
        assert_eq!(q.len(), 2);
    }

    #[test]
    fn stale_winner_is_not_removed() {
        let mut q = ModeQueue::new();
        let old = mode("a", None);
        q.enqueue(old.clone());
        q.enqueue(mode("a", Some(3)));

        assert!(!q.remove_if_same(&old));
        assert!(q.contains("a"));

        let current = q.snapshot().remove(0);
        assert!(q.remove_if_same(&current));
        assert!(!q.contains("a"));
    }

    #[test]
    fn select_best_is_strict_and_first_wins_ties() {
        assert_eq!(select_best(&[1, 3, 2, 3], 0), Some(1));
        assert_eq!(select_best(&[1, 2], 2), None);
        assert_eq!(select_best(&[0, 0], 0), None);
        assert_eq!(select_best(&[], 0), None);
        assert_eq!(select_best(&[2, 5], 4), Some(1));
    }
}
