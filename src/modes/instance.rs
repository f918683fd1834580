//! # Mode instance: a policy plus its enqueue-time priority override.
//!
//! [`ModeInstance`] is what the queue and the worker actually hold. It wraps a
//! boxed [`ModePolicy`] and enforces the override rule in one place: when an
//! override was supplied, [`ModeInstance::priority`] returns it without ever
//! calling the policy (an override of `0` makes the mode inert).
//!
//! The common handle type is [`ModeRef`] (`Arc<ModeInstance>`): the queue
//! shares it with the arbitration snapshot, then hands it to exactly one worker.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::ModeError;
use crate::modes::policy::ModePolicy;

/// Shared handle to a mode instance.
pub type ModeRef = Arc<ModeInstance>;

/// One schedulable mode instance.
pub struct ModeInstance {
    policy: Box<dyn ModePolicy>,
    priority_override: Option<u32>,
}

impl ModeInstance {
    /// Wraps a policy with an optional priority override.
    pub fn new(policy: Box<dyn ModePolicy>, priority_override: Option<u32>) -> Self {
        Self {
            policy,
            priority_override,
        }
    }

    /// Wraps a policy and returns it as a shared [`ModeRef`].
    pub fn arc(policy: Box<dyn ModePolicy>, priority_override: Option<u32>) -> ModeRef {
        Arc::new(Self::new(policy, priority_override))
    }

    /// Type name of the wrapped policy.
    pub fn name(&self) -> &str {
        self.policy.name()
    }

    /// The override supplied at enqueue time, if any.
    pub fn priority_override(&self) -> Option<u32> {
        self.priority_override
    }

    /// Current priority: the override if present, otherwise the policy's own.
    pub async fn priority(&self, now: DateTime<Utc>) -> Result<u32, ModeError> {
        match self.priority_override {
            Some(p) => Ok(p),
            None => self.policy.priority(now).await,
        }
    }

    /// See [`ModePolicy::step`].
    pub async fn step(&self, now: DateTime<Utc>) -> Result<(), ModeError> {
        self.policy.step(now).await
    }

    /// See [`ModePolicy::is_complete`].
    pub async fn is_complete(&self) -> bool {
        self.policy.is_complete().await
    }

    /// See [`ModePolicy::cleanup`].
    pub async fn cleanup(&self) -> Result<(), ModeError> {
        self.policy.cleanup().await
    }

    /// See [`ModePolicy::tick_interval`].
    pub fn tick_interval(&self) -> Duration {
        self.policy.tick_interval()
    }
}

impl fmt::Debug for ModeInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModeInstance")
            .field("name", &self.name())
            .field("priority_override", &self.priority_override)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting(Arc<AtomicUsize>);

    #[async_trait]
    impl ModePolicy for Counting {
        fn name(&self) -> &str {
            "counting"
        }
        async fn priority(&self, _now: DateTime<Utc>) -> Result<u32, ModeError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(7)
        }
        async fn step(&self, _now: DateTime<Utc>) -> Result<(), ModeError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn computed_priority_without_override() {
        let calls = Arc::new(AtomicUsize::new(0));
        let m = ModeInstance::new(Box::new(Counting(calls.clone())), None);
        assert_eq!(m.priority(Utc::now()).await.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn override_bypasses_policy_even_when_zero() {
        let calls = Arc::new(AtomicUsize::new(0));
        let inert = ModeInstance::new(Box::new(Counting(calls.clone())), Some(0));
        let forced = ModeInstance::new(Box::new(Counting(calls.clone())), Some(9));

        assert_eq!(inert.priority(Utc::now()).await.unwrap(), 0);
        assert_eq!(forced.priority(Utc::now()).await.unwrap(), 9);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
