//! # Guarded calls into mode policies.
//!
//! Every call the runtime makes into user code goes through this module so
//! that errors and panics are contained and reported the same way.
//!
//! ```text
//! run_step()     step(now) → Ok            → StepOutcome::Done
//!                          → Err(e)        → publish StepFailed   → StepOutcome::Failed(e)
//!                          → panic         → publish StepPanicked → StepOutcome::Panicked
//!
//! run_cleanup()  cleanup() → Ok            → (nothing)
//!                          → Err / panic   → publish CleanupFailed
//!
//! probe_priority()  priority(now) → Ok(p) | Err(reason)   (panic → Err)
//! probe_complete()  is_complete() → bool                  (panic → false)
//! ```
//!
//! ## Rules
//! - Exactly one event per failed step (`StepFailed` or `StepPanicked`).
//! - Nothing here retries or sleeps; the worker decides what happens next.

use std::panic::AssertUnwindSafe;

use chrono::{DateTime, Utc};
use futures::FutureExt;

use crate::error::ModeError;
use crate::events::{Bus, Event, EventKind};
use crate::modes::ModeInstance;
use crate::subscribers::panic_message;

/// Result of a single guarded step.
#[derive(Debug)]
pub(crate) enum StepOutcome {
    Done,
    Failed(ModeError),
    Panicked,
}

/// Runs one `step()`, publishing the failure event if any.
///
/// `failures` is the number of consecutive failures *including* this one if it fails.
pub(crate) async fn run_step(
    mode: &ModeInstance,
    now: DateTime<Utc>,
    failures: u32,
    bus: &Bus,
) -> StepOutcome {
    match AssertUnwindSafe(mode.step(now)).catch_unwind().await {
        Ok(Ok(())) => StepOutcome::Done,
        Ok(Err(e)) => {
            bus.publish(
                Event::new(EventKind::StepFailed)
                    .with_mode(mode.name())
                    .with_attempt(failures)
                    .with_reason(e.to_string()),
            );
            StepOutcome::Failed(e)
        }
        Err(panic) => {
            bus.publish(
                Event::new(EventKind::StepPanicked)
                    .with_mode(mode.name())
                    .with_reason(panic_message(panic.as_ref())),
            );
            StepOutcome::Panicked
        }
    }
}

/// Runs `cleanup()`; errors and panics are published, never propagated.
pub(crate) async fn run_cleanup(mode: &ModeInstance, bus: &Bus) {
    let reason = match AssertUnwindSafe(mode.cleanup()).catch_unwind().await {
        Ok(Ok(())) => return,
        Ok(Err(e)) => e.to_string(),
        Err(panic) => format!("cleanup panicked: {}", panic_message(panic.as_ref())),
    };
    bus.publish(
        Event::new(EventKind::CleanupFailed)
            .with_mode(mode.name())
            .with_reason(reason),
    );
}

/// Queries the priority; a panic is reported like an error.
pub(crate) async fn probe_priority(mode: &ModeInstance, now: DateTime<Utc>) -> Result<u32, String> {
    match AssertUnwindSafe(mode.priority(now)).catch_unwind().await {
        Ok(Ok(p)) => Ok(p),
        Ok(Err(e)) => Err(e.to_string()),
        Err(panic) => Err(format!("priority panicked: {}", panic_message(panic.as_ref()))),
    }
}

/// Asks whether the mode is done; a panic counts as "not complete".
pub(crate) async fn probe_complete(mode: &ModeInstance) -> bool {
    AssertUnwindSafe(mode.is_complete())
        .catch_unwind()
        .await
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modes::ModePolicy;
    use async_trait::async_trait;

    struct Broken;

    #[async_trait]
    impl ModePolicy for Broken {
        fn name(&self) -> &str {
            "broken"
        }
        async fn priority(&self, _now: DateTime<Utc>) -> Result<u32, ModeError> {
            panic!("no priority today")
        }
        async fn step(&self, _now: DateTime<Utc>) -> Result<(), ModeError> {
            panic!("step exploded")
        }
        async fn is_complete(&self) -> bool {
            panic!("who knows")
        }
        async fn cleanup(&self) -> Result<(), ModeError> {
            Err(ModeError::fail("lights stuck"))
        }
    }

    #[tokio::test]
    async fn panics_are_contained_and_reported() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let mode = ModeInstance::new(Box::new(Broken), None);

        assert!(matches!(
            run_step(&mode, Utc::now(), 1, &bus).await,
            StepOutcome::Panicked
        ));
        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::StepPanicked);
        assert_eq!(ev.reason.as_deref(), Some("step exploded"));

        assert!(probe_priority(&mode, Utc::now()).await.is_err());
        assert!(!probe_complete(&mode).await);

        run_cleanup(&mode, &bus).await;
        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::CleanupFailed);
        assert_eq!(ev.mode.as_deref(), Some("broken"));
    }
}
