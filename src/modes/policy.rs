//! # Mode policy contract.
//!
//! A mode is a long-running household behavior ("away", "party", "idle") that
//! competes for the single execution slot. The scheduler only ever talks to
//! modes through [`ModePolicy`] trait objects.
//!
//! ## Lifecycle as seen by a policy
//! ```text
//! registry factory ──► queued (priority() polled every cycle)
//!                        │ wins arbitration
//!                        ▼
//!                      worker loop:  is_complete()? ─ yes ─► cleanup()
//!                                         │ no
//!                                         ▼
//!                                      step() ──► stop requested? ─ yes ─► cleanup()
//!                                         ▲           │ no
//!                                         └─ sleep(tick_interval()) ◄┘
//! ```
//!
//! ## Rules
//! - `priority()` may be called on a queued instance while another instance of
//!   the same type is running: never share mutable state between instances.
//! - An instance is never re-activated; state resets on re-queue unless the
//!   policy persists it elsewhere.
//! - Collaborator failures should be degraded locally (priority 0, skipped side
//!   effect) rather than returned.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::ModeError;

/// # Schedulable household behavior.
///
/// Methods take `&self`; a policy that keeps state between steps uses interior
/// mutability (`std::sync::Mutex`, atomics).
///
/// # Example
/// ```
/// use std::time::Duration;
/// use async_trait::async_trait;
/// use chrono::{DateTime, Utc};
/// use modevisor::{ModeError, ModePolicy};
///
/// struct Party;
///
/// #[async_trait]
/// impl ModePolicy for Party {
///     fn name(&self) -> &str { "party" }
///
///     async fn priority(&self, _now: DateTime<Utc>) -> Result<u32, ModeError> {
///         Ok(0) // only runs when forced through the control plane
///     }
///
///     async fn step(&self, _now: DateTime<Utc>) -> Result<(), ModeError> {
///         Ok(())
///     }
///
///     fn tick_interval(&self) -> Duration { Duration::from_secs(30) }
/// }
/// ```
#[async_trait]
pub trait ModePolicy: Send + Sync + 'static {
    /// Stable type identifier (registry key, lower-case).
    fn name(&self) -> &str;

    /// How badly the mode wants to run: `0` = not at all, larger = more urgent.
    async fn priority(&self, now: DateTime<Utc>) -> Result<u32, ModeError>;

    /// Performs one unit of work.
    async fn step(&self, now: DateTime<Utc>) -> Result<(), ModeError>;

    /// Returns true once the mode has nothing left to do.
    ///
    /// Checked immediately before every step.
    async fn is_complete(&self) -> bool {
        false
    }

    /// Runs exactly once after the step loop exits.
    async fn cleanup(&self) -> Result<(), ModeError> {
        Ok(())
    }

    /// Sleep between two steps.
    fn tick_interval(&self) -> Duration {
        Duration::from_secs(60)
    }
}
