//! # LogWriter: events as `tracing` records
//!
//! Turns every [`Event`] into one structured `tracing` record under the
//! `modevisor::events` target. Failures log at `warn`, lifecycle at `info`,
//! queue chatter at `debug`.
//!
//! ## Example output (fmt layer)
//! ```text
//! INFO modevisor::events: mode selected mode="away" priority=2 previous=1
//! INFO modevisor::events: mode starting mode="away" priority=2
//! WARN modevisor::events: step failed mode="away" attempt=1 reason="collaborator lights unavailable"
//! INFO modevisor::events: mode stopped mode="idle" reason="stopped"
//! ```

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

const TARGET: &str = "modevisor::events";

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let mode = e.mode.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("");

        match e.kind {
            EventKind::ModeEnqueued => {
                debug!(target: TARGET, mode, priority_override = ?e.priority, "mode enqueued")
            }
            EventKind::ModeReplaced => {
                debug!(target: TARGET, mode, priority_override = ?e.priority, "mode replaced in queue")
            }
            EventKind::ModeRequeued => debug!(target: TARGET, mode, "mode requeued"),
            EventKind::ModeSelected => info!(
                target: TARGET, mode, priority = ?e.priority, previous = ?e.previous, "mode selected"
            ),
            EventKind::SelectionSuperseded => {
                debug!(target: TARGET, mode, "selection superseded by newer enqueue")
            }
            EventKind::FallbackLaunched => info!(target: TARGET, mode, "fallback launched"),
            EventKind::ModeSwitched => {
                info!(target: TARGET, mode, from = reason, priority = ?e.priority, "mode switched")
            }
            EventKind::ModeStarting => {
                info!(target: TARGET, mode, priority = ?e.priority, "mode starting")
            }
            EventKind::StopRequested => info!(target: TARGET, mode, "stop requested"),
            EventKind::ModeCompleted => info!(target: TARGET, mode, "mode complete"),
            EventKind::ModeStopped => info!(target: TARGET, mode, reason, "mode stopped"),
            EventKind::StepRetryScheduled => debug!(
                target: TARGET, mode, attempt = ?e.attempt, delay_ms = ?e.delay_ms, "step retry scheduled"
            ),
            EventKind::PriorityFailed => warn!(target: TARGET, mode, reason, "priority query failed"),
            EventKind::StepFailed => {
                warn!(target: TARGET, mode, attempt = ?e.attempt, reason, "step failed")
            }
            EventKind::StepPanicked => warn!(target: TARGET, mode, reason, "step panicked"),
            EventKind::CleanupFailed => warn!(target: TARGET, mode, reason, "cleanup failed"),
            EventKind::WorkerDead => warn!(target: TARGET, mode, reason, "worker died"),
            EventKind::SubscriberOverflow => {
                warn!(target: TARGET, subscriber = mode, reason, "subscriber overflow")
            }
            EventKind::SubscriberPanicked => {
                warn!(target: TARGET, subscriber = mode, reason, "subscriber panicked")
            }
            EventKind::ShutdownRequested => info!(target: TARGET, "shutdown requested"),
            EventKind::AllStoppedWithin => info!(target: TARGET, "all stopped within grace"),
            EventKind::GraceExceeded => warn!(target: TARGET, "grace exceeded"),
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
