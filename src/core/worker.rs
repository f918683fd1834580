//! # Execution worker: runs exactly one mode instance.
//!
//! A [`Worker`] owns the running [`ModeRef`], its stop token and the join
//! handle of the task driving it. The scheduler keeps at most one alive.
//!
//! ## Loop
//! ```text
//! spawn(mode) ── publish ModeStarting
//!   loop {
//!     ├─► is_complete()? ── yes ──► ModeCompleted ─────────────┐
//!     ├─► run_step(now)                                        │
//!     │     ├─ Done     → failures = 0                         │
//!     │     ├─ Failed   → failures += 1                        │
//!     │     │             ├─ fatal / retries exhausted ────────┤ Failed
//!     │     │             └─ StepRetryScheduled, sleep(delay) ─┤ (stop wakes) Stopped
//!     │     └─ Panicked ───────────────────────────────────────┤ Panicked
//!     ├─► stop requested? ─────────────────────────────────────┤ Stopped
//!     └─► sleep(tick_interval) (stop wakes) ───────────────────┘
//!   }
//!   run_cleanup() (exactly once) ── publish ModeStopped{reason = exit label}
//! ```
//!
//! ## Rules
//! - A stop never interrupts `step()`; it is observed as soon as the step
//!   returns (success or failure) and cuts the tick (or retry) sleep short.
//!   No step starts after a stop was requested, even with a zero delay.
//! - `cleanup()` runs exactly once whatever ended the loop.
//! - The exit reason is returned from [`Worker::join`].

use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tokio::select;
use tokio_util::sync::CancellationToken;

use crate::core::runner::{probe_complete, run_cleanup, run_step, StepOutcome};
use crate::events::{Bus, Event, EventKind};
use crate::modes::ModeRef;
use crate::policies::StepRetryPolicy;
use crate::subscribers::panic_message;

/// Why a worker's loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    /// The mode reported itself complete.
    Completed,
    /// The scheduler requested a stop.
    Stopped,
    /// Steps kept failing past the retry budget (or failed fatally).
    Failed {
        /// Consecutive failures at exit.
        failures: u32,
    },
    /// `step()` panicked.
    Panicked,
    /// The worker task itself died before reporting (join error).
    Dead,
}

impl WorkerExit {
    /// Short stable label (snake_case) for logs and events.
    pub fn as_label(&self) -> &'static str {
        match self {
            WorkerExit::Completed => "completed",
            WorkerExit::Stopped => "stopped",
            WorkerExit::Failed { .. } => "failed",
            WorkerExit::Panicked => "panicked",
            WorkerExit::Dead => "dead",
        }
    }
}

/// Handle to the task running one mode.
pub(crate) struct Worker {
    mode: ModeRef,
    launch_priority: u32,
    started: Instant,
    stop: CancellationToken,
    join: JoinHandle<WorkerExit>,
    bus: Bus,
}

impl Worker {
    /// Spawns a worker for `mode` launched at `launch_priority`.
    pub(crate) fn spawn(mode: ModeRef, launch_priority: u32, retry: StepRetryPolicy, bus: Bus) -> Self {
        let stop = CancellationToken::new();
        bus.publish(
            Event::new(EventKind::ModeStarting)
                .with_mode(mode.name())
                .with_priority(launch_priority),
        );
        let join = tokio::spawn(run(mode.clone(), retry, bus.clone(), stop.clone()));
        Self {
            mode,
            launch_priority,
            started: Instant::now(),
            stop,
            join,
            bus,
        }
    }

    /// The running instance.
    pub(crate) fn mode(&self) -> &ModeRef {
        &self.mode
    }

    /// Priority the mode won with.
    pub(crate) fn launch_priority(&self) -> u32 {
        self.launch_priority
    }

    /// Time since launch.
    pub(crate) fn uptime(&self) -> Duration {
        self.started.elapsed()
    }

    /// True once the loop ended and cleanup ran (or the task died).
    pub(crate) fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Asks the loop to stop at the next step boundary. Idempotent.
    pub(crate) fn request_stop(&self) {
        if !self.stop.is_cancelled() {
            self.bus
                .publish(Event::new(EventKind::StopRequested).with_mode(self.mode.name()));
            self.stop.cancel();
        }
    }

    /// Waits for the loop (and cleanup) to finish.
    pub(crate) async fn join(self) -> WorkerExit {
        match self.join.await {
            Ok(exit) => exit,
            Err(err) => {
                let reason = if err.is_panic() {
                    panic_message(err.into_panic().as_ref())
                } else {
                    "worker task cancelled".to_string()
                };
                self.bus.publish(
                    Event::new(EventKind::WorkerDead)
                        .with_mode(self.mode.name())
                        .with_reason(reason),
                );
                WorkerExit::Dead
            }
        }
    }
}

async fn run(mode: ModeRef, retry: StepRetryPolicy, bus: Bus, stop: CancellationToken) -> WorkerExit {
    let exit = step_loop(&mode, &retry, &bus, &stop).await;

    run_cleanup(&mode, &bus).await;
    bus.publish(
        Event::new(EventKind::ModeStopped)
            .with_mode(mode.name())
            .with_reason(exit.as_label()),
    );
    exit
}

async fn step_loop(
    mode: &ModeRef,
    retry: &StepRetryPolicy,
    bus: &Bus,
    stop: &CancellationToken,
) -> WorkerExit {
    let mut failures: u32 = 0;

    loop {
        if probe_complete(mode).await {
            bus.publish(Event::new(EventKind::ModeCompleted).with_mode(mode.name()));
            return WorkerExit::Completed;
        }

        match run_step(mode, Utc::now(), failures + 1, bus).await {
            StepOutcome::Done => failures = 0,
            StepOutcome::Panicked => return WorkerExit::Panicked,
            StepOutcome::Failed(err) => {
                failures += 1;
                let delay = if err.is_retryable() {
                    retry.delay(failures)
                } else {
                    None
                };
                let Some(delay) = delay else {
                    return WorkerExit::Failed { failures };
                };

                if stop.is_cancelled() {
                    return WorkerExit::Stopped;
                }
                bus.publish(
                    Event::new(EventKind::StepRetryScheduled)
                        .with_mode(mode.name())
                        .with_attempt(failures)
                        .with_delay(delay),
                );
                select! {
                    biased;
                    _ = stop.cancelled() => return WorkerExit::Stopped,
                    _ = time::sleep(delay) => continue,
                }
            }
        }

        if stop.is_cancelled() {
            return WorkerExit::Stopped;
        }
        select! {
            biased;
            _ = stop.cancelled() => return WorkerExit::Stopped,
            _ = time::sleep(mode.tick_interval()) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModeError;
    use crate::modes::{ModeInstance, ModePolicy};
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct Counters {
        steps: AtomicU32,
        cleanups: AtomicU32,
    }

    struct Scripted {
        c: Arc<Counters>,
        complete_after: Option<u32>,
        fail: bool,
        step_time: Duration,
    }

    #[async_trait]
    impl ModePolicy for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }
        async fn priority(&self, _now: DateTime<Utc>) -> Result<u32, ModeError> {
            Ok(1)
        }
        async fn step(&self, _now: DateTime<Utc>) -> Result<(), ModeError> {
            self.c.steps.fetch_add(1, Ordering::SeqCst);
            if !self.step_time.is_zero() {
                time::sleep(self.step_time).await;
            }
            if self.fail {
                return Err(ModeError::fail("nope"));
            }
            Ok(())
        }
        async fn is_complete(&self) -> bool {
            self.complete_after
                .is_some_and(|n| self.c.steps.load(Ordering::SeqCst) >= n)
        }
        async fn cleanup(&self) -> Result<(), ModeError> {
            self.c.cleanups.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        fn tick_interval(&self) -> Duration {
            Duration::from_secs(10)
        }
    }

    fn spawn_scripted(script: Scripted, retry: StepRetryPolicy) -> Worker {
        let mode = ModeInstance::arc(Box::new(script), None);
        Worker::spawn(mode, 1, retry, Bus::new(64))
    }

    fn worker(c: &Arc<Counters>, complete_after: Option<u32>, fail: bool, retry: StepRetryPolicy) -> Worker {
        let script = Scripted {
            c: c.clone(),
            complete_after,
            fail,
            step_time: Duration::ZERO,
        };
        spawn_scripted(script, retry)
    }

    /// Worker whose every step takes one second.
    fn slow_worker(c: &Arc<Counters>, fail: bool, retry: StepRetryPolicy) -> Worker {
        let script = Scripted {
            c: c.clone(),
            complete_after: None,
            fail,
            step_time: Duration::from_secs(1),
        };
        spawn_scripted(script, retry)
    }

    fn immediate_retry() -> StepRetryPolicy {
        StepRetryPolicy {
            max_retries: 100,
            first: Duration::ZERO,
            factor: 1.0,
            max: Duration::ZERO,
            jitter: crate::policies::JitterPolicy::None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn completes_then_cleans_up_once() {
        let c = Arc::new(Counters::default());
        let w = worker(&c, Some(3), false, StepRetryPolicy::never());

        assert_eq!(w.join().await, WorkerExit::Completed);
        assert_eq!(c.steps.load(Ordering::SeqCst), 3);
        assert_eq!(c.cleanups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_wakes_the_tick_sleep() {
        let c = Arc::new(Counters::default());
        let w = worker(&c, None, false, StepRetryPolicy::never());

        time::sleep(Duration::from_secs(1)).await;
        let before = Instant::now();
        w.request_stop();
        w.request_stop();
        assert_eq!(w.join().await, WorkerExit::Stopped);

        assert!(before.elapsed() < Duration::from_secs(10));
        assert_eq!(c.steps.load(Ordering::SeqCst), 1);
        assert_eq!(c.cleanups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failing_steps_exhaust_the_retry_budget() {
        let c = Arc::new(Counters::default());
        let retry = StepRetryPolicy {
            max_retries: 2,
            first: Duration::from_secs(1),
            factor: 2.0,
            max: Duration::from_secs(4),
            jitter: crate::policies::JitterPolicy::None,
        };
        let w = worker(&c, None, true, retry);

        assert_eq!(w.join().await, WorkerExit::Failed { failures: 3 });
        assert_eq!(c.steps.load(Ordering::SeqCst), 3);
        assert_eq!(c.cleanups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_during_a_successful_step_lets_it_finish() {
        let c = Arc::new(Counters::default());
        let w = slow_worker(&c, false, StepRetryPolicy::never());

        time::sleep(Duration::from_millis(500)).await;
        assert_eq!(c.steps.load(Ordering::SeqCst), 1);
        w.request_stop();

        assert_eq!(w.join().await, WorkerExit::Stopped);
        assert_eq!(c.steps.load(Ordering::SeqCst), 1);
        assert_eq!(c.cleanups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_during_a_failing_step_skips_an_immediate_retry() {
        for _ in 0..40 {
            let c = Arc::new(Counters::default());
            let w = slow_worker(&c, true, immediate_retry());

            time::sleep(Duration::from_millis(500)).await;
            w.request_stop();

            assert_eq!(w.join().await, WorkerExit::Stopped);
            assert_eq!(c.steps.load(Ordering::SeqCst), 1);
            assert_eq!(c.cleanups.load(Ordering::SeqCst), 1);
        }
    }
}
