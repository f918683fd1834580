//! # Scheduler: arbitrates which mode holds the single execution slot.
//!
//! The [`Scheduler`] owns the event bus, the [`SubscriberSet`], the shared
//! [`SchedulerState`] and the (at most one) execution [`Worker`]. Outside code
//! talks to it through a cloneable [`SchedulerHandle`].
//!
//! ## Loop
//! ```text
//! run()
//!   ├─► subscriber_listener(): Bus ──► SubscriberSet::emit (flushed when run() returns)
//!   ├─► signal_listener():     SIGINT/SIGTERM ──► shutdown token
//!   ├─► bootstrap: enqueue every registered type, then one cycle
//!   └─► every poll_interval (until shutdown):
//!         1. reap      worker finished? join, re-queue fresh instance (not idle)
//!         2. current   0 if none/complete, else priority() (error → launch priority)
//!         3. pop_best_above(current)
//!         4. winner    stop + join current, re-queue fresh outgoing (not idle),
//!                      spawn worker for winner, publish ModeSwitched
//!         5. nothing   and no worker alive → launch fresh idle (FallbackLaunched)
//!
//! shutdown:
//!   publish ShutdownRequested ─► stop worker ─► join within grace
//!                                                ├─ ok      → AllStoppedWithin
//!                                                └─ timeout → GraceExceeded (error)
//! ```
//!
//! ## Rules
//! - At most one worker alive: the outgoing worker is joined before the winner starts.
//! - Preemption needs a **strictly** greater priority; ties keep the incumbent.
//! - `idle` is never re-queued; it comes back through the fallback.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tokio::task::JoinHandle;
use tokio::{select, time};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::core::builder::SchedulerBuilder;
use crate::core::config::SchedulerConfig;
use crate::core::queue::Enqueued;
use crate::core::runner::{probe_complete, probe_priority};
use crate::core::shutdown;
use crate::core::state::{SchedulerSnapshot, SchedulerState};
use crate::core::worker::Worker;
use crate::error::{ControlError, RuntimeError};
use crate::events::{Bus, Event, EventKind};
use crate::modes::{ModeRef, ModeRegistry};
use crate::subscribers::SubscriberSet;

/// Mode arbitration runtime.
pub struct Scheduler {
    cfg: SchedulerConfig,
    registry: ModeRegistry,
    bus: Bus,
    subs: Mutex<Option<SubscriberSet>>,
    state: Arc<SchedulerState>,
    token: CancellationToken,
    started: AtomicBool,
}

impl Scheduler {
    /// Starts building a scheduler over the given registry.
    pub fn builder(registry: ModeRegistry) -> SchedulerBuilder {
        SchedulerBuilder::new(registry)
    }

    pub(crate) fn new_internal(
        cfg: SchedulerConfig,
        registry: ModeRegistry,
        bus: Bus,
        subs: SubscriberSet,
    ) -> Self {
        let state = Arc::new(SchedulerState::new(bus.clone()));
        Self {
            cfg,
            registry,
            bus,
            subs: Mutex::new(Some(subs)),
            state,
            token: CancellationToken::new(),
            started: AtomicBool::new(false),
        }
    }

    /// Cloneable handle for the control plane.
    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle {
            state: Arc::clone(&self.state),
            registry: self.registry.clone(),
        }
    }

    /// Subscribes to the raw event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    /// Requests a graceful shutdown; [`run`](Self::run) returns once it completes.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Token cancelled when shutdown begins (signal or [`shutdown`](Self::shutdown)).
    pub fn shutdown_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Runs the scheduler until a termination signal or [`shutdown`](Self::shutdown).
    ///
    /// Returns [`RuntimeError::GraceExceeded`] if the running mode does not stop
    /// within the configured grace period, and [`RuntimeError::AlreadyRunning`]
    /// when called a second time.
    pub async fn run(&self) -> Result<(), RuntimeError> {
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(RuntimeError::AlreadyRunning);
        }
        let flush = CancellationToken::new();
        let listener = self.subscriber_listener(flush.clone());
        self.signal_listener();

        let mut worker = self.bootstrap().await;
        loop {
            select! {
                _ = time::sleep(self.cfg.poll_interval) => {}
                _ = self.token.cancelled() => break,
            }
            self.cycle(&mut worker).await;
        }
        let result = self.drain(worker).await;

        flush.cancel();
        if let Some(listener) = listener {
            if let Err(e) = listener.await {
                warn!(error = %e, "subscriber listener died");
            }
        }
        result
    }

    /// Forwards bus events to the subscriber set until `flush` is cancelled,
    /// then hands over what is still buffered and waits for subscribers to
    /// process it.
    fn subscriber_listener(&self, flush: CancellationToken) -> Option<JoinHandle<()>> {
        let set = self.subs.lock().ok().and_then(|mut s| s.take())?;
        let mut rx = self.bus.subscribe();
        Some(tokio::spawn(async move {
            loop {
                select! {
                    biased;
                    res = rx.recv() => match res {
                        Ok(ev) => set.emit(&ev),
                        Err(RecvError::Lagged(missed)) => {
                            warn!(missed, "subscriber listener lagged behind the bus");
                        }
                        Err(RecvError::Closed) => break,
                    },
                    _ = flush.cancelled() => {
                        loop {
                            match rx.try_recv() {
                                Ok(ev) => set.emit(&ev),
                                Err(TryRecvError::Lagged(_)) => continue,
                                Err(_) => break,
                            }
                        }
                        break;
                    }
                }
            }
            set.shutdown().await;
        }))
    }

    /// Turns the first termination signal into a shutdown request.
    fn signal_listener(&self) {
        let token = self.token.clone();
        tokio::spawn(async move {
            select! {
                res = shutdown::wait_for_shutdown_signal() => match res {
                    Ok(()) => token.cancel(),
                    Err(e) => warn!(error = %e, "cannot listen for termination signals"),
                },
                _ = token.cancelled() => {}
            }
        });
    }

    async fn bootstrap(&self) -> Option<Worker> {
        for mode in self.registry.instantiate_all() {
            self.state.enqueue(mode).await;
        }
        let mut worker = None;
        self.cycle(&mut worker).await;
        worker
    }

    /// One arbitration cycle.
    async fn cycle(&self, worker: &mut Option<Worker>) {
        if worker.as_ref().is_some_and(Worker::is_finished) {
            if let Some(done) = worker.take() {
                self.reap(done).await;
            }
        }

        let now = Utc::now();
        let current = match worker.as_ref() {
            Some(w) => self.running_priority(w, now).await,
            None => 0,
        };

        match self.state.pop_best_above(current, now).await {
            Some((winner, priority)) => {
                let next = self.switch_to(worker.take(), winner, priority).await;
                *worker = Some(next);
            }
            None if worker.is_none() => *worker = Some(self.launch_fallback(now).await),
            None => {}
        }
    }

    /// Priority the running mode defends its slot with.
    async fn running_priority(&self, worker: &Worker, now: DateTime<Utc>) -> u32 {
        let mode = worker.mode();
        if probe_complete(mode).await {
            return 0;
        }
        match probe_priority(mode, now).await {
            Ok(p) => p,
            Err(reason) => {
                self.bus.publish(
                    Event::new(EventKind::PriorityFailed)
                        .with_mode(mode.name())
                        .with_priority(worker.launch_priority())
                        .with_reason(reason),
                );
                worker.launch_priority()
            }
        }
    }

    /// Joins a worker that ended on its own and frees the slot.
    async fn reap(&self, worker: Worker) {
        let name = worker.mode().name().to_string();
        let uptime = worker.uptime();
        let exit = worker.join().await;
        debug!(mode = %name, exit = exit.as_label(), ?uptime, "worker reaped");
        self.state.retire(self.fresh_instance(&name)).await;
    }

    /// Stops `outgoing` (if any), then launches `winner`.
    async fn switch_to(&self, outgoing: Option<Worker>, winner: ModeRef, priority: u32) -> Worker {
        let mut from = None;
        let mut requeue = None;
        if let Some(w) = outgoing {
            let name = w.mode().name().to_string();
            w.request_stop();
            let exit = w.join().await;
            debug!(mode = %name, exit = exit.as_label(), "outgoing worker joined");
            requeue = self.fresh_instance(&name);
            from = Some(name);
        }

        let to = winner.name().to_string();
        let worker = Worker::spawn(winner, priority, self.cfg.step_retry, self.bus.clone());
        self.state.finish_switch(&to, requeue).await;

        let mut ev = Event::new(EventKind::ModeSwitched)
            .with_mode(to)
            .with_priority(priority);
        if let Some(from) = from {
            ev = ev.with_reason(from);
        }
        self.bus.publish(ev);
        worker
    }

    async fn launch_fallback(&self, now: DateTime<Utc>) -> Worker {
        let idle = self.registry.idle();
        let priority = probe_priority(&idle, now).await.unwrap_or(0);
        self.state.set_running(idle.name()).await;
        self.bus
            .publish(Event::new(EventKind::FallbackLaunched).with_mode(idle.name()));
        Worker::spawn(idle, priority, self.cfg.step_retry, self.bus.clone())
    }

    /// Fresh instance of `name` for the queue, or `None` for idle.
    fn fresh_instance(&self, name: &str) -> Option<ModeRef> {
        if ModeRegistry::is_idle(name) {
            return None;
        }
        self.registry.instantiate(name, None).ok()
    }

    /// Graceful shutdown of the running worker.
    async fn drain(&self, worker: Option<Worker>) -> Result<(), RuntimeError> {
        self.bus.publish(Event::new(EventKind::ShutdownRequested));

        let Some(worker) = worker else {
            self.state.retire(None).await;
            self.bus.publish(Event::new(EventKind::AllStoppedWithin));
            return Ok(());
        };

        let name = worker.mode().name().to_string();
        worker.request_stop();
        let Some(grace) = self.cfg.grace_period() else {
            self.state.retire(None).await;
            return Ok(());
        };

        match time::timeout(grace, worker.join()).await {
            Ok(_) => {
                self.state.retire(None).await;
                self.bus.publish(Event::new(EventKind::AllStoppedWithin));
                Ok(())
            }
            Err(_) => {
                self.bus
                    .publish(Event::new(EventKind::GraceExceeded).with_mode(name.as_str()));
                Err(RuntimeError::GraceExceeded {
                    grace,
                    stuck: Some(name),
                })
            }
        }
    }
}

/// Cloneable control-plane view of a running [`Scheduler`].
#[derive(Clone, Debug)]
pub struct SchedulerHandle {
    state: Arc<SchedulerState>,
    registry: ModeRegistry,
}

impl SchedulerHandle {
    /// Name of the active mode; while a switch is in progress, the incoming one.
    pub async fn active_mode(&self) -> Option<String> {
        self.state.active_mode().await
    }

    /// All registered mode type names.
    pub fn mode_names(&self) -> Vec<String> {
        self.registry.names()
    }

    /// Queues a fresh instance of `name`, optionally with a fixed priority.
    ///
    /// An unknown or empty name is rejected and leaves the state untouched.
    pub async fn enqueue_by_name(
        &self,
        name: &str,
        priority: Option<u32>,
    ) -> Result<Enqueued, ControlError> {
        if name.trim().is_empty() {
            return Err(ControlError::MissingMode);
        }
        let mode = self.registry.instantiate(name, priority)?;
        Ok(self.state.enqueue(mode).await)
    }

    /// Atomic view of the queue and activity.
    pub async fn snapshot(&self) -> SchedulerSnapshot {
        self.state.snapshot().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModeError;
    use crate::modes::ModePolicy;
    use async_trait::async_trait;

    struct Party;

    #[async_trait]
    impl ModePolicy for Party {
        fn name(&self) -> &str {
            "party"
        }
        async fn priority(&self, _now: DateTime<Utc>) -> Result<u32, ModeError> {
            Ok(0)
        }
        async fn step(&self, _now: DateTime<Utc>) -> Result<(), ModeError> {
            Ok(())
        }
    }

    fn scheduler() -> Arc<Scheduler> {
        Scheduler::builder(ModeRegistry::new().register("party", || Party)).build()
    }

    #[tokio::test]
    async fn unknown_or_missing_name_leaves_state_untouched() {
        let handle = scheduler().handle();
        let before = handle.snapshot().await;

        assert_eq!(
            handle.enqueue_by_name("disco", Some(3)).await,
            Err(ControlError::UnknownMode {
                name: "disco".into()
            })
        );
        assert_eq!(
            handle.enqueue_by_name("  ", None).await,
            Err(ControlError::MissingMode)
        );
        assert_eq!(handle.snapshot().await, before);
    }

    #[tokio::test]
    async fn enqueue_by_name_replaces_pending_instance() {
        let handle = scheduler().handle();
        assert_eq!(
            handle.enqueue_by_name("Party", None).await,
            Ok(Enqueued::Inserted)
        );
        assert_eq!(
            handle.enqueue_by_name("party", Some(4)).await,
            Ok(Enqueued::Replaced)
        );

        let snap = handle.snapshot().await;
        assert_eq!(snap.queued.len(), 1);
        assert_eq!(snap.queued[0].priority_override, Some(4));
        assert_eq!(handle.mode_names(), vec!["idle", "party"]);
    }

    #[tokio::test(start_paused = true)]
    async fn run_twice_is_rejected() {
        let sched = scheduler();
        let runner = {
            let sched = sched.clone();
            tokio::spawn(async move { sched.run().await })
        };
        time::sleep(std::time::Duration::from_millis(10)).await;

        assert!(matches!(sched.run().await, Err(RuntimeError::AlreadyRunning)));
        sched.shutdown();
        assert!(runner.await.unwrap().is_ok());
    }
}
