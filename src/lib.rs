//! # modevisor
//!
//! **Modevisor** decides which household *mode* ("away", "party", "idle", ...)
//! is in charge of the house. Modes compete for a single execution slot by
//! reporting a priority; the highest one runs its step loop until it completes
//! or something more urgent preempts it.
//!
//! ## Architecture
//! ```text
//!   HTTP control plane (axum)              ModeRegistry (static)
//!   POST /mode/queue ──┐                   idle, away, ...
//!   GET  /mode/get     │                          │ fresh instances
//!                      ▼                          ▼
//! ┌──────────────────────────────────────────────────────────────────┐
//! │  Scheduler                                                       │
//! │  - SchedulerState: queue + activity behind one lock              │
//! │  - every poll_interval: reap, compare, preempt, fall back        │
//! │  - Bus (broadcast events) ──► SubscriberSet ──► LogWriter        │
//! └──────────────┬───────────────────────────────────────────────────┘
//!                │ spawn / stop / join (at most one)
//!                ▼
//!        ┌──────────────────┐
//!        │  Worker          │  is_complete? → step() → sleep(tick)
//!        │  (one ModeRef)   │  stop wakes the sleep, cleanup() once
//!        └──────────────────┘
//!                │ side effects
//!                ▼
//!        ServiceSession (reqwest) ──► presence / light services
//! ```
//!
//! ## Arbitration
//! ```text
//! current = running? (complete? 0 : priority() or launch priority) : 0
//! winner  = first queued mode with the strictly greatest priority > current
//! winner  → stop + join current, re-queue a fresh outgoing instance (not idle),
//!           launch winner
//! nothing and nothing running → launch a fresh idle
//! ```
//!
//! ## Features
//! | Area              | Description                                             | Key types / traits                          |
//! |-------------------|---------------------------------------------------------|---------------------------------------------|
//! | **Modes**         | Implement a household behavior.                         | [`ModePolicy`], [`ModeRegistry`]            |
//! | **Scheduling**    | Arbitrate and run modes, graceful shutdown.             | [`Scheduler`], [`SchedulerHandle`]          |
//! | **Subscriber API**| Hook into lifecycle events (logging, metrics, custom).  | [`Subscribe`], [`LogWriter`]                |
//! | **Policies**      | Retry failing steps with backoff and jitter.            | [`StepRetryPolicy`], [`JitterPolicy`]       |
//! | **Control plane** | HTTP surface over a scheduler handle.                   | [`control::router`]                         |
//! | **Errors**        | Typed errors per layer.                                 | [`RuntimeError`], [`ModeError`], ...        |
//! | **Configuration** | TOML service config.                                    | [`ServiceConfig`], [`SchedulerConfig`]      |
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use modevisor::{LogWriter, ModeRegistry, Scheduler, SchedulerConfig, Subscribe};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), modevisor::RuntimeError> {
//!     let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
//!     let sched = Scheduler::builder(ModeRegistry::new())
//!         .with_config(SchedulerConfig::default())
//!         .with_subscribers(subs)
//!         .build();
//!
//!     let handle = sched.handle();
//!     assert_eq!(handle.mode_names(), vec!["idle"]);
//!
//!     // Stop right after bootstrap.
//!     sched.shutdown();
//!     sched.run().await?;
//!     assert_eq!(handle.active_mode().await, None);
//!     Ok(())
//! }
//! ```

mod config;
pub mod control;
mod core;
mod envelope;
mod error;
mod events;
pub mod modes;
mod policies;
mod session;
mod subscribers;

// ---- Public re-exports ----

pub use crate::config::{IdleConfig, ServerConfig, ServiceConfig, SessionsConfig};
pub use crate::core::{
    Enqueued, Phase, QueuedMode, Scheduler, SchedulerBuilder, SchedulerConfig, SchedulerHandle,
    SchedulerSnapshot, WorkerExit,
};
pub use envelope::Envelope;
pub use error::{ConfigError, ControlError, ModeError, RuntimeError, SessionError};
pub use events::{Bus, Event, EventKind};
pub use modes::{
    AwayConfig, AwayMode, IdleMode, ModeFactory, ModeInstance, ModePolicy, ModeRef, ModeRegistry,
    AWAY_MODE, IDLE_MODE, IDLE_PRIORITY,
};
pub use policies::{JitterPolicy, StepRetryPolicy};
pub use session::{ServiceSession, SessionConfig};
pub use subscribers::{LogWriter, Subscribe, SubscriberSet};
