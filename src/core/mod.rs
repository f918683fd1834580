//! Runtime core: arbitration, execution and lifecycle.
//!
//! The public surface of this module is [`Scheduler`] (with its builder and
//! [`SchedulerHandle`]), [`SchedulerConfig`], and the types those expose.
//!
//! Internal modules:
//! - [`queue`]: one pending slot per mode type, tie-break order;
//! - [`state`]: queue + activity behind one lock, arbitration;
//! - [`runner`]: guarded calls into policies (errors and panics contained);
//! - [`worker`]: runs one mode's step loop and its cleanup;
//! - [`scheduler`]: the arbitration loop and graceful shutdown;
//! - [`shutdown`]: termination signal handling.

mod builder;
pub(crate) mod config;
mod queue;
mod runner;
mod scheduler;
mod shutdown;
mod state;
mod worker;

pub use builder::SchedulerBuilder;
pub use config::SchedulerConfig;
pub use queue::Enqueued;
pub use scheduler::{Scheduler, SchedulerHandle};
pub use state::{Phase, QueuedMode, SchedulerSnapshot};
pub use worker::WorkerExit;
