//! Runtime events: types and broadcast bus.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `Scheduler` loop, `SchedulerState` (queue changes),
//!   `Worker` / `runner` (step lifecycle), `SubscriberSet` workers (overflow/panic).
//! - **Consumers**: `Scheduler::subscriber_listener()` which fans out to the `SubscriberSet`.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
