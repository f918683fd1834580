//! # Event subscribers for the modevisor runtime.
//!
//! ```text
//! Scheduler / Worker ── publish(Event) ──► Bus ──► subscriber_listener
//!                                                      │
//!                                                      ▼
//!                                                SubscriberSet
//!                                            ┌─────────┼─────────┐
//!                                            ▼         ▼         ▼
//!                                        LogWriter  Metrics   Custom
//! ```

mod log;
mod set;
mod subscribe;

pub use log::LogWriter;
pub use set::SubscriberSet;
pub(crate) use set::panic_message;
pub use subscribe::Subscribe;
