//! Step retry policies.
//!
//! - [`StepRetryPolicy`] how many failing steps a worker tolerates and how long it waits
//! - [`JitterPolicy`] randomization of the retry delay
//!
//! ```text
//! SchedulerConfig { step_retry: StepRetryPolicy }
//!      └─► core::worker::Worker uses:
//!           - step_retry.delay(failures) to schedule the next attempt, or give up
//! ```

mod jitter;
mod retry;

pub use jitter::JitterPolicy;
pub use retry::StepRetryPolicy;
