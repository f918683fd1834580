//! # Step retry policy for execution workers.
//!
//! When a mode's `step()` returns a retryable error, the worker does not give
//! up on the mode right away: it waits `first × factor^n` (clamped to `max`,
//! then jittered) and tries again. After `max_retries` consecutive failures the
//! worker ends its loop with [`WorkerExit::Failed`](crate::WorkerExit::Failed),
//! and the scheduler falls back to the next-best mode.
//!
//! A successful step resets the failure count.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use modevisor::{JitterPolicy, StepRetryPolicy};
//!
//! let retry = StepRetryPolicy {
//!     max_retries: 3,
//!     first: Duration::from_secs(1),
//!     factor: 2.0,
//!     max: Duration::from_secs(10),
//!     jitter: JitterPolicy::None,
//! };
//!
//! assert_eq!(retry.delay(1), Some(Duration::from_secs(1)));
//! assert_eq!(retry.delay(3), Some(Duration::from_secs(4)));
//! assert_eq!(retry.delay(4), None); // exhausted
//! ```

use std::time::Duration;

use serde::Deserialize;

use crate::policies::jitter::JitterPolicy;

/// How an execution worker reacts to failing steps.
#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(default)]
pub struct StepRetryPolicy {
    /// Consecutive failures tolerated before the worker gives up (`0` = none).
    pub max_retries: u32,
    /// Delay before the first retry. `0` retries immediately; a pending stop
    /// still wins over the retry.
    #[serde(with = "crate::core::config::secs")]
    pub first: Duration,
    /// Multiplicative growth factor.
    pub factor: f64,
    /// Maximum delay cap, never below `first`.
    #[serde(with = "crate::core::config::secs")]
    pub max: Duration,
    /// Randomization of the computed delay.
    pub jitter: JitterPolicy,
}

impl Default for StepRetryPolicy {
    /// `max_retries = 3`, `first = 5s`, `factor = 2.0`, `max = 60s`, equal jitter.
    fn default() -> Self {
        Self {
            max_retries: 3,
            first: Duration::from_secs(5),
            factor: 2.0,
            max: Duration::from_secs(60),
            jitter: JitterPolicy::Equal,
        }
    }
}

impl StepRetryPolicy {
    /// A policy that never retries.
    pub fn never() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay before retrying after `failures` consecutive failures (1-based),
    /// or `None` once the budget is exhausted.
    pub fn delay(&self, failures: u32) -> Option<Duration> {
        if failures == 0 || failures > self.max_retries {
            return None;
        }
        let exp = (failures - 1).min(i32::MAX as u32) as i32;
        let secs = self.first.as_secs_f64() * self.factor.powi(exp);
        let base = if !secs.is_finite() || secs < 0.0 || secs > self.max.as_secs_f64() {
            self.max
        } else {
            Duration::from_secs_f64(secs)
        };
        Some(self.jitter.apply(base))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed(max_retries: u32) -> StepRetryPolicy {
        StepRetryPolicy {
            max_retries,
            first: Duration::from_millis(100),
            factor: 2.0,
            max: Duration::from_secs(1),
            jitter: JitterPolicy::None,
        }
    }

    #[test]
    fn grows_then_clamps() {
        let p = fixed(10);
        assert_eq!(p.delay(1), Some(Duration::from_millis(100)));
        assert_eq!(p.delay(2), Some(Duration::from_millis(200)));
        assert_eq!(p.delay(5), Some(Duration::from_secs(1)));
    }

    #[test]
    fn never_retries_when_budget_is_zero() {
        assert_eq!(StepRetryPolicy::never().delay(1), None);
    }

    #[test]
    fn exhausted_after_max_retries() {
        let p = fixed(2);
        assert!(p.delay(2).is_some());
        assert!(p.delay(3).is_none());
    }

    #[test]
    fn huge_failure_count_is_capped() {
        let p = fixed(u32::MAX);
        assert_eq!(p.delay(u32::MAX), Some(Duration::from_secs(1)));
    }
}
