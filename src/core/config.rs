//! # Scheduler runtime configuration.
//!
//! [`SchedulerConfig`] centralizes the knobs of the arbitration loop. It is
//! usually read from the `[scheduler]` table of the service config file
//! (durations are given in whole seconds there) but can be built in code.
//!
//! ## Sentinel values
//! - `grace = 0s` → do not wait for the running mode on shutdown (its cleanup may be skipped)

use std::time::Duration;

use serde::Deserialize;

use crate::policies::StepRetryPolicy;

/// Configuration of the scheduler loop.
///
/// ## Field semantics
/// - `poll_interval`: pause between two arbitration cycles
/// - `grace`: maximum wait for the running mode to stop on shutdown
/// - `bus_capacity`: event bus ring buffer size (min 1)
/// - `step_retry`: how workers react to failing steps
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Pause between two arbitration cycles.
    #[serde(rename = "poll_interval_secs", with = "secs")]
    pub poll_interval: Duration,

    /// Maximum time to wait for the running mode to stop during shutdown.
    ///
    /// A stop waits for the in-flight `step()` to return, so this should be
    /// longer than the slowest step of any registered mode.
    ///
    /// `0` requests the stop and returns without joining the worker. If the
    /// process exits right after, the running mode's `cleanup()` may never
    /// run (the away mode would leave its lights as they are).
    #[serde(rename = "grace_secs", with = "secs")]
    pub grace: Duration,

    /// Capacity of the event bus broadcast channel.
    pub bus_capacity: usize,

    /// Retry policy applied by execution workers to failing steps.
    pub step_retry: StepRetryPolicy,
}

impl SchedulerConfig {
    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Returns the grace period as an `Option` (`None` = do not wait).
    #[inline]
    pub fn grace_period(&self) -> Option<Duration> {
        if self.grace == Duration::ZERO {
            None
        } else {
            Some(self.grace)
        }
    }
}

impl Default for SchedulerConfig {
    /// - `poll_interval = 5s`
    /// - `grace = 120s`
    /// - `bus_capacity = 1024`
    /// - `step_retry = StepRetryPolicy::default()`
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            grace: Duration::from_secs(120),
            bus_capacity: 1024,
            step_retry: StepRetryPolicy::default(),
        }
    }
}

/// Serde adapter: a `Duration` written as a whole number of seconds.
pub(crate) mod secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_seconds_and_keeps_defaults() {
        let cfg: SchedulerConfig = toml::from_str(
            r#"
            poll_interval_secs = 2
            [step_retry]
            max_retries = 1
            jitter = "none"
            "#,
        )
        .unwrap();

        assert_eq!(cfg.poll_interval, Duration::from_secs(2));
        assert_eq!(cfg.grace, Duration::from_secs(120));
        assert_eq!(cfg.step_retry.max_retries, 1);
        assert_eq!(cfg.step_retry.first, Duration::from_secs(5));
    }

    #[test]
    fn zero_grace_means_no_wait() {
        let cfg = SchedulerConfig {
            grace: Duration::ZERO,
            ..SchedulerConfig::default()
        };
        assert!(cfg.grace_period().is_none());
        assert_eq!(SchedulerConfig { bus_capacity: 0, ..cfg }.bus_capacity_clamped(), 1);
    }
}
