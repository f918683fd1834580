//! # Idle fallback mode.
//!
//! Always wants to run at the lowest positive priority so the house is never
//! without an active mode. Does nothing and never completes.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::ModeError;
use crate::modes::policy::ModePolicy;

/// Registry name of the fallback mode.
pub const IDLE_MODE: &str = "idle";

/// Fixed priority reported by the idle mode.
pub const IDLE_PRIORITY: u32 = 1;

/// The permanent fallback policy.
#[derive(Debug, Clone, Copy)]
pub struct IdleMode {
    tick: Duration,
}

impl IdleMode {
    /// Tick used when none is configured.
    pub const DEFAULT_TICK: Duration = Duration::from_secs(60);

    /// Creates an idle mode sleeping `tick` between (empty) steps.
    pub fn new(tick: Duration) -> Self {
        Self { tick }
    }
}

impl Default for IdleMode {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TICK)
    }
}

#[async_trait]
impl ModePolicy for IdleMode {
    fn name(&self) -> &str {
        IDLE_MODE
    }

    async fn priority(&self, _now: DateTime<Utc>) -> Result<u32, ModeError> {
        Ok(IDLE_PRIORITY)
    }

    async fn step(&self, _now: DateTime<Utc>) -> Result<(), ModeError> {
        Ok(())
    }

    fn tick_interval(&self) -> Duration {
        self.tick
    }
}
