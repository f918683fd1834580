use std::sync::Arc;

use crate::core::config::SchedulerConfig;
use crate::core::scheduler::Scheduler;
use crate::events::Bus;
use crate::modes::ModeRegistry;
use crate::subscribers::{Subscribe, SubscriberSet};

/// Builder for a [`Scheduler`].
pub struct SchedulerBuilder {
    registry: ModeRegistry,
    cfg: SchedulerConfig,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl SchedulerBuilder {
    /// Creates a builder with the default configuration and no subscribers.
    pub fn new(registry: ModeRegistry) -> Self {
        Self {
            registry,
            cfg: SchedulerConfig::default(),
            subscribers: Vec::new(),
        }
    }

    /// Sets the runtime configuration.
    pub fn with_config(mut self, cfg: SchedulerConfig) -> Self {
        self.cfg = cfg;
        self
    }

    /// Sets event subscribers (for example [`LogWriter`](crate::LogWriter)).
    ///
    /// Each subscriber gets its own worker and bounded queue.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Builds the scheduler.
    ///
    /// Spawns the subscriber workers, so it must be called inside a tokio runtime.
    pub fn build(self) -> Arc<Scheduler> {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let subs = SubscriberSet::new(self.subscribers, bus.clone());
        Arc::new(Scheduler::new_internal(self.cfg, self.registry, bus, subs))
    }
}
