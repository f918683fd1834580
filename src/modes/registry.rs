//! # Static mode registry.
//!
//! Maps a mode type name to a factory producing a **fresh** policy each time.
//! Registration happens once at startup; names are matched case-insensitively
//! after trimming. The `idle` fallback is always present and always first.
//!
//! ```text
//! ModeRegistry
//!   ├─ "idle"  → || IdleMode           (permanent fallback, priority 1)
//!   ├─ "away"  → || AwayMode::new(..)
//!   └─ ...     → || ...
//!
//! instantiate("Away ", Some(5)) ──► ModeRef { policy: AwayMode, override: 5 }
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::ControlError;
use crate::modes::idle::{IdleMode, IDLE_MODE};
use crate::modes::instance::{ModeInstance, ModeRef};
use crate::modes::policy::ModePolicy;

/// Factory producing a fresh policy instance.
pub type ModeFactory = Arc<dyn Fn() -> Box<dyn ModePolicy> + Send + Sync>;

#[derive(Clone)]
struct Entry {
    name: String,
    factory: ModeFactory,
}

/// Ordered table of known mode types.
#[derive(Clone)]
pub struct ModeRegistry {
    entries: Vec<Entry>,
}

impl ModeRegistry {
    /// Creates a registry holding only the idle fallback (default tick).
    pub fn new() -> Self {
        Self::with_idle(IdleMode::DEFAULT_TICK)
    }

    /// Creates a registry holding only the idle fallback with the given tick.
    pub fn with_idle(tick: Duration) -> Self {
        let idle: ModeFactory = Arc::new(move || -> Box<dyn ModePolicy> { Box::new(IdleMode::new(tick)) });
        Self {
            entries: vec![Entry {
                name: IDLE_MODE.to_string(),
                factory: idle,
            }],
        }
    }

    /// Registers a mode type.
    ///
    /// The name is normalized (trimmed, lower-cased). Registering a name that
    /// already exists replaces its factory in place, `idle` included.
    ///
    /// # Panics
    /// Debug builds assert that a fresh instance reports the registered name.
    pub fn register<F, P>(mut self, name: &str, factory: F) -> Self
    where
        F: Fn() -> P + Send + Sync + 'static,
        P: ModePolicy,
    {
        let name = normalize(name);
        debug_assert_eq!(normalize(factory().name()), name, "factory name mismatch");

        let factory: ModeFactory = Arc::new(move || -> Box<dyn ModePolicy> { Box::new(factory()) });
        match self.entries.iter_mut().find(|e| e.name == name) {
            Some(e) => e.factory = factory,
            None => self.entries.push(Entry { name, factory }),
        }
        self
    }

    /// All registered type names, idle first, then registration order.
    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.name.clone()).collect()
    }

    /// True if `name` (normalized) is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    /// Builds a fresh instance of `name` with an optional priority override.
    pub fn instantiate(
        &self,
        name: &str,
        priority_override: Option<u32>,
    ) -> Result<ModeRef, ControlError> {
        let entry = self.find(name).ok_or_else(|| ControlError::UnknownMode {
            name: name.to_string(),
        })?;
        Ok(ModeInstance::arc((entry.factory)(), priority_override))
    }

    /// Builds a fresh idle instance.
    pub fn idle(&self) -> ModeRef {
        // idle is seeded by every constructor and never removed.
        let entry = &self.entries[0];
        ModeInstance::arc((entry.factory)(), None)
    }

    /// Builds one fresh instance of every registered type, in order.
    pub fn instantiate_all(&self) -> Vec<ModeRef> {
        self.entries
            .iter()
            .map(|e| ModeInstance::arc((e.factory)(), None))
            .collect()
    }

    /// True if `name` is the idle fallback.
    pub fn is_idle(name: &str) -> bool {
        normalize(name) == IDLE_MODE
    }

    fn find(&self, name: &str) -> Option<&Entry> {
        let name = normalize(name);
        self.entries.iter().find(|e| e.name == name)
    }
}

impl Default for ModeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ModeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModeError;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};

    struct Away;

    #[async_trait]
    impl ModePolicy for Away {
        fn name(&self) -> &str {
            "away"
        }
        async fn priority(&self, _now: DateTime<Utc>) -> Result<u32, ModeError> {
            Ok(2)
        }
        async fn step(&self, _now: DateTime<Utc>) -> Result<(), ModeError> {
            Ok(())
        }
    }

    #[test]
    fn idle_is_always_first() {
        let reg = ModeRegistry::new().register("away", || Away);
        assert_eq!(reg.names(), vec!["idle".to_string(), "away".to_string()]);
        assert!(ModeRegistry::is_idle(" IDLE"));
    }

    #[tokio::test]
    async fn instantiate_is_case_insensitive_and_fresh() {
        let reg = ModeRegistry::new().register("away", || Away);
        let a = reg.instantiate(" Away ", Some(5)).unwrap();
        let b = reg.instantiate("away", None).unwrap();

        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(a.priority(Utc::now()).await.unwrap(), 5);
        assert_eq!(b.priority(Utc::now()).await.unwrap(), 2);
    }

    #[test]
    fn unknown_name_is_rejected() {
        let err = ModeRegistry::new().instantiate("party", None).unwrap_err();
        assert_eq!(
            err,
            ControlError::UnknownMode {
                name: "party".into()
            }
        );
    }

    #[test]
    fn clones_do_not_see_later_registrations() {
        let base = ModeRegistry::new();
        let extended = base.clone().register("away", || Away);
        assert!(!base.contains("away"));
        assert!(extended.contains("away"));
        assert_eq!(extended.instantiate_all().len(), 2);
    }
}
