//! # Core subscriber trait
//!
//! `Subscribe` is the extension point for plugging event handlers into the
//! scheduler. Each subscriber is driven by a dedicated worker loop fed by a
//! bounded queue owned by the [`SubscriberSet`](crate::SubscriberSet).
//!
//! ## Contract
//! - Implementations may be slow; they block neither the publisher nor other subscribers.
//! - On queue overflow, events for that subscriber are **dropped**.

use crate::events::Event;
use async_trait::async_trait;

/// Contract for event subscribers.
///
/// # Example
/// ```rust
/// use async_trait::async_trait;
/// use modevisor::{Event, EventKind, Subscribe};
///
/// struct SwitchCounter(std::sync::atomic::AtomicUsize);
///
/// #[async_trait]
/// impl Subscribe for SwitchCounter {
///     async fn on_event(&self, ev: &Event) {
///         if ev.kind == EventKind::ModeSwitched {
///             self.0.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
///         }
///     }
///     fn name(&self) -> &'static str { "switch-counter" }
/// }
/// ```
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Handle a single event.
    async fn on_event(&self, event: &Event);

    /// Human-readable name (for logs).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Preferred capacity of this subscriber's queue.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
