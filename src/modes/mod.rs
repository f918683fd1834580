//! Mode policies and how they are instantiated.
//!
//! - [`policy`]: the [`ModePolicy`] trait every mode implements;
//! - [`instance`]: [`ModeInstance`] / [`ModeRef`], a policy plus its priority override;
//! - [`registry`]: [`ModeRegistry`], the static name → factory table;
//! - [`idle`]: the permanent fallback;
//! - [`away`]: presence-driven "somebody is home" simulation.

pub mod away;
mod idle;
mod instance;
mod policy;
mod registry;

pub use away::{AwayConfig, AwayMode, LightGroupConfig, AWAY_MODE};
pub use idle::{IdleMode, IDLE_MODE, IDLE_PRIORITY};
pub use instance::{ModeInstance, ModeRef};
pub use policy::ModePolicy;
pub use registry::{ModeFactory, ModeRegistry};
