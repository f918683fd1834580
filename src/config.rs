//! # Service configuration file.
//!
//! One TOML file configures the whole service. Every section is optional
//! except what an enabled mode needs:
//!
//! ```toml
//! [server]
//! addr = "0.0.0.0:2301"
//! api_key = "s3cret"             # optional; enables bearer / x-api-key auth
//!
//! [scheduler]
//! poll_interval_secs = 5
//! grace_secs = 120
//! bus_capacity = 1024
//! step_retry = { max_retries = 3, first = 5, factor = 2.0, max = 60, jitter = "equal" }
//!
//! [idle]
//! tick_secs = 60
//!
//! [away]                         # optional; requires both sessions below
//! devices = ["aa:bb:cc:dd:ee:ff", "alice-phone"]
//! device_timeout_secs = 1200
//! lights = [{ tags = ["living"], chance = 0.3 }]
//!
//! [sessions.presence]
//! address = "http://hub.local:2300"
//! username = "modes"
//! password = "..."
//!
//! [sessions.lights]
//! address = "http://hub.local:2302"
//! username = "modes"
//! password = "..."
//! ```
//!
//! Loading never falls back to defaults on error: a file that cannot be read,
//! parsed or validated is a [`ConfigError`] and the service refuses to start.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::core::SchedulerConfig;
use crate::error::ConfigError;
use crate::modes::AwayConfig;
use crate::session::SessionConfig;

/// Whole service configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceConfig {
    /// HTTP control plane.
    pub server: ServerConfig,
    /// Arbitration loop.
    pub scheduler: SchedulerConfig,
    /// Idle fallback mode.
    pub idle: IdleConfig,
    /// Away mode; the mode is registered only when this section exists.
    pub away: Option<AwayConfig>,
    /// Collaborator services.
    pub sessions: SessionsConfig,
}

/// `[server]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address of the control plane.
    pub addr: SocketAddr,
    /// Shared API key; `None` disables authentication.
    pub api_key: Option<String>,
    /// Name reported by `GET /` and `GET /id`.
    pub service_id: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 2301)),
            api_key: None,
            service_id: "mode".to_string(),
        }
    }
}

/// `[idle]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IdleConfig {
    /// Seconds between the idle mode's (empty) steps.
    pub tick_secs: u64,
}

impl IdleConfig {
    /// Tick as a [`Duration`].
    pub fn tick(&self) -> Duration {
        Duration::from_secs(self.tick_secs)
    }
}

impl Default for IdleConfig {
    fn default() -> Self {
        Self { tick_secs: 60 }
    }
}

/// `[sessions.*]` sections.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SessionsConfig {
    /// Presence service (network clients).
    pub presence: Option<SessionConfig>,
    /// Light service.
    pub lights: Option<SessionConfig>,
}

impl ServiceConfig {
    /// Reads, parses and validates the file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: display.clone(),
            source,
        })?;
        Self::from_toml_str(&text, &display)
    }

    /// Parses and validates TOML text; `origin` names the source in errors.
    pub fn from_toml_str(text: &str, origin: &str) -> Result<Self, ConfigError> {
        let cfg: Self = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: origin.to_string(),
            source,
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Checks cross-field constraints serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scheduler.poll_interval.is_zero() {
            return Err(invalid("scheduler.poll_interval_secs", "must be at least 1"));
        }
        let factor = self.scheduler.step_retry.factor;
        if !factor.is_finite() || factor < 1.0 {
            return Err(invalid(
                "scheduler.step_retry.factor",
                format!("must be a finite number >= 1.0, got {factor}"),
            ));
        }
        let retry = &self.scheduler.step_retry;
        if retry.max < retry.first {
            return Err(invalid(
                "scheduler.step_retry.max",
                format!("must not be below first ({:?} < {:?})", retry.max, retry.first),
            ));
        }
        if self.idle.tick_secs == 0 {
            return Err(invalid("idle.tick_secs", "must be at least 1"));
        }
        if self.server.api_key.as_deref().is_some_and(|k| k.trim().is_empty()) {
            return Err(invalid("server.api_key", "must not be empty when set"));
        }

        if let Some(away) = &self.away {
            if away.devices.is_empty() {
                return Err(invalid("away.devices", "at least one tracked device is required"));
            }
            if away.tick_secs == 0 {
                return Err(invalid("away.tick_secs", "must be at least 1"));
            }
            if let Some(g) = away.lights.iter().find(|g| !(0.0..=1.0).contains(&g.chance)) {
                return Err(invalid(
                    "away.lights.chance",
                    format!("must be within [0, 1], got {}", g.chance),
                ));
            }
            if self.sessions.presence.is_none() {
                return Err(invalid("sessions.presence", "required by [away]"));
            }
            if self.sessions.lights.is_none() {
                return Err(invalid("sessions.lights", "required by [away]"));
            }
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const FULL: &str = r#"
        [server]
        addr = "127.0.0.1:9000"
        api_key = "k"

        [scheduler]
        poll_interval_secs = 2
        grace_secs = 0
        step_retry = { max_retries = 1, first = 3, jitter = "none" }

        [away]
        devices = ["alice"]
        lights = [{ tags = ["living"], chance = 0.25 }]

        [sessions.presence]
        address = "http://hub:2300"
        username = "u"
        password = "p"

        [sessions.lights]
        address = "http://hub:2302"
        username = "u"
        password = "p"
        timeout_secs = 3
    "#;

    #[test]
    fn empty_file_yields_defaults() {
        let cfg = ServiceConfig::from_toml_str("", "inline").unwrap();
        assert_eq!(cfg.server.addr.port(), 2301);
        assert_eq!(cfg.scheduler.poll_interval, Duration::from_secs(5));
        assert_eq!(cfg.idle.tick(), Duration::from_secs(60));
        assert!(cfg.away.is_none());
    }

    #[test]
    fn full_file_parses() {
        let cfg = ServiceConfig::from_toml_str(FULL, "inline").unwrap();
        assert_eq!(cfg.server.api_key.as_deref(), Some("k"));
        assert_eq!(cfg.scheduler.grace_period(), None);
        assert_eq!(cfg.scheduler.step_retry.max_retries, 1);
        assert_eq!(cfg.scheduler.step_retry.first, Duration::from_secs(3));

        let away = cfg.away.unwrap();
        assert_eq!(away.device_timeout_secs, 1200);
        assert_eq!(away.lights[0].chance, 0.25);
        assert_eq!(cfg.sessions.lights.unwrap().timeout_secs, 3);
    }

    #[test]
    fn away_without_sessions_is_rejected() {
        let err = ServiceConfig::from_toml_str("[away]\ndevices = [\"x\"]\n", "inline").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "sessions.presence",
                ..
            }
        ));
    }

    #[test]
    fn bad_values_are_rejected() {
        let err = ServiceConfig::from_toml_str("[scheduler]\npoll_interval_secs = 0\n", "x").unwrap_err();
        assert_eq!(err.as_label(), "config_invalid");

        let err = ServiceConfig::from_toml_str("[scheduler]\npoll_interval_secs = \"soon\"\n", "x").unwrap_err();
        assert_eq!(err.as_label(), "config_parse");

        let err = ServiceConfig::from_toml_str("[unknown]\n", "x").unwrap_err();
        assert_eq!(err.as_label(), "config_parse");
    }

    #[test]
    fn retry_cap_below_first_delay_is_rejected() {
        let text = "[scheduler]\nstep_retry = { first = 10, max = 5 }\n";
        let err = ServiceConfig::from_toml_str(text, "x").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "scheduler.step_retry.max",
                ..
            }
        ));

        let text = "[scheduler]\nstep_retry = { first = 0, max = 0 }\n";
        let cfg = ServiceConfig::from_toml_str(text, "x").unwrap();
        assert_eq!(cfg.scheduler.step_retry.delay(1), Some(Duration::ZERO));
    }

    #[test]
    fn load_reads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(FULL.as_bytes()).unwrap();
        let cfg = ServiceConfig::load(file.path()).unwrap();
        assert_eq!(cfg.server.addr.port(), 9000);

        let err = ServiceConfig::load("/definitely/not/here.toml").unwrap_err();
        assert_eq!(err.as_label(), "config_read");
    }
}
