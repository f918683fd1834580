//! # Away mode: make the house look lived-in while nobody is home.
//!
//! Presence is inferred from the network: the presence service lists known
//! clients with a `last_seen` timestamp, and the mode tracks a configured set
//! of devices (exact MAC address, or a substring of the client name).
//!
//! - **priority**: `2` when no tracked device was seen within `device_timeout`,
//!   else `0`. If the presence service is unreachable, the last computed value
//!   is reported again.
//! - **step**: picks a random light group, rolls its `chance`, and toggles all
//!   of its lights on or off at random.
//! - **complete**: as soon as a tracked device is seen again.
//! - **cleanup**: turns every light of every group off.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::seq::IndexedRandom;
use rand::Rng;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::error::{ModeError, SessionError};
use crate::modes::policy::ModePolicy;
use crate::session::ServiceSession;

/// Registry name of the away mode.
pub const AWAY_MODE: &str = "away";

/// Priority reported while nobody is home.
pub const AWAY_PRIORITY: u32 = 2;

/// `[away]` section of the service config.
#[derive(Debug, Clone, Deserialize)]
pub struct AwayConfig {
    /// Tracked devices: MAC addresses or name fragments (case-insensitive).
    pub devices: Vec<String>,
    /// Seconds without any tracked device online before the house counts as empty.
    #[serde(default = "default_device_timeout")]
    pub device_timeout_secs: u64,
    /// Seconds between two light steps.
    #[serde(default = "default_tick")]
    pub tick_secs: u64,
    /// Light groups eligible for random toggling.
    #[serde(default)]
    pub lights: Vec<LightGroupConfig>,
}

fn default_device_timeout() -> u64 {
    1200
}

fn default_tick() -> u64 {
    60
}

/// One configured light group.
#[derive(Debug, Clone, Deserialize)]
pub struct LightGroupConfig {
    /// Tags a light must all carry; a tag equal to a light id also matches.
    pub tags: Vec<String>,
    /// Probability in `[0, 1]` that a step picking this group toggles it.
    pub chance: f64,
}

/// A client as reported by the presence service.
#[derive(Debug, Clone, Deserialize)]
pub struct Client {
    /// MAC address.
    pub macaddr: String,
    /// Host or user-assigned name.
    #[serde(default)]
    pub name: Option<String>,
    /// Unix timestamp of the last time the client was seen.
    #[serde(default)]
    pub last_seen: Option<i64>,
}

/// A light as reported by the light service.
#[derive(Debug, Clone, Deserialize)]
pub struct Light {
    /// Light id.
    pub id: String,
    /// Free-form tags.
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Lights resolved for one configured group.
#[derive(Debug, Clone)]
pub struct LightGroup {
    /// Toggle probability.
    pub chance: f64,
    /// Matching lights (never empty).
    pub lights: Vec<Light>,
}

/// Most recently seen tracked device.
#[derive(Debug, Clone, PartialEq)]
pub struct Sighting {
    /// Device label (name, or MAC address when unnamed).
    pub device: String,
    /// Seconds since it was last seen.
    pub age_secs: i64,
}

/// The away mode policy.
pub struct AwayMode {
    cfg: Arc<AwayConfig>,
    presence: Arc<ServiceSession>,
    lights: Arc<ServiceSession>,
    last_priority: AtomicU32,
}

impl AwayMode {
    /// Creates an away mode. Sessions are shared collaborator handles; all
    /// behavior state is per instance.
    pub fn new(
        cfg: Arc<AwayConfig>,
        presence: Arc<ServiceSession>,
        lights: Arc<ServiceSession>,
    ) -> Self {
        Self {
            cfg,
            presence,
            lights,
            last_priority: AtomicU32::new(0),
        }
    }

    async fn latest_sighting(&self, now: DateTime<Utc>) -> Result<Option<Sighting>, ModeError> {
        let env = self.presence.get("/clients").await?;
        let clients: Vec<Client> = decode("presence", env.payload)?;
        Ok(latest_sighting(&clients, &self.cfg.devices, now.timestamp()))
    }

    async fn light_groups(&self) -> Result<Vec<LightGroup>, ModeError> {
        let env = self.lights.get("/lights").await?;
        let lights: Vec<Light> = decode("lights", env.payload)?;
        Ok(light_groups(&lights, &self.cfg.lights))
    }

    fn someone_home(&self, sighting: Option<&Sighting>) -> bool {
        sighting.is_some_and(|s| s.age_secs < self.cfg.device_timeout_secs as i64)
    }

    async fn toggle(&self, light: &Light, action: &str) -> Result<(), SessionError> {
        self.lights
            .post("/toggle", &json!({"id": light.id, "action": action}))
            .await
            .map(|_| ())
    }
}

#[async_trait]
impl ModePolicy for AwayMode {
    fn name(&self) -> &str {
        AWAY_MODE
    }

    async fn priority(&self, now: DateTime<Utc>) -> Result<u32, ModeError> {
        let p = match self.latest_sighting(now).await {
            Ok(s) if self.someone_home(s.as_ref()) => 0,
            Ok(_) => AWAY_PRIORITY,
            Err(e) => {
                let last = self.last_priority.load(Ordering::Relaxed);
                warn!(mode = AWAY_MODE, error = %e, last, "presence lookup failed; keeping last priority");
                return Ok(last);
            }
        };
        self.last_priority.store(p, Ordering::Relaxed);
        Ok(p)
    }

    async fn step(&self, _now: DateTime<Utc>) -> Result<(), ModeError> {
        let groups = self.light_groups().await?;
        let (group, action) = {
            let mut rng = rand::rng();
            let Some(group) = groups.choose(&mut rng) else {
                return Ok(());
            };
            if !rng.random_bool(group.chance.clamp(0.0, 1.0)) {
                return Ok(());
            }
            let action = if rng.random_bool(0.5) { "on" } else { "off" };
            (group, action)
        };

        info!(mode = AWAY_MODE, lights = group.lights.len(), action, "toggling light group");
        for light in &group.lights {
            if let Err(e) = self.toggle(light, action).await {
                warn!(mode = AWAY_MODE, light = %light.id, error = %e, "toggle failed; skipping");
            }
        }
        Ok(())
    }

    async fn is_complete(&self) -> bool {
        match self.latest_sighting(Utc::now()).await {
            Ok(s) if self.someone_home(s.as_ref()) => {
                if let Some(s) = s {
                    info!(
                        mode = AWAY_MODE,
                        device = %s.device,
                        age_secs = s.age_secs,
                        "tracked device online; somebody is home"
                    );
                }
                true
            }
            Ok(_) => false,
            Err(e) => {
                warn!(mode = AWAY_MODE, error = %e, "presence lookup failed; staying away");
                false
            }
        }
    }

    async fn cleanup(&self) -> Result<(), ModeError> {
        let groups = self.light_groups().await?;
        let mut failed = 0usize;
        for group in &groups {
            info!(mode = AWAY_MODE, lights = group.lights.len(), "cleanup: turning light group off");
            for light in &group.lights {
                if self.toggle(light, "off").await.is_err() {
                    failed += 1;
                }
            }
        }
        if failed > 0 {
            return Err(ModeError::fail(format!("{failed} light(s) could not be turned off")));
        }
        Ok(())
    }

    fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.cfg.tick_secs)
    }
}

fn decode<T: serde::de::DeserializeOwned>(
    service: &'static str,
    payload: Option<serde_json::Value>,
) -> Result<T, ModeError> {
    serde_json::from_value(payload.unwrap_or_default()).map_err(|e| ModeError::Collaborator {
        service,
        error: format!("unexpected payload: {e}"),
    })
}

/// Finds the most recently seen client matching a tracked device.
///
/// A tracked entry matches when it equals the client's MAC address or is
/// contained in the client's name (both case-insensitive).
pub fn latest_sighting(clients: &[Client], tracked: &[String], now: i64) -> Option<Sighting> {
    let tracked: Vec<String> = tracked.iter().map(|t| t.to_lowercase()).collect();
    clients
        .iter()
        .filter(|c| {
            let mac = c.macaddr.to_lowercase();
            let name = c.name.as_deref().unwrap_or("").to_lowercase();
            tracked.iter().any(|t| *t == mac || (!name.is_empty() && name.contains(t.as_str())))
        })
        .map(|c| Sighting {
            device: c
                .name
                .clone()
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| c.macaddr.to_lowercase()),
            age_secs: now - c.last_seen.unwrap_or(0),
        })
        .min_by_key(|s| s.age_secs)
}

/// Resolves configured groups against the lights known to the light service.
///
/// Groups without any matching light are dropped.
pub fn light_groups(lights: &[Light], groups: &[LightGroupConfig]) -> Vec<LightGroup> {
    groups
        .iter()
        .filter_map(|g| {
            let wanted: Vec<String> = g.tags.iter().map(|t| t.trim().to_lowercase()).collect();
            let members: Vec<Light> = lights
                .iter()
                .filter(|l| {
                    let have: Vec<String> = l.tags.iter().map(|t| t.trim().to_lowercase()).collect();
                    let all_tags = wanted.iter().all(|t| have.contains(t));
                    all_tags || wanted.contains(&l.id.trim().to_lowercase())
                })
                .cloned()
                .collect();
            (!members.is_empty()).then(|| LightGroup {
                chance: g.chance,
                lights: members,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(mac: &str, name: Option<&str>, last_seen: i64) -> Client {
        Client {
            macaddr: mac.into(),
            name: name.map(Into::into),
            last_seen: Some(last_seen),
        }
    }

    fn light(id: &str, tags: &[&str]) -> Light {
        Light {
            id: id.into(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    #[test]
    fn latest_sighting_matches_mac_or_name_fragment() {
        let clients = vec![
            client("AA:BB:CC:00:00:01", Some("Alice-Phone"), 900),
            client("aa:bb:cc:00:00:02", None, 990),
            client("aa:bb:cc:00:00:03", Some("tv"), 999),
        ];
        let tracked = vec!["alice".to_string(), "AA:BB:CC:00:00:02".to_string()];

        let s = latest_sighting(&clients, &tracked, 1000).unwrap();
        assert_eq!(s.device, "aa:bb:cc:00:00:02");
        assert_eq!(s.age_secs, 10);
    }

    #[test]
    fn no_tracked_device_means_no_sighting() {
        let clients = vec![client("aa", Some("tv"), 999)];
        assert!(latest_sighting(&clients, &["phone".to_string()], 1000).is_none());
    }

    #[test]
    fn groups_require_all_tags_or_an_id() {
        let lights = vec![
            light("porch", &["outside", "front"]),
            light("lamp", &["inside", "living"]),
            light("desk", &["inside"]),
        ];
        let groups = light_groups(
            &lights,
            &[
                LightGroupConfig {
                    tags: vec!["Inside".into(), "living".into()],
                    chance: 0.5,
                },
                LightGroupConfig {
                    tags: vec!["porch".into()],
                    chance: 1.0,
                },
                LightGroupConfig {
                    tags: vec!["garage".into()],
                    chance: 1.0,
                },
            ],
        );

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].lights.len(), 1);
        assert_eq!(groups[0].lights[0].id, "lamp");
        assert_eq!(groups[1].lights[0].id, "porch");
    }
}
