//! Configuration for the circadian attention scheduler.

use crate::error::{CircadianError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Session tunables. Patched at runtime through [`ConfigPatch`]; changes
/// take effect on the next tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircadianConfig {
    /// Seconds between engine ticks.
    pub heartbeat_secs: u64,
    /// Minimum seconds between whisper (nudge) deliveries.
    pub batch_delivery_interval_secs: u64,
    /// Minimum seconds between spoken deliveries.
    pub speak_min_idle_secs: u64,
    /// Deliver urgent items even while the attention state is silent.
    pub urgent_breakthrough: bool,
    /// Base staleness threshold for priority escalation.
    ///
    /// The n-th escalation of an item requires `stale_threshold_secs * n`
    /// seconds since creation.
    pub stale_threshold_secs: u64,
    /// How long delivered items stay in the queue before garbage collection.
    pub delivered_retention_secs: u64,
    /// Lifetime of items created from inbound notifications.
    pub notice_ttl_secs: u64,
    /// `expires_in` attached to nudge pushes.
    pub nudge_expiry_secs: u64,
    /// Maximum items per whisper delivery.
    pub whisper_batch_size: usize,
    /// Maximum items per spoken delivery.
    pub speak_batch_size: usize,
    /// Per-phase feature toggles.
    pub features: PhaseFeatures,
}

impl Default for CircadianConfig {
    fn default() -> Self {
        Self {
            heartbeat_secs: 60,
            batch_delivery_interval_secs: 15 * 60,
            speak_min_idle_secs: 30,
            urgent_breakthrough: true,
            stale_threshold_secs: 10 * 60,
            delivered_retention_secs: 2 * 3600,
            notice_ttl_secs: 3600,
            nudge_expiry_secs: 30 * 60,
            whisper_batch_size: 5,
            speak_batch_size: 3,
            features: PhaseFeatures::default(),
        }
    }
}

/// Side effects enabled on phase entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhaseFeatures {
    /// Speak a morning briefing on entering `morning_pilot`.
    pub morning_briefing: bool,
    /// Turn do-not-disturb on when entering `focus_shield`.
    pub focus_dnd: bool,
    /// Flush the queue when entering `afternoon_flow`.
    pub afternoon_flush: bool,
    /// Speak an evening review on entering `evening_wind`.
    pub evening_review: bool,
    /// Turn do-not-disturb on when entering `sleep_guard`.
    pub sleep_dnd: bool,
    /// Adjust display brightness on morning, evening and sleep entry.
    pub brightness: bool,
}

impl Default for PhaseFeatures {
    fn default() -> Self {
        Self {
            morning_briefing: true,
            focus_dnd: true,
            afternoon_flush: true,
            evening_review: true,
            sleep_dnd: true,
            brightness: true,
        }
    }
}

/// Partial update for [`CircadianConfig`]. Absent fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigPatch {
    pub heartbeat_secs: Option<u64>,
    pub batch_delivery_interval_secs: Option<u64>,
    pub speak_min_idle_secs: Option<u64>,
    pub urgent_breakthrough: Option<bool>,
    pub stale_threshold_secs: Option<u64>,
    pub delivered_retention_secs: Option<u64>,
    pub notice_ttl_secs: Option<u64>,
    pub nudge_expiry_secs: Option<u64>,
    pub whisper_batch_size: Option<usize>,
    pub speak_batch_size: Option<usize>,
    pub features: Option<PhaseFeatures>,
}

impl CircadianConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if the
    /// parsed values fail [`CircadianConfig::validate`].
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self =
            toml::from_str(&content).map_err(|e| CircadianError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| CircadianError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `<config dir>/circadian/config.toml`.
    pub fn default_config_path() -> PathBuf {
        match dirs::config_dir() {
            Some(dir) => dir.join("circadian").join("config.toml"),
            None => PathBuf::from("/tmp/circadian-config/config.toml"),
        }
    }

    /// Reject values the engine cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`CircadianError::Config`] naming the offending field.
    pub fn validate(&self) -> Result<()> {
        if self.heartbeat_secs == 0 {
            return Err(CircadianError::Config(
                "heartbeat_secs must be greater than zero".to_owned(),
            ));
        }
        if self.heartbeat_secs > MAX_HEARTBEAT_SECS {
            return Err(CircadianError::Config(format!(
                "heartbeat_secs must be at most {MAX_HEARTBEAT_SECS}"
            )));
        }
        if self.whisper_batch_size == 0 {
            return Err(CircadianError::Config(
                "whisper_batch_size must be greater than zero".to_owned(),
            ));
        }
        if self.speak_batch_size == 0 {
            return Err(CircadianError::Config(
                "speak_batch_size must be greater than zero".to_owned(),
            ));
        }
        Ok(())
    }

    /// Return a copy with `patch` applied, validated.
    ///
    /// # Errors
    ///
    /// Returns [`CircadianError::Config`] when the patched config is invalid;
    /// `self` is never modified.
    pub fn patched(&self, patch: &ConfigPatch) -> Result<Self> {
        let mut next = self.clone();
        if let Some(v) = patch.heartbeat_secs {
            next.heartbeat_secs = v;
        }
        if let Some(v) = patch.batch_delivery_interval_secs {
            next.batch_delivery_interval_secs = v;
        }
        if let Some(v) = patch.speak_min_idle_secs {
            next.speak_min_idle_secs = v;
        }
        if let Some(v) = patch.urgent_breakthrough {
            next.urgent_breakthrough = v;
        }
        if let Some(v) = patch.stale_threshold_secs {
            next.stale_threshold_secs = v;
        }
        if let Some(v) = patch.delivered_retention_secs {
            next.delivered_retention_secs = v;
        }
        if let Some(v) = patch.notice_ttl_secs {
            next.notice_ttl_secs = v;
        }
        if let Some(v) = patch.nudge_expiry_secs {
            next.nudge_expiry_secs = v;
        }
        if let Some(v) = patch.whisper_batch_size {
            next.whisper_batch_size = v;
        }
        if let Some(v) = patch.speak_batch_size {
            next.speak_batch_size = v;
        }
        if let Some(v) = patch.features {
            next.features = v;
        }
        next.validate()?;
        Ok(next)
    }

    /// Tick interval, clamped to `1..=MAX_HEARTBEAT_SECS` for configs that
    /// skipped validation.
    pub fn heartbeat(&self) -> Duration {
        Duration::from_secs(self.heartbeat_secs.clamp(1, MAX_HEARTBEAT_SECS))
    }

    pub fn batch_delivery_interval(&self) -> chrono::Duration {
        secs(self.batch_delivery_interval_secs)
    }

    pub fn speak_min_idle(&self) -> chrono::Duration {
        secs(self.speak_min_idle_secs)
    }

    pub fn stale_threshold(&self) -> chrono::Duration {
        secs(self.stale_threshold_secs)
    }

    pub fn delivered_retention(&self) -> chrono::Duration {
        secs(self.delivered_retention_secs)
    }

    pub fn notice_ttl(&self) -> chrono::Duration {
        secs(self.notice_ttl_secs)
    }
}

/// Longest accepted tick interval (one day).
pub const MAX_HEARTBEAT_SECS: u64 = 86_400;

/// Upper bound for configured durations (about a century).
const MAX_CONFIG_SECS: i64 = 100 * 365 * 86_400;

fn secs(value: u64) -> chrono::Duration {
    let value = i64::try_from(value).unwrap_or(MAX_CONFIG_SECS);
    chrono::Duration::seconds(value.min(MAX_CONFIG_SECS))
}
