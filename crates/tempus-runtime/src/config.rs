//! Runtime configuration

use serde::{Deserialize, Serialize};
use tempus_core::{TempusError, TempusResult};
use tempus_distortion::{BubbleLimits, LashbackConfig};
use tempus_history::HistoryConfig;
use tempus_time::ClockConfig;

/// What to do when a rewind target has no record
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissPolicy {
    /// Restore the closest recorded tick instead
    #[default]
    SnapToNearest,
    /// Stop the rewind and resume recording at the live tick
    AbortRewind,
}

/// Complete simulation configuration
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub miss_policy: MissPolicy,
    /// Lifetime of bubbles spawned from local commands, 0 = until resumed
    pub local_bubble_duration_ticks: u32,
    pub clock: ClockConfig,
    pub history: HistoryConfig,
    pub bubbles: BubbleLimits,
    pub lashback: LashbackConfig,
}

impl RuntimeConfig {
    /// 60 Hz with ten seconds of rewind
    pub fn long_rewind() -> Self {
        RuntimeConfig {
            history: HistoryConfig::long_rewind(),
            ..RuntimeConfig::default()
        }
    }

    /// Clock and history horizon both expressed at `hz`
    pub fn fixed_rate(hz: u32) -> Self {
        let hz = hz.max(1);
        RuntimeConfig {
            clock: ClockConfig::fixed_rate(hz),
            history: HistoryConfig {
                ticks_per_second: hz,
                ..HistoryConfig::default()
            },
            ..RuntimeConfig::default()
        }
    }

    /// Parse from TOML; missing sections and fields take their defaults
    pub fn from_toml_str(input: &str) -> TempusResult<Self> {
        let config: RuntimeConfig =
            toml::from_str(input).map_err(|e| TempusError::Config(e.to_string()))?;
        Ok(config.normalized())
    }

    pub fn to_toml_string(&self) -> TempusResult<String> {
        toml::to_string(self).map_err(|e| TempusError::Config(e.to_string()))
    }

    /// Repair values that would make clamping ill-defined
    pub fn normalized(mut self) -> Self {
        self.clock = self.clock.normalized();
        let limits = &mut self.bubbles;
        if !limits.min_radius.is_finite() || limits.min_radius < 0.0 {
            limits.min_radius = BubbleLimits::default().min_radius;
        }
        if !limits.max_radius.is_finite() || limits.max_radius < limits.min_radius {
            limits.max_radius = limits.min_radius.max(BubbleLimits::default().max_radius);
        }
        self
    }
}
