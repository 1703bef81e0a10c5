//! Fixed-step clock for the Tempus time engine

use serde::{Deserialize, Serialize};
use tempus_core::Tick;

/// Clock configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockConfig {
    /// Seconds of simulated time per tick at speed 1.0
    pub fixed_step_seconds: f32,
    /// Lower bound for the speed multiplier
    pub min_speed: f32,
    /// Upper bound for the speed multiplier
    pub max_speed: f32,
    /// Speed multiplier at startup
    pub initial_speed: f32,
    /// Whether the clock starts paused
    pub start_paused: bool,
    /// Upper bound for step and rewind tick counts
    pub max_tick_count: u32,
}

impl Default for ClockConfig {
    fn default() -> Self {
        ClockConfig {
            fixed_step_seconds: 1.0 / 60.0,
            min_speed: 0.1,
            max_speed: 8.0,
            initial_speed: 1.0,
            start_paused: false,
            max_tick_count: 3600,
        }
    }
}

impl ClockConfig {
    /// Configuration stepping at `hz` ticks per second
    pub fn fixed_rate(hz: u32) -> Self {
        ClockConfig {
            fixed_step_seconds: 1.0 / hz.max(1) as f32,
            ..ClockConfig::default()
        }
    }

    /// Repair bounds so clamping is always well defined
    ///
    /// Non-finite or non-positive values fall back to the defaults and a
    /// reversed speed range is swapped.
    pub fn normalized(mut self) -> Self {
        let defaults = ClockConfig::default();
        if !self.fixed_step_seconds.is_finite() || self.fixed_step_seconds <= 0.0 {
            self.fixed_step_seconds = defaults.fixed_step_seconds;
        }
        if !self.min_speed.is_finite() || self.min_speed <= 0.0 {
            self.min_speed = defaults.min_speed;
        }
        if !self.max_speed.is_finite() || self.max_speed <= 0.0 {
            self.max_speed = defaults.max_speed;
        }
        if self.min_speed > self.max_speed {
            std::mem::swap(&mut self.min_speed, &mut self.max_speed);
        }
        if self.max_tick_count == 0 {
            self.max_tick_count = defaults.max_tick_count;
        }
        self.initial_speed = self.clamp_speed(self.initial_speed);
        self
    }

    /// Clamp a requested speed into `[min_speed, max_speed]`
    ///
    /// NaN maps to 1.0 (then clamped).
    pub fn clamp_speed(&self, speed: f32) -> f32 {
        let speed = if speed.is_nan() { 1.0 } else { speed };
        speed.clamp(self.min_speed, self.max_speed)
    }

    /// Whole ticks per simulated second
    pub fn ticks_per_second(&self) -> u32 {
        (1.0 / self.fixed_step_seconds).round().max(1.0) as u32
    }
}

/// Simulation clock
///
/// Owned by the [`TimeEngine`](crate::TimeEngine); outside code only ever
/// sees it through a shared reference.
#[derive(Clone, Debug, PartialEq)]
pub struct Clock {
    tick: Tick,
    is_paused: bool,
    speed_multiplier: f32,
    fixed_step_seconds: f32,
}

impl Clock {
    pub(crate) fn new(config: &ClockConfig) -> Self {
        Clock {
            tick: Tick::ZERO,
            is_paused: config.start_paused,
            speed_multiplier: config.initial_speed,
            fixed_step_seconds: config.fixed_step_seconds,
        }
    }

    #[inline]
    pub fn tick(&self) -> Tick {
        self.tick
    }

    #[inline]
    pub fn is_paused(&self) -> bool {
        self.is_paused
    }

    #[inline]
    pub fn speed_multiplier(&self) -> f32 {
        self.speed_multiplier
    }

    #[inline]
    pub fn fixed_step_seconds(&self) -> f32 {
        self.fixed_step_seconds
    }

    /// Simulated seconds covered by one live tick at the current speed
    #[inline]
    pub fn dt_seconds(&self) -> f32 {
        self.fixed_step_seconds * self.speed_multiplier
    }

    pub(crate) fn set_paused(&mut self, paused: bool) -> bool {
        let changed = self.is_paused != paused;
        self.is_paused = paused;
        changed
    }

    pub(crate) fn set_speed(&mut self, speed: f32) -> f32 {
        std::mem::replace(&mut self.speed_multiplier, speed)
    }

    pub(crate) fn advance_by(&mut self, ticks: u64) -> Tick {
        self.tick = self.tick.saturating_add(ticks);
        self.tick
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_clamp_speed() {
        let config = ClockConfig::default();
        assert_eq!(config.clamp_speed(100.0), config.max_speed);
        assert_eq!(config.clamp_speed(0.0), config.min_speed);
        assert_eq!(config.clamp_speed(f32::NAN), 1.0);
        assert_eq!(config.clamp_speed(0.5), 0.5);
    }

    #[test]
    fn test_normalized_repairs_bounds() {
        let config = ClockConfig {
            fixed_step_seconds: -1.0,
            min_speed: 4.0,
            max_speed: 0.5,
            initial_speed: 10.0,
            start_paused: false,
            max_tick_count: 0,
        }
        .normalized();

        assert!(config.fixed_step_seconds > 0.0);
        assert_eq!(config.min_speed, 0.5);
        assert_eq!(config.max_speed, 4.0);
        assert_eq!(config.initial_speed, 4.0);
        assert_eq!(config.max_tick_count, ClockConfig::default().max_tick_count);
    }

    #[test]
    fn test_ticks_per_second() {
        assert_eq!(ClockConfig::fixed_rate(60).ticks_per_second(), 60);
        assert_eq!(ClockConfig::fixed_rate(30).ticks_per_second(), 30);
    }

    #[test]
    fn test_clock_dt_scales_with_speed() {
        let mut clock = Clock::new(&ClockConfig::fixed_rate(10));
        assert!((clock.dt_seconds() - 0.1).abs() < 1e-6);
        clock.set_speed(2.0);
        assert!((clock.dt_seconds() - 0.2).abs() < 1e-6);
    }

    proptest! {
        #[test]
        fn prop_clamp_speed_in_range(speed in proptest::num::f32::ANY) {
            let config = ClockConfig::default();
            let clamped = config.clamp_speed(speed);
            prop_assert!(clamped >= config.min_speed && clamped <= config.max_speed);
        }
    }
}
