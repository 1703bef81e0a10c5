//! Time control commands

use tempus_core::{PlayerId, SourceId, Sphere, Vec3};

use crate::ClockConfig;

/// What a command does
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CommandKind {
    Pause = 0x01,
    Resume = 0x02,
    /// `numeric_param` = new speed multiplier
    SetSpeed = 0x03,
    /// `numeric_param` = tick count; honored only while paused
    StepTicks = 0x04,
    /// `numeric_param` = ticks to rewind
    StartRewind = 0x05,
    /// Abort an in-progress playback and return to the live tick
    StopRewind = 0x06,
}

impl CommandKind {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x01 => Some(CommandKind::Pause),
            0x02 => Some(CommandKind::Resume),
            0x03 => Some(CommandKind::SetSpeed),
            0x04 => Some(CommandKind::StepTicks),
            0x05 => Some(CommandKind::StartRewind),
            0x06 => Some(CommandKind::StopRewind),
            _ => None,
        }
    }

    /// Kinds whose parameter is a tick count
    #[inline]
    pub fn takes_tick_count(self) -> bool {
        matches!(self, CommandKind::StepTicks | CommandKind::StartRewind)
    }
}

/// Where a command applies
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum CommandScope {
    /// The global clock
    #[default]
    Global,
    /// A spatial volume; becomes a time bubble instead of a clock change
    LocalBubble,
}

/// Who issued a command
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum CommandSource {
    #[default]
    Player,
    Miracle,
}

/// A queued time control command
///
/// `priority` is carried for future arbitration. Today the queue is drained
/// in submission order and the last writer of a field wins.
#[derive(Clone, Debug, PartialEq)]
pub struct Command {
    pub kind: CommandKind,
    pub scope: CommandScope,
    pub source: CommandSource,
    pub source_id: SourceId,
    pub player_id: PlayerId,
    pub priority: u8,
    pub numeric_param: f64,
    /// Target volume for `LocalBubble` scope
    pub volume: Option<Sphere>,
}

impl Command {
    pub fn new(kind: CommandKind, numeric_param: f64) -> Self {
        Command {
            kind,
            scope: CommandScope::Global,
            source: CommandSource::Player,
            source_id: SourceId::ZERO,
            player_id: PlayerId::LOCAL,
            priority: 0,
            numeric_param,
            volume: None,
        }
    }

    pub fn pause() -> Self {
        Self::new(CommandKind::Pause, 0.0)
    }

    pub fn resume() -> Self {
        Self::new(CommandKind::Resume, 0.0)
    }

    pub fn set_speed(speed: f32) -> Self {
        Self::new(CommandKind::SetSpeed, speed as f64)
    }

    pub fn step_ticks(ticks: u32) -> Self {
        Self::new(CommandKind::StepTicks, ticks as f64)
    }

    pub fn start_rewind(ticks: u32) -> Self {
        Self::new(CommandKind::StartRewind, ticks as f64)
    }

    pub fn stop_rewind() -> Self {
        Self::new(CommandKind::StopRewind, 0.0)
    }

    /// Issued by a miracle instance
    pub fn from_miracle(mut self, source_id: SourceId) -> Self {
        self.source = CommandSource::Miracle;
        self.source_id = source_id;
        self
    }

    pub fn by_player(mut self, player_id: PlayerId) -> Self {
        self.player_id = player_id;
        self
    }

    pub fn with_source_id(mut self, source_id: SourceId) -> Self {
        self.source_id = source_id;
        self
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    /// Restrict the command to a spatial volume
    pub fn local(mut self, center: Vec3, radius: f32) -> Self {
        self.scope = CommandScope::LocalBubble;
        self.volume = Some(Sphere::new(center, radius));
        self
    }

    #[inline]
    pub fn is_local(&self) -> bool {
        self.scope == CommandScope::LocalBubble
    }

    /// Speed parameter (meaningful for `SetSpeed`)
    #[inline]
    pub fn speed(&self) -> f32 {
        self.numeric_param as f32
    }

    /// Tick count parameter, never below one
    #[inline]
    pub fn tick_count(&self) -> u64 {
        if self.numeric_param.is_finite() && self.numeric_param >= 1.0 {
            self.numeric_param as u64
        } else {
            1
        }
    }

    /// Clamp the numeric parameter into its valid range
    ///
    /// Tick counts land in `[1, max_tick_count]`.
    pub fn clamped(mut self, config: &ClockConfig) -> Self {
        match self.kind {
            // Local speed requests become bubble scales, bounded by the bubble limits instead.
            CommandKind::SetSpeed if !self.is_local() => {
                self.numeric_param = config.clamp_speed(self.speed()) as f64;
            }
            CommandKind::StepTicks | CommandKind::StartRewind => {
                let cap = config.max_tick_count.max(1) as u64;
                self.numeric_param = self.tick_count().min(cap) as f64;
            }
            _ => {}
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_byte_roundtrip() {
        for b in 0x01..=0x06 {
            let kind = CommandKind::from_byte(b).unwrap();
            assert_eq!(kind as u8, b);
        }
        assert!(CommandKind::from_byte(0).is_none());
    }

    #[test]
    fn test_clamped_speed() {
        let config = ClockConfig::default();
        let cmd = Command::set_speed(99.0).clamped(&config);
        assert_eq!(cmd.speed(), config.max_speed);

        let cmd = Command::set_speed(-3.0).clamped(&config);
        assert_eq!(cmd.speed(), config.min_speed);
    }

    #[test]
    fn test_clamped_tick_count() {
        let config = ClockConfig::default();
        assert_eq!(Command::step_ticks(0).clamped(&config).tick_count(), 1);
        assert_eq!(
            Command::new(CommandKind::StartRewind, f64::NAN)
                .clamped(&config)
                .tick_count(),
            1
        );
        assert_eq!(Command::start_rewind(30).clamped(&config).tick_count(), 30);
    }

    #[test]
    fn test_clamped_tick_count_capped() {
        let config = ClockConfig::default();
        let cap = config.max_tick_count as u64;
        assert_eq!(
            Command::new(CommandKind::StepTicks, 1e30)
                .clamped(&config)
                .tick_count(),
            cap
        );
        assert_eq!(
            Command::new(CommandKind::StartRewind, f64::INFINITY)
                .clamped(&config)
                .tick_count(),
            1
        );
        assert_eq!(Command::step_ticks(u32::MAX).clamped(&config).tick_count(), cap);
    }

    #[test]
    fn test_local_speed_not_clock_clamped() {
        let config = ClockConfig::default();
        let cmd = Command::set_speed(0.01)
            .local(Vec3::ZERO, 4.0)
            .clamped(&config);
        assert!(cmd.is_local());
        assert!((cmd.speed() - 0.01).abs() < 1e-6);
    }

    #[test]
    fn test_builder_metadata() {
        let cmd = Command::pause()
            .from_miracle(SourceId::new(7))
            .by_player(PlayerId::new(2))
            .with_priority(5);
        assert_eq!(cmd.source, CommandSource::Miracle);
        assert_eq!(cmd.source_id, SourceId::new(7));
        assert_eq!(cmd.player_id, PlayerId::new(2));
        assert_eq!(cmd.priority, 5);
    }
}
