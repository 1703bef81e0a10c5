//! Rewind modes and execution phases

use crate::Tick;

/// Global rewind mode
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum RewindMode {
    /// Live forward simulation; state changes are captured into history
    #[default]
    Record = 0,
    /// State is driven from historical snapshots
    Playback = 1,
    /// One-step transient reconciling caches after leaving playback
    CatchUp = 2,
}

impl RewindMode {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(RewindMode::Record),
            1 => Some(RewindMode::Playback),
            2 => Some(RewindMode::CatchUp),
            _ => None,
        }
    }

    #[inline]
    pub fn to_byte(self) -> u8 {
        self as u8
    }

    /// The execution phase producers observe in this mode
    #[inline]
    pub fn phase(self) -> Phase {
        match self {
            RewindMode::Record => Phase::Record,
            RewindMode::Playback => Phase::Playback,
            RewindMode::CatchUp => Phase::CatchUp,
        }
    }

    #[inline]
    pub fn is_history_driven(self) -> bool {
        self != RewindMode::Record
    }
}

/// Execution phase of a time-aware subsystem for one tick
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    Record,
    CatchUp,
    Playback,
}

/// Read-only view of the rewind state
///
/// INVARIANT: `playback_tick <= live_tick` whenever `mode != Record`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct RewindState {
    pub mode: RewindMode,
    pub playback_tick: Tick,
}

impl RewindState {
    pub fn record() -> Self {
        RewindState::default()
    }

    /// Tick whose snapshot drives state in the current mode
    pub fn target_tick(&self, live_tick: Tick) -> Tick {
        match self.mode {
            RewindMode::Playback => self.playback_tick,
            RewindMode::Record | RewindMode::CatchUp => live_tick,
        }
    }
}
