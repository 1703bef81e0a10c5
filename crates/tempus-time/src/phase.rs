//! Execution phase gate
//!
//! Every time-aware subsystem declares which phases it cares about and asks
//! the gate, once per tick, whether and how it should run. The answer is a
//! pure function of the engine's [`TimeContext`], so the phase sequence is
//! identical across runs given the same commands.

use tempus_core::{Phase, RewindMode, Tick};

/// Set of phases a subsystem participates in
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PhaseMask(pub u8);

impl PhaseMask {
    pub const NONE: PhaseMask = PhaseMask(0);
    pub const ALL: PhaseMask = PhaseMask(Self::RECORD | Self::CATCH_UP | Self::PLAYBACK);
    pub const RECORD_ONLY: PhaseMask = PhaseMask(Self::RECORD);
    pub const RESTORE_ONLY: PhaseMask = PhaseMask(Self::CATCH_UP | Self::PLAYBACK);

    // Phase bits
    pub const RECORD: u8 = 0b0000_0001;
    pub const CATCH_UP: u8 = 0b0000_0010;
    pub const PLAYBACK: u8 = 0b0000_0100;

    #[inline]
    pub fn new(bits: u8) -> Self {
        PhaseMask(bits)
    }

    #[inline]
    fn bit(phase: Phase) -> u8 {
        match phase {
            Phase::Record => Self::RECORD,
            Phase::CatchUp => Self::CATCH_UP,
            Phase::Playback => Self::PLAYBACK,
        }
    }

    #[inline]
    pub fn contains(self, phase: Phase) -> bool {
        self.0 & Self::bit(phase) != 0
    }

    #[inline]
    pub fn with(self, phase: Phase) -> Self {
        PhaseMask(self.0 | Self::bit(phase))
    }
}

/// Declaration a subsystem hands to the gate
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GateSpec {
    pub interest: PhaseMask,
    /// Skip idle frames: clock paused, nothing stepped, mode and target unchanged
    pub skip_while_paused: bool,
}

impl GateSpec {
    pub const fn new(interest: PhaseMask, skip_while_paused: bool) -> Self {
        GateSpec {
            interest,
            skip_while_paused,
        }
    }

    /// Every phase, skipping idle paused frames
    pub const fn all() -> Self {
        GateSpec::new(PhaseMask::ALL, true)
    }
}

impl Default for GateSpec {
    fn default() -> Self {
        GateSpec::all()
    }
}

/// Engine state for one processed tick
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimeContext {
    /// Live tick
    pub tick: Tick,
    pub mode: RewindMode,
    /// Tick whose state this frame produces (Record, CatchUp) or restores (Playback)
    pub target_tick: Tick,
    pub previous_mode: RewindMode,
    pub mode_changed: bool,
    pub target_changed: bool,
    pub is_paused: bool,
    /// The live tick moved forward in this frame
    pub advanced: bool,
    /// Seconds simulated by this frame; zero unless `advanced`
    pub dt_seconds: f32,
}

impl TimeContext {
    #[inline]
    pub fn phase(&self) -> Phase {
        self.mode.phase()
    }

    /// Nothing happened this frame
    #[inline]
    pub fn is_idle(&self) -> bool {
        self.is_paused && !self.advanced && !self.mode_changed && !self.target_changed
    }
}

/// Context handed to an interested subsystem
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PhaseContext {
    pub tick: Tick,
    pub target_tick: Tick,
    pub is_record_phase: bool,
    pub is_catch_up_phase: bool,
    pub is_playback_phase: bool,
    pub mode_changed_this_frame: bool,
    pub previous_mode: RewindMode,
    pub is_paused: bool,
    pub dt_seconds: f32,
}

impl PhaseContext {
    #[inline]
    pub fn phase(&self) -> Phase {
        if self.is_record_phase {
            Phase::Record
        } else if self.is_catch_up_phase {
            Phase::CatchUp
        } else {
            Phase::Playback
        }
    }
}

/// Stateless phase gate
pub struct PhaseGate;

impl PhaseGate {
    /// Evaluate a subsystem's declaration against the current frame
    ///
    /// Returns `None` when the subsystem is not interested this tick.
    pub fn evaluate(spec: &GateSpec, ctx: &TimeContext) -> Option<PhaseContext> {
        let phase = ctx.phase();
        if !spec.interest.contains(phase) {
            return None;
        }
        if spec.skip_while_paused && ctx.is_idle() {
            return None;
        }

        Some(PhaseContext {
            tick: ctx.tick,
            target_tick: ctx.target_tick,
            is_record_phase: phase == Phase::Record,
            is_catch_up_phase: phase == Phase::CatchUp,
            is_playback_phase: phase == Phase::Playback,
            mode_changed_this_frame: ctx.mode_changed,
            previous_mode: ctx.previous_mode,
            is_paused: ctx.is_paused,
            dt_seconds: ctx.dt_seconds,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(mode: RewindMode) -> TimeContext {
        TimeContext {
            tick: Tick(10),
            mode,
            target_tick: Tick(10),
            previous_mode: mode,
            mode_changed: false,
            target_changed: true,
            is_paused: false,
            advanced: mode == RewindMode::Record,
            dt_seconds: if mode == RewindMode::Record { 0.016 } else { 0.0 },
        }
    }

    #[test]
    fn test_mask_contains() {
        let mask = PhaseMask::RECORD_ONLY;
        assert!(mask.contains(Phase::Record));
        assert!(!mask.contains(Phase::Playback));
        assert!(mask.with(Phase::Playback).contains(Phase::Playback));
        assert!(PhaseMask::ALL.contains(Phase::CatchUp));
        assert!(!PhaseMask::NONE.contains(Phase::CatchUp));
    }

    #[test]
    fn test_gate_filters_by_interest() {
        let spec = GateSpec::new(PhaseMask::RECORD_ONLY, false);
        assert!(PhaseGate::evaluate(&spec, &frame(RewindMode::Record)).is_some());
        assert!(PhaseGate::evaluate(&spec, &frame(RewindMode::Playback)).is_none());
        assert!(PhaseGate::evaluate(&spec, &frame(RewindMode::CatchUp)).is_none());
    }

    #[test]
    fn test_gate_reports_phase_flags() {
        let ctx = PhaseGate::evaluate(&GateSpec::all(), &frame(RewindMode::CatchUp)).unwrap();
        assert!(ctx.is_catch_up_phase);
        assert!(!ctx.is_record_phase);
        assert!(!ctx.is_playback_phase);
        assert_eq!(ctx.phase(), Phase::CatchUp);
    }

    #[test]
    fn test_skip_while_paused_only_skips_idle_frames() {
        let mut idle = frame(RewindMode::Record);
        idle.is_paused = true;
        idle.advanced = false;
        idle.target_changed = false;
        idle.dt_seconds = 0.0;

        let skipping = GateSpec::new(PhaseMask::ALL, true);
        let running = GateSpec::new(PhaseMask::ALL, false);
        assert!(PhaseGate::evaluate(&skipping, &idle).is_none());
        assert!(PhaseGate::evaluate(&running, &idle).is_some());

        // A mode change while paused must still reach the subsystem
        let mut changed = idle;
        changed.mode = RewindMode::Playback;
        changed.previous_mode = RewindMode::Record;
        changed.mode_changed = true;
        assert!(PhaseGate::evaluate(&skipping, &changed).is_some());
    }
}
