//! Lashback - risk accumulated by distorting time
//!
//! Every source (a player, a miracle instance) carries a risk level in
//! `[0, 1]`. Risk decays linearly each tick and rises when the source
//! triggers a distortion. The `active` flag is hysteresis-gated: it turns on
//! at `activate_threshold` and only turns off again below `clear_threshold`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tempus_core::{SourceId, TempusResult, Tick};
use tempus_history::{BlockReader, BlockWriter, Rewindable};
use tracing::info;

use crate::BubbleMode;

/// Block tag of the risk table in tick records
pub const LASHBACK_BLOCK_TAG: u16 = 0x0B02;

/// Risk tracker tuning
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LashbackConfig {
    /// Risk removed per simulated second
    pub decay_per_second: f32,
    /// Multiplier applied to each trigger's severity
    pub gain_factor: f32,
    pub activate_threshold: f32,
    pub clear_threshold: f32,
}

impl Default for LashbackConfig {
    fn default() -> Self {
        LashbackConfig {
            decay_per_second: 0.05,
            gain_factor: 0.35,
            activate_threshold: 0.8,
            clear_threshold: 0.3,
        }
    }
}

impl LashbackConfig {
    /// Severity of spawning a bubble of `mode` with `scale`
    pub fn severity(mode: BubbleMode, scale: f32) -> f32 {
        match mode {
            BubbleMode::Stasis => 1.0,
            BubbleMode::Scale => (1.0 - scale).clamp(0.0, 1.0),
            BubbleMode::FastForward => 0.0,
        }
    }
}

/// Risk of one source
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RiskState {
    pub risk: f32,
    pub active: bool,
}

/// Hysteresis transition reported by [`RiskTracker::tick`]
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LashbackEvent {
    Activated { source: SourceId, risk: f32 },
    Cleared { source: SourceId, risk: f32 },
}

/// Per-source risk table
#[derive(Clone, Debug, Default)]
pub struct RiskTracker {
    config: LashbackConfig,
    states: BTreeMap<SourceId, RiskState>,
    /// Triggers applied on the next tick, in submission order
    pending: Vec<(SourceId, f32)>,
}

impl RiskTracker {
    pub fn new(config: LashbackConfig) -> Self {
        RiskTracker {
            config,
            states: BTreeMap::new(),
            pending: Vec::new(),
        }
    }

    /// Queue a triggering event; severity is clamped to `[0, 1]`
    pub fn trigger(&mut self, source: SourceId, severity: f32) {
        let severity = if severity.is_nan() {
            0.0
        } else {
            severity.clamp(0.0, 1.0)
        };
        if severity > 0.0 {
            self.pending.push((source, severity));
        }
    }

    /// Decay every source by `dt` seconds, apply pending triggers and update hysteresis
    pub fn tick(&mut self, dt_seconds: f32) -> Vec<LashbackEvent> {
        let decay = self.config.decay_per_second * dt_seconds.max(0.0);
        for state in self.states.values_mut() {
            state.risk = (state.risk - decay).max(0.0);
        }

        for (source, severity) in self.pending.drain(..) {
            let state = self.states.entry(source).or_default();
            state.risk = (state.risk + severity * self.config.gain_factor).clamp(0.0, 1.0);
        }

        let mut events = Vec::new();
        for (&source, state) in self.states.iter_mut() {
            if !state.active && state.risk >= self.config.activate_threshold {
                state.active = true;
                info!(?source, risk = state.risk, "lashback activated");
                events.push(LashbackEvent::Activated {
                    source,
                    risk: state.risk,
                });
            } else if state.active && state.risk < self.config.clear_threshold {
                state.active = false;
                info!(?source, risk = state.risk, "lashback cleared");
                events.push(LashbackEvent::Cleared {
                    source,
                    risk: state.risk,
                });
            }
        }

        // Fully decayed sources read back as the default state anyway
        self.states.retain(|_, s| s.active || s.risk > 0.0);
        events
    }

    /// Zeroed for unknown sources
    pub fn state(&self, source: SourceId) -> RiskState {
        self.states.get(&source).copied().unwrap_or_default()
    }

    pub fn sources(&self) -> impl Iterator<Item = (SourceId, RiskState)> + '_ {
        self.states.iter().map(|(&s, &r)| (s, r))
    }

    pub fn pending_triggers(&self) -> usize {
        self.pending.len()
    }

    pub fn config(&self) -> &LashbackConfig {
        &self.config
    }
}

impl Rewindable for RiskTracker {
    fn name(&self) -> &str {
        "lashback"
    }

    fn tag(&self) -> u16 {
        LASHBACK_BLOCK_TAG
    }

    fn write(&self, _tick: Tick, out: &mut BlockWriter) {
        out.put_u32(self.states.len() as u32);
        for (source, state) in &self.states {
            out.put_u64(source.0);
            out.put_f32(state.risk);
            out.put_bool(state.active);
        }
        // Triggers raised after the tick's update still belong to this tick
        out.put_u32(self.pending.len() as u32);
        for (source, severity) in &self.pending {
            out.put_u64(source.0);
            out.put_f32(*severity);
        }
    }

    fn load(&mut self, input: &mut BlockReader) -> TempusResult<()> {
        let count = input.get_u32()? as usize;
        let mut states = BTreeMap::new();
        for _ in 0..count {
            let source = SourceId(input.get_u64()?);
            let risk = input.get_f32()?;
            let active = input.get_bool()?;
            states.insert(source, RiskState { risk, active });
        }
        let count = input.get_u32()? as usize;
        let mut pending = Vec::with_capacity(count.min(64));
        for _ in 0..count {
            let source = SourceId(input.get_u64()?);
            pending.push((source, input.get_f32()?));
        }
        self.states = states;
        self.pending = pending;
        Ok(())
    }
}
