//! Harness - runs scripts against a full simulation and records trajectories

use tempus_core::{RewindMode, TempusResult, Tick};
use tempus_runtime::{RuntimeConfig, Simulation, StepReport};

use crate::{CommandScript, SharedWalkers, Walker, WalkerField, WalkerProducer};

/// Observable state after one step
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TrajectoryFrame {
    pub step: u64,
    pub tick: Tick,
    pub mode: RewindMode,
    pub playback_tick: Tick,
    pub is_paused: bool,
    /// Speed multiplier bits
    pub speed_bits: u32,
    /// Bit-level digest of every walker
    pub walker_digest: u64,
}

/// Frames of one run, one per step
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Trajectory {
    pub frames: Vec<TrajectoryFrame>,
}

impl Trajectory {
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn last(&self) -> Option<&TrajectoryFrame> {
        self.frames.last()
    }

    /// Steps that ended in `mode`
    pub fn count_mode(&self, mode: RewindMode) -> usize {
        self.frames.iter().filter(|f| f.mode == mode).count()
    }
}

/// Harness configuration
#[derive(Clone, Debug)]
pub struct HarnessConfig {
    pub runtime: RuntimeConfig,
    pub walkers: usize,
    pub arena: f32,
    pub seed: u64,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        HarnessConfig {
            runtime: RuntimeConfig::default(),
            walkers: 32,
            arena: 50.0,
            seed: 42,
        }
    }
}

/// A simulation with a walker field registered as a producer
pub struct Harness {
    sim: Simulation,
    walkers: SharedWalkers,
    step: u64,
}

impl Harness {
    pub fn new(config: HarnessConfig) -> TempusResult<Self> {
        let walkers = WalkerField::random(config.walkers, config.arena, config.seed).into_shared();
        let mut sim = Simulation::with_config(config.runtime);
        sim.register(Box::new(WalkerProducer::new(walkers.clone())))?;
        Ok(Harness {
            sim,
            walkers,
            step: 0,
        })
    }

    /// Advance one step, feeding walker positions and scales through the simulation
    pub fn step(&mut self) -> StepReport {
        let positions = {
            let mut field = self.walkers.write();
            field.set_scales(self.sim.bubbles().scales());
            field.positions()
        };
        let report = self.sim.step(&positions);
        self.step += 1;
        report
    }

    /// Run every step of `script`, submitting its commands first
    pub fn run(&mut self, script: &CommandScript) -> Trajectory {
        let mut trajectory = Trajectory::default();
        for step in 0..script.steps() {
            for command in script.at(step) {
                self.sim.submit(command.clone());
            }
            self.step();
            trajectory.frames.push(self.frame());
        }
        trajectory
    }

    /// Step `n` times without commands
    pub fn run_idle(&mut self, n: u64) {
        for _ in 0..n {
            self.step();
        }
    }

    pub fn frame(&self) -> TrajectoryFrame {
        let clock = self.sim.clock();
        let rewind = self.sim.rewind();
        TrajectoryFrame {
            step: self.step,
            tick: clock.tick(),
            mode: rewind.mode,
            playback_tick: rewind.playback_tick,
            is_paused: clock.is_paused(),
            speed_bits: clock.speed_multiplier().to_bits(),
            walker_digest: self.walker_digest(),
        }
    }

    pub fn walker_digest(&self) -> u64 {
        self.walkers.read().digest()
    }

    pub fn walkers(&self) -> Vec<Walker> {
        self.walkers.read().walkers()
    }

    pub fn walker_field(&self) -> SharedWalkers {
        self.walkers.clone()
    }

    pub fn sim(&self) -> &Simulation {
        &self.sim
    }

    pub fn sim_mut(&mut self) -> &mut Simulation {
        &mut self.sim
    }
}

/// Run `script` from a cold start
pub fn run_script(config: HarnessConfig, script: &CommandScript) -> TempusResult<Trajectory> {
    Ok(Harness::new(config)?.run(script))
}
