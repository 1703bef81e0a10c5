//! Command Scripts - seeded random time control input

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempus_core::{SourceId, Vec3};
use tempus_time::Command;

/// Script generator configuration
#[derive(Clone, Debug)]
pub struct ScriptConfig {
    /// Number of steps the script spans
    pub steps: u64,
    /// Probability of issuing a command on a given step
    pub command_prob: f64,
    /// Probability that an issued command is a local bubble command
    pub local_prob: f64,
    /// Largest rewind requested
    pub max_rewind: u32,
    /// Half extent of the area local commands target
    pub arena: f32,
    pub seed: u64,
}

impl Default for ScriptConfig {
    fn default() -> Self {
        ScriptConfig {
            steps: 600,
            command_prob: 0.1,
            local_prob: 0.3,
            max_rewind: 120,
            arena: 50.0,
            seed: 42,
        }
    }
}

impl ScriptConfig {
    /// Short script for quick tests
    pub fn light() -> Self {
        ScriptConfig {
            steps: 200,
            ..ScriptConfig::default()
        }
    }

    /// Dense command traffic
    pub fn busy() -> Self {
        ScriptConfig {
            steps: 1000,
            command_prob: 0.5,
            local_prob: 0.4,
            ..ScriptConfig::default()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// A command submitted before a given step
#[derive(Clone, Debug, PartialEq)]
pub struct ScriptedCommand {
    pub step: u64,
    pub command: Command,
}

/// Commands ordered by step
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CommandScript {
    steps: u64,
    commands: Vec<ScriptedCommand>,
}

impl CommandScript {
    pub fn new(steps: u64) -> Self {
        CommandScript {
            steps,
            commands: Vec::new(),
        }
    }

    /// Append a command; steps must be pushed in non-decreasing order
    pub fn push(&mut self, step: u64, command: Command) -> &mut Self {
        debug_assert!(self.commands.last().map_or(true, |c| c.step <= step));
        self.steps = self.steps.max(step + 1);
        self.commands.push(ScriptedCommand { step, command });
        self
    }

    /// Generate a script from a seeded RNG
    pub fn random(config: &ScriptConfig) -> Self {
        let mut rng = StdRng::seed_from_u64(config.seed);
        let mut script = CommandScript::new(config.steps);
        for step in 0..config.steps {
            if !rng.gen_bool(config.command_prob.clamp(0.0, 1.0)) {
                continue;
            }
            let command = if rng.gen_bool(config.local_prob.clamp(0.0, 1.0)) {
                Self::random_local(&mut rng, config)
            } else {
                Self::random_global(&mut rng, config)
            };
            script.push(step, command);
        }
        script
    }

    fn random_global(rng: &mut StdRng, config: &ScriptConfig) -> Command {
        match rng.gen_range(0..6) {
            0 => Command::pause(),
            1 => Command::resume(),
            2 => Command::set_speed(rng.gen_range(-1.0..12.0)),
            3 => Command::step_ticks(rng.gen_range(1..=5)),
            4 => Command::start_rewind(rng.gen_range(1..=config.max_rewind.max(1))),
            _ => Command::stop_rewind(),
        }
    }

    fn random_local(rng: &mut StdRng, config: &ScriptConfig) -> Command {
        let a = config.arena.abs().max(1.0);
        let center = Vec3::new(rng.gen_range(-a..a), 0.0, rng.gen_range(-a..a));
        let radius = rng.gen_range(1.0..a.max(2.0));
        let source = SourceId(rng.gen_range(1..=4));
        let command = match rng.gen_range(0..4) {
            0 => Command::pause(),
            1 => Command::set_speed(rng.gen_range(0.1..0.9)),
            2 => Command::set_speed(rng.gen_range(1.5..4.0)),
            _ => Command::resume(),
        };
        command.from_miracle(source).local(center, radius)
    }

    /// Commands to submit before `step`
    pub fn at(&self, step: u64) -> impl Iterator<Item = &Command> {
        let start = self.commands.partition_point(|c| c.step < step);
        self.commands[start..]
            .iter()
            .take_while(move |c| c.step == step)
            .map(|c| &c.command)
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}
