//! Time Engine - owns the clock and rewind mode, drains control commands

use std::collections::VecDeque;

use tempus_core::{RewindMode, RewindState, Tick};
use tracing::{debug, info, warn};

use crate::{Clock, ClockConfig, Command, CommandKind, TimeContext};

/// Change notification emitted while draining commands
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ClockEvent {
    Paused { tick: Tick },
    Resumed { tick: Tick },
    SpeedChanged { from: f32, to: f32 },
    /// Live tick stepped forward while paused
    Stepped { from: Tick, to: Tick },
    /// Playback position moved while paused
    PlaybackScrubbed { to: Tick },
    RewindStarted { from: Tick, to: Tick },
    RewindStopped { at: Tick },
    ModeChanged { from: RewindMode, to: RewindMode },
}

/// Result of one [`TimeEngine::advance`] call
#[derive(Clone, Debug)]
pub struct StepOutcome {
    /// Engine state after the step
    pub context: TimeContext,
    /// First live tick produced by this step, if the live tick moved
    pub first_new_tick: Option<Tick>,
    pub events: Vec<ClockEvent>,
    /// `LocalBubble` commands, forwarded untouched for the bubble layer
    pub bubble_requests: Vec<Command>,
}

impl StepOutcome {
    /// Frames to process, in order
    ///
    /// Each live tick produced by this step yields one Record frame. A step
    /// ending outside Record mode yields its final frame afterwards, and an
    /// idle step yields just its final frame.
    pub fn frames(&self) -> impl Iterator<Item = TimeContext> + '_ {
        let ctx = self.context;
        let live = self.first_new_tick.map(move |first| {
            (first.get()..=ctx.tick.get()).map(move |t| TimeContext {
                tick: Tick(t),
                mode: RewindMode::Record,
                target_tick: Tick(t),
                previous_mode: ctx.previous_mode,
                mode_changed: t == first.get() && ctx.previous_mode != RewindMode::Record,
                target_changed: true,
                is_paused: ctx.is_paused,
                advanced: true,
                dt_seconds: ctx.dt_seconds,
            })
        });
        let tail = if self.first_new_tick.is_none() || ctx.mode != RewindMode::Record {
            Some(ctx)
        } else {
            None
        };
        live.into_iter().flatten().chain(tail)
    }

    /// Number of live ticks produced by this step
    pub fn ticks_advanced(&self) -> u64 {
        self.first_new_tick
            .map(|first| self.context.tick - first + 1)
            .unwrap_or(0)
    }
}

/// Time Engine - the command processor
///
/// The only writer of [`Clock`] and [`RewindState`]; both change only inside
/// [`advance`](TimeEngine::advance).
pub struct TimeEngine {
    clock: Clock,
    rewind: RewindState,
    queue: VecDeque<Command>,
    config: ClockConfig,
    /// Mode and target at the end of the previous step
    last_mode: RewindMode,
    last_target: Tick,
    context: TimeContext,
}

impl TimeEngine {
    /// Create a new Time Engine with default configuration
    pub fn new() -> Self {
        Self::with_config(ClockConfig::default())
    }

    /// Create a new Time Engine with custom configuration
    pub fn with_config(config: ClockConfig) -> Self {
        let config = config.normalized();
        let clock = Clock::new(&config);
        let context = TimeContext {
            tick: clock.tick(),
            mode: RewindMode::Record,
            target_tick: clock.tick(),
            previous_mode: RewindMode::Record,
            mode_changed: false,
            target_changed: false,
            is_paused: clock.is_paused(),
            advanced: false,
            dt_seconds: 0.0,
        };
        TimeEngine {
            clock,
            rewind: RewindState::record(),
            queue: VecDeque::new(),
            config,
            last_mode: RewindMode::Record,
            last_target: Tick::ZERO,
            context,
        }
    }

    /// Queue a command for the next step
    ///
    /// Never rejects; numeric parameters are clamped here.
    pub fn submit(&mut self, command: Command) {
        let command = command.clamped(&self.config);
        debug!(
            kind = ?command.kind,
            scope = ?command.scope,
            source = ?command.source,
            param = command.numeric_param,
            "command queued"
        );
        self.queue.push_back(command);
    }

    /// Run one simulation step: drain commands, then progress time
    pub fn advance(&mut self) -> StepOutcome {
        let mut events = Vec::new();
        let mut bubble_requests = Vec::new();
        let mut first_new_tick = None;

        // CatchUp lasts exactly one step
        if self.rewind.mode == RewindMode::CatchUp {
            self.set_mode(RewindMode::Record, &mut events);
        }
        let mode_before_commands = self.rewind.mode;

        while let Some(command) = self.queue.pop_front() {
            if command.is_local() {
                self.forward_local(command, &mut bubble_requests);
            } else {
                self.apply(&command, &mut events, &mut first_new_tick);
            }
        }

        // A mode entered by a command this step is observed for one full frame
        // before it starts moving.
        if !self.clock.is_paused() && self.rewind.mode == mode_before_commands {
            match self.rewind.mode {
                RewindMode::Record => {
                    let tick = self.clock.advance_by(1);
                    first_new_tick.get_or_insert(tick);
                }
                RewindMode::Playback => {
                    self.rewind.playback_tick = self.rewind.playback_tick.next();
                    if self.rewind.playback_tick >= self.clock.tick() {
                        self.rewind.playback_tick = self.clock.tick();
                        self.set_mode(RewindMode::CatchUp, &mut events);
                    }
                }
                RewindMode::CatchUp => {}
            }
        }

        let context = self.build_context(first_new_tick.is_some());
        self.last_mode = context.mode;
        self.last_target = context.target_tick;
        self.context = context;

        StepOutcome {
            context,
            first_new_tick,
            events,
            bubble_requests,
        }
    }

    fn apply(
        &mut self,
        command: &Command,
        events: &mut Vec<ClockEvent>,
        first_new_tick: &mut Option<Tick>,
    ) {
        let tick = self.clock.tick();
        match command.kind {
            CommandKind::Pause => {
                if self.clock.set_paused(true) {
                    events.push(ClockEvent::Paused { tick });
                }
            }
            CommandKind::Resume => {
                if self.clock.set_paused(false) {
                    events.push(ClockEvent::Resumed { tick });
                }
            }
            CommandKind::SetSpeed => {
                let to = command.speed();
                let from = self.clock.set_speed(to);
                if from != to {
                    events.push(ClockEvent::SpeedChanged { from, to });
                }
            }
            CommandKind::StepTicks => {
                if !self.clock.is_paused() {
                    debug!(%tick, "step ignored while running");
                    return;
                }
                let count = command.tick_count();
                match self.rewind.mode {
                    RewindMode::Record => {
                        first_new_tick.get_or_insert(tick.next());
                        let to = self.clock.advance_by(count);
                        events.push(ClockEvent::Stepped { from: tick, to });
                    }
                    RewindMode::Playback => {
                        let to = self.rewind.playback_tick.saturating_add(count).min(tick);
                        self.rewind.playback_tick = to;
                        events.push(ClockEvent::PlaybackScrubbed { to });
                    }
                    // Entered by a StopRewind earlier in the same drain
                    RewindMode::CatchUp => {
                        debug!(%tick, "step ignored during catch-up");
                    }
                }
            }
            CommandKind::StartRewind => {
                if self.rewind.mode != RewindMode::Record {
                    debug!(%tick, mode = ?self.rewind.mode, "rewind ignored, already rewinding");
                    return;
                }
                let to = tick.saturating_sub(command.tick_count());
                self.rewind.playback_tick = to;
                self.set_mode(RewindMode::Playback, events);
                info!(from = %tick, to = %to, "rewind started");
                events.push(ClockEvent::RewindStarted { from: tick, to });
            }
            CommandKind::StopRewind => {
                if self.rewind.mode != RewindMode::Playback {
                    debug!(%tick, "stop ignored, not in playback");
                    return;
                }
                let at = self.rewind.playback_tick;
                self.rewind.playback_tick = tick;
                self.set_mode(RewindMode::CatchUp, events);
                info!(%at, live = %tick, "rewind stopped");
                events.push(ClockEvent::RewindStopped { at });
            }
        }
    }

    fn forward_local(&self, command: Command, bubble_requests: &mut Vec<Command>) {
        let needs_volume = matches!(command.kind, CommandKind::Pause | CommandKind::SetSpeed);
        let supported = needs_volume || command.kind == CommandKind::Resume;
        if !supported || (needs_volume && command.volume.is_none()) {
            warn!(
                kind = ?command.kind,
                source = ?command.source_id,
                "local command dropped"
            );
            return;
        }
        bubble_requests.push(command);
    }

    fn set_mode(&mut self, mode: RewindMode, events: &mut Vec<ClockEvent>) {
        let from = self.rewind.mode;
        if from == mode {
            return;
        }
        self.rewind.mode = mode;
        if mode == RewindMode::Record {
            self.rewind.playback_tick = Tick::ZERO;
        }
        debug!(?from, to = ?mode, tick = %self.clock.tick(), "rewind mode changed");
        events.push(ClockEvent::ModeChanged { from, to: mode });
    }

    fn build_context(&self, advanced: bool) -> TimeContext {
        let mode = self.rewind.mode;
        let target_tick = self.rewind.target_tick(self.clock.tick());
        let live = advanced && mode == RewindMode::Record;
        TimeContext {
            tick: self.clock.tick(),
            mode,
            target_tick,
            previous_mode: self.last_mode,
            mode_changed: mode != self.last_mode,
            target_changed: target_tick != self.last_target,
            is_paused: self.clock.is_paused(),
            advanced: live,
            dt_seconds: if advanced { self.clock.dt_seconds() } else { 0.0 },
        }
    }

    /// Read-only clock
    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    /// Read-only rewind state
    pub fn rewind(&self) -> RewindState {
        self.rewind
    }

    /// Context of the most recent step
    pub fn context(&self) -> TimeContext {
        self.context
    }

    pub fn pending_commands(&self) -> usize {
        self.queue.len()
    }

    pub fn config(&self) -> &ClockConfig {
        &self.config
    }
}

impl Default for TimeEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempus_core::Vec3;

    fn run(engine: &mut TimeEngine, steps: usize) {
        for _ in 0..steps {
            engine.advance();
        }
    }

    #[test]
    fn test_speed_pause_step_sequence() {
        let mut engine = TimeEngine::new();

        engine.submit(Command::set_speed(0.5));
        engine.advance();
        assert_eq!(engine.clock().speed_multiplier(), 0.5);
        assert_eq!(engine.clock().tick(), Tick(1));

        engine.submit(Command::pause());
        engine.advance();
        assert_eq!(engine.clock().tick(), Tick(1));
        assert!(engine.clock().is_paused());

        engine.submit(Command::step_ticks(1));
        let outcome = engine.advance();
        assert_eq!(engine.clock().tick(), Tick(2));
        assert!(engine.clock().is_paused());
        assert_eq!(outcome.ticks_advanced(), 1);
    }

    #[test]
    fn test_step_ignored_while_running() {
        let mut engine = TimeEngine::new();
        engine.submit(Command::step_ticks(10));
        engine.advance();
        assert_eq!(engine.clock().tick(), Tick(1));
    }

    #[test]
    fn test_multi_tick_step_yields_frame_per_tick() {
        let mut engine = TimeEngine::new();
        engine.submit(Command::pause());
        engine.advance();
        engine.submit(Command::step_ticks(5));
        let outcome = engine.advance();

        let ticks: Vec<_> = outcome.frames().map(|f| f.tick).collect();
        assert_eq!(ticks, vec![Tick(1), Tick(2), Tick(3), Tick(4), Tick(5)]);
        assert!(outcome.frames().all(|f| f.advanced && f.mode == RewindMode::Record));
    }

    #[test]
    fn test_rewind_playback_catch_up_record() {
        let mut engine = TimeEngine::new();
        run(&mut engine, 100);
        assert_eq!(engine.clock().tick(), Tick(100));

        engine.submit(Command::start_rewind(30));
        let outcome = engine.advance();
        assert_eq!(outcome.context.mode, RewindMode::Playback);
        assert_eq!(outcome.context.target_tick, Tick(70));
        assert!(outcome.context.mode_changed);
        assert_eq!(engine.clock().tick(), Tick(100));

        for expected in 71..100 {
            let outcome = engine.advance();
            assert_eq!(outcome.context.mode, RewindMode::Playback);
            assert_eq!(outcome.context.target_tick, Tick(expected));
            assert!(engine.rewind().playback_tick <= engine.clock().tick());
        }

        let outcome = engine.advance();
        assert_eq!(outcome.context.mode, RewindMode::CatchUp);
        assert_eq!(outcome.context.target_tick, Tick(100));
        assert_eq!(outcome.context.previous_mode, RewindMode::Playback);

        let outcome = engine.advance();
        assert_eq!(outcome.context.mode, RewindMode::Record);
        assert_eq!(engine.clock().tick(), Tick(101));
        let first = outcome.frames().next().unwrap();
        assert!(first.mode_changed);
        assert_eq!(first.previous_mode, RewindMode::CatchUp);
    }

    #[test]
    fn test_rewind_clamps_at_zero() {
        let mut engine = TimeEngine::new();
        run(&mut engine, 5);
        engine.submit(Command::start_rewind(50));
        engine.advance();
        assert_eq!(engine.rewind().playback_tick, Tick(0));
    }

    #[test]
    fn test_start_rewind_mid_playback_is_noop() {
        let mut engine = TimeEngine::new();
        run(&mut engine, 50);
        engine.submit(Command::start_rewind(10));
        engine.advance();
        let before = engine.rewind().playback_tick;

        engine.submit(Command::start_rewind(40));
        engine.advance();
        assert_eq!(engine.rewind().playback_tick, before.next());
    }

    #[test]
    fn test_stop_rewind_returns_to_live_tick() {
        let mut engine = TimeEngine::new();
        run(&mut engine, 50);
        engine.submit(Command::start_rewind(20));
        run(&mut engine, 3);

        engine.submit(Command::stop_rewind());
        let outcome = engine.advance();
        assert_eq!(outcome.context.mode, RewindMode::CatchUp);
        assert_eq!(outcome.context.target_tick, Tick(50));
        assert!(outcome
            .events
            .iter()
            .any(|e| matches!(e, ClockEvent::RewindStopped { .. })));

        engine.advance();
        assert_eq!(engine.rewind().mode, RewindMode::Record);
        assert_eq!(engine.clock().tick(), Tick(51));
    }

    #[test]
    fn test_paused_playback_scrubs_without_passing_live() {
        let mut engine = TimeEngine::new();
        run(&mut engine, 20);
        engine.submit(Command::pause());
        engine.submit(Command::start_rewind(10));
        engine.advance();
        assert_eq!(engine.rewind().playback_tick, Tick(10));

        engine.submit(Command::step_ticks(4));
        engine.advance();
        assert_eq!(engine.rewind().playback_tick, Tick(14));

        engine.submit(Command::step_ticks(100));
        engine.advance();
        assert_eq!(engine.rewind().playback_tick, Tick(20));
        assert_eq!(engine.rewind().mode, RewindMode::Playback);
    }

    #[test]
    fn test_step_after_stop_in_same_drain_is_ignored() {
        let mut engine = TimeEngine::new();
        run(&mut engine, 20);
        engine.submit(Command::pause());
        engine.submit(Command::start_rewind(10));
        engine.advance();

        engine.submit(Command::stop_rewind());
        engine.submit(Command::step_ticks(3));
        let outcome = engine.advance();
        assert_eq!(outcome.context.mode, RewindMode::CatchUp);
        assert_eq!(outcome.first_new_tick, None);
        assert_eq!(engine.clock().tick(), Tick(20));
        assert_eq!(engine.rewind().playback_tick, Tick(20));
        assert!(!outcome.events.iter().any(|e| matches!(
            e,
            ClockEvent::Stepped { .. } | ClockEvent::PlaybackScrubbed { .. }
        )));
    }

    #[test]
    fn test_last_writer_wins_on_speed() {
        let mut engine = TimeEngine::new();
        engine.submit(Command::set_speed(2.0));
        engine.submit(Command::set_speed(4.0));
        engine.advance();
        assert_eq!(engine.clock().speed_multiplier(), 4.0);
    }

    #[test]
    fn test_local_commands_are_forwarded() {
        let mut engine = TimeEngine::new();
        engine.submit(Command::pause().local(Vec3::ZERO, 5.0));
        engine.submit(Command::set_speed(0.5).local(Vec3::new(1.0, 0.0, 1.0), 3.0));
        engine.submit(Command::start_rewind(5).local(Vec3::ZERO, 5.0));
        let outcome = engine.advance();

        assert!(!engine.clock().is_paused());
        assert_eq!(engine.clock().tick(), Tick(1));
        assert_eq!(outcome.bubble_requests.len(), 2);
        assert_eq!(engine.rewind().mode, RewindMode::Record);
    }

    #[test]
    fn test_pause_events_only_on_change() {
        let mut engine = TimeEngine::new();
        engine.submit(Command::pause());
        engine.submit(Command::pause());
        let outcome = engine.advance();
        let pauses = outcome
            .events
            .iter()
            .filter(|e| matches!(e, ClockEvent::Paused { .. }))
            .count();
        assert_eq!(pauses, 1);
    }

    #[test]
    fn test_idle_paused_frame() {
        let mut engine = TimeEngine::new();
        engine.submit(Command::pause());
        engine.advance();
        let outcome = engine.advance();
        let frames: Vec<_> = outcome.frames().collect();
        assert_eq!(frames.len(), 1);
        assert!(frames[0].is_idle());
        assert_eq!(frames[0].dt_seconds, 0.0);
    }
}
