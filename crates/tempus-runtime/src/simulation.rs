//! Simulation - the fixed-step driver

use parking_lot::RwLockReadGuard;
use tempus_core::{BubbleId, EntityId, Phase, RewindMode, RewindState, SourceId, TempusResult, Tick};
use tempus_distortion::{
    BubbleManager, BubbleMode, LashbackConfig, LashbackEvent, PositionProvider, RiskState,
    RiskTracker,
};
use tempus_history::{
    advance_all, record_all, restore_all, HistoryStore, ProducerRegistry, RestoreReport,
    Rewindable, SharedHistory,
};
use tempus_time::{Clock, ClockEvent, Command, CommandKind, TimeContext, TimeEngine};
use tracing::{debug, info, warn};

use crate::{MissPolicy, RuntimeConfig};

/// Counters across the simulation's lifetime
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SimulationStats {
    pub steps: u64,
    pub ticks_recorded: u64,
    pub restores: u64,
    /// Rewind targets with no exact record
    pub history_misses: u64,
    pub producer_failures: u64,
}

/// Everything that happened during one [`Simulation::step`]
#[derive(Clone, Debug)]
pub struct StepReport {
    /// Engine state after the step
    pub context: TimeContext,
    pub clock_events: Vec<ClockEvent>,
    pub recorded: Vec<Tick>,
    pub restores: Vec<RestoreReport>,
    pub spawned_bubbles: Vec<BubbleId>,
    /// Removed by a local resume
    pub removed_bubbles: Vec<BubbleId>,
    pub expired_bubbles: Vec<BubbleId>,
    pub lashback_events: Vec<LashbackEvent>,
}

impl StepReport {
    fn new(context: TimeContext, clock_events: Vec<ClockEvent>) -> Self {
        StepReport {
            context,
            clock_events,
            recorded: Vec::new(),
            restores: Vec::new(),
            spawned_bubbles: Vec::new(),
            removed_bubbles: Vec::new(),
            expired_bubbles: Vec::new(),
            lashback_events: Vec::new(),
        }
    }
}

/// Owns the time engine, history and built-in producers
///
/// Records are laid out as: bubbles, lashback, then registered producers in
/// registration order.
pub struct Simulation {
    config: RuntimeConfig,
    engine: TimeEngine,
    history: SharedHistory,
    horizon: u64,
    bubbles: BubbleManager,
    lashback: RiskTracker,
    producers: ProducerRegistry,
    baseline_recorded: bool,
    stats: SimulationStats,
}

impl Simulation {
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        let config = config.normalized();
        let horizon = config.history.horizon_ticks();
        info!(
            hz = config.clock.ticks_per_second(),
            horizon,
            max_records = config.history.max_records(),
            "simulation created"
        );
        Simulation {
            engine: TimeEngine::with_config(config.clock.clone()),
            history: HistoryStore::from_config(&config.history).into_shared(),
            horizon,
            bubbles: BubbleManager::new(config.bubbles.clone()),
            lashback: RiskTracker::new(config.lashback.clone()),
            producers: ProducerRegistry::new(),
            baseline_recorded: false,
            stats: SimulationStats::default(),
            config,
        }
    }

    /// Register an external rewindable producer
    ///
    /// Register everything before the first step; records taken earlier
    /// carry no block for later producers.
    pub fn register(&mut self, producer: Box<dyn Rewindable + Send>) -> TempusResult<usize> {
        let index = self.producers.register(producer)?;
        debug!(index, names = ?self.producers.names(), "producer registered");
        Ok(index)
    }

    /// Queue a time control command for the next step
    pub fn submit(&mut self, command: Command) {
        self.engine.submit(command);
    }

    /// Run one fixed step
    ///
    /// Local bubble requests apply before the step's frames, so a bubble
    /// spawned this step is part of the tick it was requested on.
    pub fn step(&mut self, positions: &dyn PositionProvider) -> StepReport {
        if !self.baseline_recorded {
            self.record_baseline();
        }

        let outcome = self.engine.advance();
        let mut report = StepReport::new(outcome.context, outcome.events.clone());
        for event in &report.clock_events {
            debug!(?event, "clock event");
        }

        for request in outcome.bubble_requests.iter().cloned() {
            self.apply_bubble_request(request, &mut report);
        }
        let distorted = !report.spawned_bubbles.is_empty() || !report.removed_bubbles.is_empty();

        // Ticks below this are pruned before the step ends, so they run unrecorded
        let keep_from = outcome.context.tick.saturating_sub(self.horizon);
        for frame in outcome.frames() {
            match frame.phase() {
                Phase::Record if frame.advanced => {
                    self.record_frame(&frame, positions, frame.tick >= keep_from, &mut report)
                }
                Phase::Record => {}
                Phase::Playback if frame.mode_changed || frame.target_changed => {
                    self.restore_frame(&frame, &mut report)
                }
                Phase::Playback => {}
                Phase::CatchUp => self.restore_frame(&frame, &mut report),
            }
        }

        if distorted && report.recorded.is_empty() {
            self.recommit_live_tick(&mut report);
        }

        self.stats.steps += 1;
        report
    }

    fn rewindables<'a>(
        bubbles: &'a mut BubbleManager,
        lashback: &'a mut RiskTracker,
        producers: &'a mut ProducerRegistry,
    ) -> Vec<&'a mut dyn Rewindable> {
        let mut all: Vec<&'a mut dyn Rewindable> = Vec::with_capacity(producers.len() + 2);
        all.push(bubbles);
        all.push(lashback);
        all.extend(producers.as_dyn_mut());
        all
    }

    fn record_baseline(&mut self) {
        let tick = self.engine.clock().tick();
        let producers = Self::rewindables(&mut self.bubbles, &mut self.lashback, &mut self.producers);
        record_all(&mut self.history.write(), tick, &producers);
        self.baseline_recorded = true;
        self.stats.ticks_recorded += 1;
        debug!(%tick, "baseline recorded");
    }

    /// Replace the live tick's record after an unrecorded state change
    fn recommit_live_tick(&mut self, report: &mut StepReport) {
        let tick = self.engine.clock().tick();
        let producers = Self::rewindables(&mut self.bubbles, &mut self.lashback, &mut self.producers);
        record_all(&mut self.history.write(), tick, &producers);
        report.recorded.push(tick);
        self.stats.ticks_recorded += 1;
        debug!(%tick, "live tick re-recorded");
    }

    fn record_frame(
        &mut self,
        frame: &TimeContext,
        positions: &dyn PositionProvider,
        keep: bool,
        report: &mut StepReport,
    ) {
        let mut store = self.history.write();
        store.prune_older_than(frame.tick.saturating_sub(self.horizon));

        report
            .expired_bubbles
            .extend(self.bubbles.update(frame.tick, positions));
        report
            .lashback_events
            .extend(self.lashback.tick(frame.dt_seconds));

        let mut producers =
            Self::rewindables(&mut self.bubbles, &mut self.lashback, &mut self.producers);
        advance_all(&mut producers, frame);
        if !keep {
            return;
        }
        record_all(&mut store, frame.tick, &producers);

        report.recorded.push(frame.tick);
        self.stats.ticks_recorded += 1;
    }

    fn restore_frame(&mut self, frame: &TimeContext, report: &mut StepReport) {
        let target = frame.target_tick;
        let found = {
            let store = self.history.read();
            match store.try_get(target) {
                Some(payload) => Some((target, payload)),
                None => {
                    self.stats.history_misses += 1;
                    // CatchUp always falls back, there is no rewind left to abort
                    let snap = frame.phase() == Phase::CatchUp
                        || self.config.miss_policy == MissPolicy::SnapToNearest;
                    let nearest = if snap { store.nearest(target) } else { None };
                    warn!(
                        %target,
                        mode = ?frame.mode,
                        nearest = ?nearest,
                        oldest = ?store.oldest_tick(),
                        "history miss"
                    );
                    nearest.and_then(|tick| store.try_get(tick).map(|payload| (tick, payload)))
                }
            }
        };

        let Some((tick, payload)) = found else {
            if frame.phase() == Phase::Playback {
                info!(%target, "aborting rewind after history miss");
                self.engine.submit(Command::stop_rewind());
            }
            return;
        };

        let restore_ctx = TimeContext {
            target_tick: tick,
            ..*frame
        };
        let mut producers =
            Self::rewindables(&mut self.bubbles, &mut self.lashback, &mut self.producers);
        let restored = restore_all(payload, &restore_ctx, &mut producers);

        self.stats.restores += 1;
        self.stats.producer_failures += restored.failed.len() as u64;
        debug!(
            %tick,
            phase = ?frame.phase(),
            restored = restored.restored,
            failed = restored.failed.len(),
            "tick restored"
        );
        report.restores.push(restored);
    }

    fn apply_bubble_request(&mut self, command: Command, report: &mut StepReport) {
        if self.engine.rewind().mode != RewindMode::Record {
            warn!(kind = ?command.kind, "local command ignored while history drives state");
            return;
        }

        let source = command.source_id;
        let (mode, scale) = match command.kind {
            CommandKind::Resume => {
                report
                    .removed_bubbles
                    .extend(self.bubbles.remove_by_source(source.0));
                return;
            }
            CommandKind::Pause => (BubbleMode::Stasis, 0.0),
            CommandKind::SetSpeed if command.speed() < 1.0 => (BubbleMode::Scale, command.speed()),
            CommandKind::SetSpeed if command.speed() > 1.0 => {
                (BubbleMode::FastForward, command.speed())
            }
            CommandKind::SetSpeed => {
                // Normal speed inside a volume is the same as lifting the distortion
                report
                    .removed_bubbles
                    .extend(self.bubbles.remove_by_source(source.0));
                return;
            }
            _ => {
                warn!(kind = ?command.kind, "unsupported local command");
                return;
            }
        };
        let Some(volume) = command.volume else {
            warn!(kind = ?command.kind, "local command without volume");
            return;
        };

        let id = self.bubbles.spawn(
            volume.center,
            volume.radius,
            mode,
            scale,
            self.config.local_bubble_duration_ticks,
            command.priority,
            command.player_id.0,
            source.0,
        );
        let applied = self.bubbles.get(id).map_or(scale, |b| b.scale);
        self.lashback
            .trigger(source, LashbackConfig::severity(mode, applied));
        report.spawned_bubbles.push(id);
    }

    pub fn clock(&self) -> &Clock {
        self.engine.clock()
    }

    pub fn rewind(&self) -> RewindState {
        self.engine.rewind()
    }

    pub fn context(&self) -> TimeContext {
        self.engine.context()
    }

    pub fn engine(&self) -> &TimeEngine {
        &self.engine
    }

    #[inline]
    pub fn local_time_scale(&self, entity: EntityId) -> f32 {
        self.bubbles.local_time_scale(entity)
    }

    pub fn risk(&self, source: SourceId) -> RiskState {
        self.lashback.state(source)
    }

    pub fn bubbles(&self) -> &BubbleManager {
        &self.bubbles
    }

    /// Direct bubble access; spawning here does not raise lashback risk
    pub fn bubbles_mut(&mut self) -> &mut BubbleManager {
        &mut self.bubbles
    }

    pub fn lashback(&self) -> &RiskTracker {
        &self.lashback
    }

    pub fn lashback_mut(&mut self) -> &mut RiskTracker {
        &mut self.lashback
    }

    pub fn producers(&self) -> &ProducerRegistry {
        &self.producers
    }

    pub fn producers_mut(&mut self) -> &mut ProducerRegistry {
        &mut self.producers
    }

    /// Handle for inspectors reading history concurrently
    pub fn history_handle(&self) -> SharedHistory {
        self.history.clone()
    }

    pub fn history(&self) -> RwLockReadGuard<'_, HistoryStore> {
        self.history.read()
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn stats(&self) -> &SimulationStats {
        &self.stats
    }
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new()
    }
}
