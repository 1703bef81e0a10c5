//! Rewindable producers and ordered record/restore
//!
//! Every rewindable subsystem writes one block per recorded tick and reads it
//! back in the same order. Blocks are matched to producers by registration
//! index and verified by tag; a producer whose block is missing or malformed
//! is skipped while the rest restore normally.

use bytes::Bytes;
use tempus_core::{TempusError, TempusResult, Tick};
use tempus_time::{GateSpec, PhaseContext, PhaseGate, TimeContext};
use tracing::warn;

use crate::{BlockReader, BlockWriter, HistoryStore, SnapshotReader};

/// Contract every rewindable subsystem implements
pub trait Rewindable {
    /// Human readable name for logs and reports
    fn name(&self) -> &str;

    /// Block tag; stable across builds and unique within a registry
    fn tag(&self) -> u16;

    /// Phases this producer takes part in
    fn gate(&self) -> GateSpec {
        GateSpec::all()
    }

    /// Simulate one live tick (Record phase)
    fn advance(&mut self, _ctx: &PhaseContext) {}

    /// Serialize current state
    fn write(&self, tick: Tick, out: &mut BlockWriter);

    /// Overwrite live state in place from a block written by [`write`](Rewindable::write)
    fn load(&mut self, input: &mut BlockReader) -> TempusResult<()>;

    /// Called after a successful CatchUp load to rebuild derived caches
    fn on_catch_up(&mut self, _ctx: &PhaseContext) {}
}

/// Outcome of restoring one tick
#[derive(Clone, Debug, Default)]
pub struct RestoreReport {
    pub tick: Tick,
    pub restored: usize,
    /// Producers not interested in this phase
    pub skipped: usize,
    pub failed: Vec<(String, TempusError)>,
}

impl RestoreReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Run Record-phase simulation for every interested producer, in order
pub fn advance_all(producers: &mut [&mut dyn Rewindable], frame: &TimeContext) -> usize {
    let mut ran = 0;
    for producer in producers.iter_mut() {
        if let Some(ctx) = PhaseGate::evaluate(&producer.gate(), frame) {
            if ctx.is_record_phase {
                producer.advance(&ctx);
                ran += 1;
            }
        }
    }
    ran
}

/// Write one block per producer, in order, and commit the record
///
/// Every producer writes regardless of its gate so block indices always
/// line up with registration order.
pub fn record_all(store: &mut HistoryStore, tick: Tick, producers: &[&mut dyn Rewindable]) -> usize {
    let mut builder = store.begin_record(tick);
    for producer in producers.iter() {
        let region = builder.region(producer.tag());
        producer.write(tick, region);
    }
    store.end_record(builder)
}

/// Load a committed payload into every interested producer, in order
pub fn restore_all(
    payload: Bytes,
    frame: &TimeContext,
    producers: &mut [&mut dyn Rewindable],
) -> RestoreReport {
    let reader = SnapshotReader::parse(payload);
    let mut report = RestoreReport {
        tick: frame.target_tick,
        ..RestoreReport::default()
    };

    for (index, producer) in producers.iter_mut().enumerate() {
        let Some(ctx) = PhaseGate::evaluate(&producer.gate(), frame) else {
            report.skipped += 1;
            continue;
        };
        if ctx.is_record_phase {
            report.skipped += 1;
            continue;
        }

        let result = reader
            .block_at(index, producer.tag())
            .and_then(|mut block| producer.load(&mut block));
        match result {
            Ok(()) => {
                if ctx.is_catch_up_phase {
                    producer.on_catch_up(&ctx);
                }
                report.restored += 1;
            }
            Err(err) => {
                warn!(
                    producer = producer.name(),
                    tick = %frame.target_tick,
                    error = %err,
                    "producer restore failed, skipped"
                );
                report.failed.push((producer.name().to_owned(), err));
            }
        }
    }

    report
}

/// Ordered set of externally owned rewindable producers
#[derive(Default)]
pub struct ProducerRegistry {
    producers: Vec<Box<dyn Rewindable + Send>>,
}

impl ProducerRegistry {
    pub fn new() -> Self {
        ProducerRegistry::default()
    }

    /// Append a producer; its position is its block index
    ///
    /// Returns an error if the tag is already taken.
    pub fn register(&mut self, producer: Box<dyn Rewindable + Send>) -> TempusResult<usize> {
        if self.producers.iter().any(|p| p.tag() == producer.tag()) {
            return Err(TempusError::Config(format!(
                "duplicate producer tag {:#06x} for {}",
                producer.tag(),
                producer.name()
            )));
        }
        self.producers.push(producer);
        Ok(self.producers.len() - 1)
    }

    pub fn len(&self) -> usize {
        self.producers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.producers.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.producers.iter().map(|p| p.name()).collect()
    }

    pub fn tags(&self) -> Vec<u16> {
        self.producers.iter().map(|p| p.tag()).collect()
    }

    pub fn position(&self, name: &str) -> TempusResult<usize> {
        self.producers
            .iter()
            .position(|p| p.name() == name)
            .ok_or_else(|| TempusError::UnknownProducer(name.to_owned()))
    }

    pub fn get(&self, index: usize) -> Option<&(dyn Rewindable + Send)> {
        self.producers.get(index).map(|p| p.as_ref())
    }

    /// Producers in registration order
    pub fn as_dyn_mut(&mut self) -> Vec<&mut dyn Rewindable> {
        self.producers
            .iter_mut()
            .map(|p| p.as_mut() as &mut dyn Rewindable)
            .collect()
    }

    pub fn advance(&mut self, frame: &TimeContext) -> usize {
        advance_all(&mut self.as_dyn_mut(), frame)
    }

    pub fn record(&mut self, store: &mut HistoryStore, tick: Tick) -> usize {
        record_all(store, tick, &self.as_dyn_mut())
    }

    pub fn restore(&mut self, payload: Bytes, frame: &TimeContext) -> RestoreReport {
        restore_all(payload, frame, &mut self.as_dyn_mut())
    }
}
