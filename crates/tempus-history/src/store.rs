//! History Store - bounded, tick-addressable snapshot storage

use std::collections::VecDeque;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tempus_core::Tick;
use tracing::{debug, trace};

use crate::RecordBuilder;

/// History sizing
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Simulation rate the horizon is expressed against
    pub ticks_per_second: u32,
    /// How far back a rewind may reach
    pub max_rewind_seconds: f32,
    /// Extra ticks kept beyond the rewind window
    pub slack_ticks: u32,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        HistoryConfig {
            ticks_per_second: 60,
            max_rewind_seconds: 3.0,
            slack_ticks: 0,
        }
    }
}

impl HistoryConfig {
    /// Ten seconds of rewind with a small slack
    pub fn long_rewind() -> Self {
        HistoryConfig {
            ticks_per_second: 60,
            max_rewind_seconds: 10.0,
            slack_ticks: 30,
        }
    }

    /// Ticks older than `tick - horizon` are pruned
    pub fn horizon_ticks(&self) -> u64 {
        let seconds = if self.max_rewind_seconds.is_finite() {
            self.max_rewind_seconds.max(0.0)
        } else {
            0.0
        };
        (self.ticks_per_second as f64 * seconds as f64).ceil() as u64 + self.slack_ticks as u64
    }

    /// Record bound matching the horizon (the live tick plus `horizon` older ones)
    pub fn max_records(&self) -> usize {
        self.horizon_ticks().saturating_add(1).min(usize::MAX as u64) as usize
    }
}

/// A committed tick record
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SnapshotRecord {
    pub tick: Tick,
    pub payload: Bytes,
}

/// Counters for inspection and logging
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HistoryStats {
    pub commits: u64,
    /// Records dropped by the hard bound
    pub evictions: u64,
    /// Records dropped by horizon pruning
    pub pruned: u64,
    /// Records dropped because an older tick was re-recorded
    pub diverged: u64,
}

/// Ordered ring of tick records
///
/// INVARIANT: record ticks are strictly increasing front to back, and the
/// number of records never exceeds `max_records`.
#[derive(Debug)]
pub struct HistoryStore {
    records: VecDeque<SnapshotRecord>,
    max_records: usize,
    stats: HistoryStats,
}

/// Store shared with read-only inspectors
pub type SharedHistory = Arc<RwLock<HistoryStore>>;

impl HistoryStore {
    pub fn new(max_records: usize) -> Self {
        let max_records = max_records.max(1);
        HistoryStore {
            records: VecDeque::with_capacity(max_records.min(4096)),
            max_records,
            stats: HistoryStats::default(),
        }
    }

    pub fn from_config(config: &HistoryConfig) -> Self {
        Self::new(config.max_records())
    }

    pub fn into_shared(self) -> SharedHistory {
        Arc::new(RwLock::new(self))
    }

    /// Start a record for `tick`
    pub fn begin_record(&self, tick: Tick) -> RecordBuilder {
        RecordBuilder::new(tick)
    }

    /// Commit a record atomically; returns its index in the ring
    ///
    /// Re-recording a tick at or before the newest record drops every record
    /// from that tick on, since the timeline has diverged.
    pub fn end_record(&mut self, builder: RecordBuilder) -> usize {
        let tick = builder.tick();
        let payload = builder.finish();

        if self.newest_tick().is_some_and(|newest| newest >= tick) {
            let keep = self.records.partition_point(|r| r.tick < tick);
            let dropped = self.records.len() - keep;
            self.records.truncate(keep);
            self.stats.diverged += dropped as u64;
            debug!(%tick, dropped, "history diverged, newer records dropped");
        }

        let bytes = payload.len();
        self.records.push_back(SnapshotRecord { tick, payload });
        self.stats.commits += 1;

        while self.records.len() > self.max_records {
            self.records.pop_front();
            self.stats.evictions += 1;
        }

        trace!(%tick, bytes, records = self.records.len(), "record committed");
        self.records.len() - 1
    }

    /// Exact payload for a committed tick
    pub fn try_get(&self, tick: Tick) -> Option<Bytes> {
        self.index_of(tick).map(|i| self.records[i].payload.clone())
    }

    pub fn record(&self, tick: Tick) -> Option<&SnapshotRecord> {
        self.index_of(tick).map(|i| &self.records[i])
    }

    pub fn contains(&self, tick: Tick) -> bool {
        self.index_of(tick).is_some()
    }

    fn index_of(&self, tick: Tick) -> Option<usize> {
        self.records.binary_search_by_key(&tick, |r| r.tick).ok()
    }

    /// Evict records strictly older than `min_tick`
    pub fn prune_older_than(&mut self, min_tick: Tick) -> usize {
        let count = self.records.partition_point(|r| r.tick < min_tick);
        if count > 0 {
            self.records.drain(..count);
            self.stats.pruned += count as u64;
            debug!(%min_tick, count, "history pruned");
        }
        count
    }

    /// Resize the bound, evicting the oldest records if it shrank
    pub fn set_max_records(&mut self, max_records: usize) {
        self.max_records = max_records.max(1);
        while self.records.len() > self.max_records {
            self.records.pop_front();
            self.stats.evictions += 1;
        }
    }

    /// Closest recorded tick; ties resolve to the older one
    pub fn nearest(&self, tick: Tick) -> Option<Tick> {
        match self.records.binary_search_by_key(&tick, |r| r.tick) {
            Ok(_) => Some(tick),
            Err(i) => {
                let before = i.checked_sub(1).and_then(|j| self.records.get(j));
                let after = self.records.get(i);
                match (before, after) {
                    (Some(b), Some(a)) => {
                        if tick - b.tick <= a.tick - tick {
                            Some(b.tick)
                        } else {
                            Some(a.tick)
                        }
                    }
                    (Some(b), None) => Some(b.tick),
                    (None, Some(a)) => Some(a.tick),
                    (None, None) => None,
                }
            }
        }
    }

    pub fn oldest_tick(&self) -> Option<Tick> {
        self.records.front().map(|r| r.tick)
    }

    pub fn newest_tick(&self) -> Option<Tick> {
        self.records.back().map(|r| r.tick)
    }

    pub fn ticks(&self) -> impl Iterator<Item = Tick> + '_ {
        self.records.iter().map(|r| r.tick)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn max_records(&self) -> usize {
        self.max_records
    }

    /// Total payload bytes held
    pub fn memory_bytes(&self) -> usize {
        self.records.iter().map(|r| r.payload.len()).sum()
    }

    pub fn stats(&self) -> &HistoryStats {
        &self.stats
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn commit(store: &mut HistoryStore, tick: u64) {
        let mut builder = store.begin_record(Tick(tick));
        builder.region(1).put_u64(tick * 10);
        store.end_record(builder);
    }

    #[test]
    fn test_horizon_scenario() {
        let config = HistoryConfig::default();
        assert_eq!(config.horizon_ticks(), 180);

        let mut store = HistoryStore::from_config(&config);
        for tick in 0..=200u64 {
            store.prune_older_than(Tick(tick).saturating_sub(config.horizon_ticks()));
            commit(&mut store, tick);
        }

        assert!(store.try_get(Tick(10)).is_none());
        assert!(store.try_get(Tick(195)).is_some());
        assert_eq!(store.oldest_tick(), Some(Tick(20)));
        assert_eq!(store.newest_tick(), Some(Tick(200)));
        assert!(store.len() <= store.max_records());
    }

    #[test]
    fn test_bound_evicts_oldest() {
        let mut store = HistoryStore::new(4);
        for tick in 0..5 {
            commit(&mut store, tick);
        }
        assert_eq!(store.len(), 4);
        assert!(store.try_get(Tick(0)).is_none());
        assert!(store.try_get(Tick(1)).is_some());
        assert_eq!(store.stats().evictions, 1);
    }

    #[test]
    fn test_uncommitted_record_invisible() {
        let mut store = HistoryStore::new(8);
        commit(&mut store, 1);
        let mut builder = store.begin_record(Tick(2));
        builder.region(1).put_u64(20);
        assert!(store.try_get(Tick(2)).is_none());
        store.end_record(builder);
        assert!(store.try_get(Tick(2)).is_some());
    }

    #[test]
    fn test_rerecord_drops_newer() {
        let mut store = HistoryStore::new(16);
        for tick in 0..10 {
            commit(&mut store, tick);
        }
        commit(&mut store, 5);
        assert_eq!(store.newest_tick(), Some(Tick(5)));
        assert_eq!(store.len(), 6);
        assert!(store.try_get(Tick(7)).is_none());
        assert_eq!(store.stats().diverged, 5);
    }

    #[test]
    fn test_set_max_records_shrinks() {
        let mut store = HistoryStore::new(10);
        for tick in 0..10 {
            commit(&mut store, tick);
        }
        store.set_max_records(3);
        assert_eq!(store.ticks().collect::<Vec<_>>(), vec![Tick(7), Tick(8), Tick(9)]);

        store.set_max_records(0);
        assert_eq!(store.max_records(), 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_nearest() {
        let mut store = HistoryStore::new(16);
        for tick in [10, 20, 30] {
            commit(&mut store, tick);
        }
        assert_eq!(store.nearest(Tick(20)), Some(Tick(20)));
        assert_eq!(store.nearest(Tick(15)), Some(Tick(10)));
        assert_eq!(store.nearest(Tick(16)), Some(Tick(20)));
        assert_eq!(store.nearest(Tick(0)), Some(Tick(10)));
        assert_eq!(store.nearest(Tick(99)), Some(Tick(30)));
        assert_eq!(HistoryStore::new(1).nearest(Tick(5)), None);
    }

    #[test]
    fn test_shared_handle_reads() {
        let mut store = HistoryStore::new(4);
        commit(&mut store, 3);
        let shared = store.into_shared();
        assert_eq!(shared.read().newest_tick(), Some(Tick(3)));
        commit(&mut shared.write(), 4);
        assert_eq!(shared.read().len(), 2);
    }

    proptest! {
        #[test]
        fn prop_nearest_is_closest(
            ticks in prop::collection::btree_set(0u64..1000, 1..40),
            query in 0u64..1200,
        ) {
            let mut store = HistoryStore::new(64);
            for &tick in &ticks {
                commit(&mut store, tick);
            }
            let found = store.nearest(Tick(query)).unwrap();
            prop_assert!(store.contains(found));
            let best = ticks.iter().map(|&t| t.abs_diff(query)).min().unwrap();
            prop_assert_eq!(found.get().abs_diff(query), best);
        }
    }
}
