//! Benchmarks for history recording and restore

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use tempus_core::{RewindMode, Tick};
use tempus_history::{record_all, restore_all, HistoryConfig, HistoryStore, Rewindable};
use tempus_test::{Harness, HarnessConfig, WalkerField, WalkerProducer};
use tempus_time::TimeContext;

fn playback(target: Tick) -> TimeContext {
    TimeContext {
        tick: target,
        mode: RewindMode::Playback,
        target_tick: target,
        previous_mode: RewindMode::Playback,
        mode_changed: false,
        target_changed: true,
        is_paused: false,
        advanced: false,
        dt_seconds: 0.0,
    }
}

fn bench_record(c: &mut Criterion) {
    let mut group = c.benchmark_group("history_record");

    for count in [64usize, 256, 1024] {
        let field = WalkerField::random(count, 100.0, 1).into_shared();
        let mut producer = WalkerProducer::new(field);
        let mut store = HistoryStore::from_config(&HistoryConfig::default());
        let mut tick = 0u64;

        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
            b.iter(|| {
                tick += 1;
                black_box(record_all(
                    &mut store,
                    Tick(tick),
                    &[&mut producer as &mut dyn Rewindable],
                ))
            })
        });
    }

    group.finish();
}

fn bench_try_get(c: &mut Criterion) {
    let mut store = HistoryStore::from_config(&HistoryConfig::long_rewind());
    for t in 0..1000 {
        let mut builder = store.begin_record(Tick(t));
        builder.region(0x7001).put_u64(t);
        store.end_record(builder);
    }
    let newest = store.newest_tick().unwrap_or(Tick::ZERO);

    c.bench_function("history_try_get", |b| {
        let mut offset = 0u64;
        b.iter(|| {
            offset = (offset + 7) % 600;
            black_box(store.try_get(black_box(newest.saturating_sub(offset))))
        })
    });
}

fn bench_restore(c: &mut Criterion) {
    let field = WalkerField::random(256, 100.0, 1).into_shared();
    let mut producer = WalkerProducer::new(field);
    let mut store = HistoryStore::new(8);
    record_all(&mut store, Tick(1), &[&mut producer as &mut dyn Rewindable]);
    let payload = store.try_get(Tick(1)).unwrap_or_default();
    let frame = playback(Tick(1));

    c.bench_function("history_restore_256", |b| {
        b.iter(|| {
            let report = restore_all(
                payload.clone(),
                &frame,
                &mut [&mut producer as &mut dyn Rewindable],
            );
            black_box(report.restored)
        })
    });
}

fn bench_simulation_step(c: &mut Criterion) {
    let mut harness = Harness::new(HarnessConfig {
        walkers: 256,
        ..HarnessConfig::default()
    })
    .unwrap();

    c.bench_function("simulation_step_256", |b| {
        b.iter(|| black_box(harness.step().recorded.len()))
    });
}

criterion_group!(
    benches,
    bench_record,
    bench_try_get,
    bench_restore,
    bench_simulation_step,
);
criterion_main!(benches);
