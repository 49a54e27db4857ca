//! Criterion benchmarks for history query replay cost.
//!
//! Queries the fruit at the end of a long trunk under different snapshot
//! intervals: a sparse interval replays more effects per query.

use std::hint::black_box;
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use sortie_bench::bite_chain;
use sortie_engine::{Engine, EngineConfig};
use sortie_history::HistoryConfig;
use sortie_test_utils::Banana;

fn engine_with_interval(banana: &Banana, snapshot_interval: usize) -> Engine {
    let config = EngineConfig {
        history: HistoryConfig { snapshot_interval },
        ..EngineConfig::default()
    };
    let mut engine = Engine::new(Arc::clone(&banana.model), config).unwrap();
    for (id, directive) in bite_chain(1_000).iter() {
        engine.schedule_directive(id, directive).unwrap();
    }
    engine.run_to_completion().unwrap();
    engine
}

fn bench_query_latest(c: &mut Criterion) {
    let banana = Banana::new().unwrap();
    let mut group = c.benchmark_group("query_latest_1000_commits");
    for interval in [1usize, 16, 64, 1_024] {
        let engine = engine_with_interval(&banana, interval);
        let tip = engine.commits().last().unwrap().node;
        group.bench_with_input(BenchmarkId::from_parameter(interval), &tip, |b, tip| {
            b.iter(|| {
                let volume = engine
                    .history()
                    .query(*tip, &banana.fruit, |c| c.volume())
                    .unwrap();
                black_box(volume);
            });
        });
    }
    group.finish();
}

fn bench_query_every_commit(c: &mut Criterion) {
    let banana = Banana::new().unwrap();
    let engine = engine_with_interval(&banana, 64);

    c.bench_function("query_every_commit_1000", |b| {
        b.iter(|| {
            let mut total = 0.0;
            for commit in engine.commits() {
                total += engine
                    .history()
                    .query(commit.node, &banana.fruit, |c| c.volume())
                    .unwrap();
            }
            black_box(total);
        });
    });
}

criterion_group!(benches, bench_query_latest, bench_query_every_commit);
criterion_main!(benches);
