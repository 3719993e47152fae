//! Microbenchmark for the ramp target lookup, which runs on every
//! orchestrator tick.

use criterion::{criterion_group, criterion_main, Criterion};
use stampede::schedule::{Stage, StageSchedule};
use std::hint::black_box;
use std::time::Duration;

fn bench_target_at(c: &mut Criterion) {
    let schedule = StageSchedule::new(vec![
        Stage::new(Duration::from_secs(30), 10),
        Stage::new(Duration::from_secs(60), 50),
        Stage::new(Duration::from_secs(120), 100),
        Stage::new(Duration::from_secs(30), 0),
    ])
    .expect("non-empty plan");

    c.bench_function("target_at mid-ramp", |b| {
        b.iter(|| schedule.target_at(black_box(Duration::from_secs(117))))
    });
    c.bench_function("target_at past end", |b| {
        b.iter(|| schedule.target_at(black_box(Duration::from_secs(600))))
    });
}

criterion_group!(benches, bench_target_at);
criterion_main!(benches);
