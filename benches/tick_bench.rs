use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use warfront_sim::{PlayerId, SimWorld, Tier, UnitKind};

/// Skirmish with `per_side` soldiers already fielded around each base.
fn populated(per_side: u32) -> SimWorld {
    let mut sim = SimWorld::skirmish(7);
    sim.tick(0.1);
    for i in 0..per_side {
        let dy = (i % 20) as f32 - 10.0;
        let dx = (i / 20) as f32;
        let _ = sim.spawn_unit(PlayerId(1), UnitKind::Soldier, Tier(1), 34.0 + dx, 60.0 + dy);
        let _ = sim.spawn_unit(PlayerId(2), UnitKind::Soldier, Tier(1), 86.0 - dx, 60.0 + dy);
    }
    sim
}

fn bench_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("tick");

    for per_side in [10u32, 50, 100] {
        group.bench_with_input(BenchmarkId::new("units_per_side", per_side), &per_side, |b, &n| {
            b.iter_batched(
                || populated(n),
                |mut sim| {
                    for _ in 0..10 {
                        sim.tick(0.1);
                    }
                },
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

fn bench_snapshot(c: &mut Criterion) {
    let mut sim = populated(100);
    c.bench_function("snapshot_json", |b| b.iter(|| sim.snapshot_json()));
}

criterion_group!(tick_benches, bench_tick, bench_snapshot);
criterion_main!(tick_benches);
