//! Host-backend benchmarks for the composite algorithms

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use strand::prelude::*;

fn host() -> HostEnvironment {
    HostEnvironment::create(DeviceKind::Cpu).unwrap()
}

fn is_even() -> HostProgram {
    HostProgram::new().kernel("is_even", |inv| {
        let i = inv.id();
        let keep = inv.buffer(0).load_i32(i) % 2 == 0;
        inv.buffer(1).store_u32(i, keep as u32);
    })
}

fn bench_filter(c: &mut Criterion) {
    let env = host();
    let predicate = Task::build(&env, &is_even(), "is_even").unwrap();
    let mut group = c.benchmark_group("filter");

    for size in [1_000, 10_000, 100_000, 1_000_000].iter() {
        let values: Vec<i32> = (0..*size).collect();
        let dataset = DeviceBuffer::from_slice(&env, &values).unwrap();

        group.bench_with_input(BenchmarkId::new("host", size), size, |b, _| {
            b.iter(|| {
                let kept = filter(&env, &dataset, &predicate).unwrap();
                black_box(kept.len())
            });
        });
    }

    group.finish();
}

fn bench_prefix_sum(c: &mut Criterion) {
    let env = host();
    let mut group = c.benchmark_group("exclusive_prefix_sum");

    for size in [1_000u32, 65_536, 1_000_000].iter() {
        let flags: Vec<u32> = (0..*size).map(|i| i % 2).collect();
        let presence = DeviceBuffer::from_slice(&env, &flags).unwrap();

        group.bench_with_input(BenchmarkId::new("host", size), size, |b, _| {
            b.iter(|| {
                let scan = exclusive_prefix_sum(&env, &presence).unwrap();
                black_box(scan.len())
            });
        });
    }

    group.finish();
}

fn bench_sort(c: &mut Criterion) {
    let env = host();
    let mut group = c.benchmark_group("sort_integers");

    for size in [1_024i32, 16_384, 131_072].iter() {
        let values: Vec<i32> = (0..*size).rev().collect();

        group.bench_with_input(BenchmarkId::new("host", size), size, |b, _| {
            b.iter(|| black_box(sort_integers(&env, &values).unwrap()));
        });
    }

    group.finish();
}

fn bench_sum(c: &mut Criterion) {
    let env = host();
    let values: Vec<i32> = (0..1_000_000).map(|i| i % 7).collect();
    let buffer = DeviceBuffer::from_slice(&env, &values).unwrap();

    c.bench_function("sum_1m", |b| {
        b.iter(|| black_box(sum(&env, &buffer).unwrap()));
    });
}

criterion_group!(benches, bench_filter, bench_prefix_sum, bench_sort, bench_sum);
criterion_main!(benches);
