//! Benchmarks for spark-live
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use spark_live::{batch, tick, LiveArray, LiveObject, Observable, Subject, Value};

// =============================================================================
// FIELD BENCHMARKS
// =============================================================================

fn bench_plain_assign(c: &mut Criterion) {
    let subject = Subject::new();
    let mut i = 0i64;
    c.bench_function("plain_assign", |b| {
        b.iter(|| {
            i += 1;
            subject.assign("x", black_box(i));
        })
    });
}

fn bench_trapped_assign(c: &mut Criterion) {
    let subject = Subject::new();
    subject.on("x", |e| {
        black_box(e.value());
    });
    let mut i = 0i64;
    c.bench_function("trapped_assign", |b| {
        b.iter(|| {
            i += 1;
            subject.assign("x", black_box(i));
        })
    });
}

fn bench_trapped_assign_same_value(c: &mut Criterion) {
    let subject = Subject::new();
    subject.on("x", |_| {});
    subject.assign("x", 42);
    c.bench_function("trapped_assign_same_value", |b| {
        b.iter(|| subject.assign("x", black_box(42)))
    });
}

fn bench_computed_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("computed_chain");

    for depth in [1usize, 10, 50] {
        group.bench_with_input(BenchmarkId::new("depth", depth), &depth, |b, &depth| {
            let subject = Subject::new();
            subject.assign("f0", 0);
            for level in 1..=depth {
                let previous = format!("f{}", level - 1);
                let dependency = previous.clone();
                subject.define(format!("f{level}"), previous, move |s| {
                    Ok(Value::from(s.get(dependency.as_str()).as_int().unwrap_or(0) + 1))
                });
            }
            let mut i = 0i64;
            b.iter(|| {
                i += 1;
                subject.assign("f0", black_box(i));
            })
        });
    }

    group.finish();
}

// =============================================================================
// LIVE ARRAY BENCHMARKS
// =============================================================================

fn bench_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("append");

    group.bench_function("plain", |b| {
        let array = LiveArray::new();
        b.iter(|| array.append(black_box(1)))
    });

    group.bench_function("live_with_map", |b| {
        let array = LiveArray::new();
        let _copy = array.map();
        b.iter(|| array.append(black_box(1)))
    });

    group.finish();
}

fn bench_live_sort_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("live_sort_insert");

    for size in [10usize, 100, 1000] {
        group.bench_with_input(BenchmarkId::new("size", size), &size, |b, &size| {
            let source: LiveArray = (0..size as i64).rev().collect();
            let sorted = source.live_sort(|a, b| a.as_int().cmp(&b.as_int()));
            b.iter(|| {
                source.append(black_box(size as i64 / 2));
                source.remove_last();
            });
            black_box(sorted.len());
        });
    }

    group.finish();
}

fn bench_batched_change(c: &mut Criterion) {
    let array = LiveArray::new();
    array.on("$change", |_| {});
    c.bench_function("batched_change_100_appends", |b| {
        b.iter(|| {
            batch(|| {
                for i in 0..100 {
                    array.append(i);
                }
            });
            array.splice_range(0, 100, Vec::new());
            tick();
        })
    });
}

criterion_group!(
    field_benches,
    bench_plain_assign,
    bench_trapped_assign,
    bench_trapped_assign_same_value,
    bench_computed_chain,
);

criterion_group!(
    array_benches,
    bench_append,
    bench_live_sort_insert,
    bench_batched_change,
);

criterion_main!(field_benches, array_benches);
