use std::sync::Arc;

use batchview::{Batch, IterOptions, MemStore, Slice};
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

fn setup_batch(points: u64, range_keys: u64) -> Batch {
    let store = Arc::new(MemStore::new());
    for i in (0..points).step_by(2) {
        store.put(format!("key{i:010}"), "base");
    }
    let mut batch = Batch::new(store);
    for i in (1..points).step_by(2) {
        batch.set(format!("key{i:010}"), vec![b'x'; 100]).unwrap();
    }
    for i in 0..range_keys {
        let start = format!("key{:010}", i * 10);
        let end = format!("key{:010}", i * 10 + 25);
        batch.range_key_set(start, end, format!("@{i}"), "rk").unwrap();
    }
    batch
}

fn bench_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("append");
    group.throughput(Throughput::Elements(1));

    group.bench_function("set_100b", |b| {
        let mut batch = Batch::new(Arc::new(MemStore::new()));
        let value = vec![b'x'; 100];
        let mut i = 0u64;
        b.iter(|| {
            batch.set(format!("key{i:010}"), value.clone()).unwrap();
            i += 1;
        });
    });

    group.bench_function("range_key_set", |b| {
        let mut batch = Batch::new(Arc::new(MemStore::new()));
        let mut i = 0u64;
        b.iter(|| {
            batch
                .range_key_set(format!("key{i:010}"), format!("key{:010}", i + 5), "@1", "v")
                .unwrap();
            i += 1;
        });
    });

    group.finish();
}

fn bench_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("scan");

    for size in [1_000u64, 10_000] {
        let batch = setup_batch(size, size / 50);
        group.throughput(Throughput::Elements(size));
        group.bench_with_input(BenchmarkId::new("forward", size), &batch, |b, batch| {
            b.iter(|| {
                let mut iter = batch.new_iter(IterOptions::default()).unwrap();
                let mut count = 0;
                let mut valid = iter.first();
                while valid {
                    black_box(iter.key());
                    count += 1;
                    valid = iter.next();
                }
                black_box(count);
            });
        });
    }

    group.finish();
}

fn bench_seek(c: &mut Criterion) {
    let batch = setup_batch(10_000, 200);
    let mut iter = batch.new_iter(IterOptions::default()).unwrap();
    let mut i = 0u64;

    c.bench_function("seek_ge", |b| {
        b.iter(|| {
            let target = Slice::from(format!("key{:010}", (i * 7919) % 10_000));
            black_box(iter.seek_ge(&target));
            i += 1;
        });
    });
}

fn bench_refresh(c: &mut Criterion) {
    let mut group = c.benchmark_group("refresh");

    // Each refresh folds only the range ops appended since the last one.
    group.bench_function("after_range_key_append", |b| {
        let mut batch = setup_batch(1_000, 20);
        let mut iter = batch.new_iter(IterOptions::default()).unwrap();
        let mut i = 0u64;
        b.iter(|| {
            batch
                .range_key_set(format!("key{:010}", i % 1_000), format!("key{:010}", i % 1_000 + 3), "@9", "v")
                .unwrap();
            iter.refresh_view().unwrap();
            black_box(iter.first());
            i += 1;
        });
    });

    group.finish();
}

criterion_group!(benches, bench_append, bench_scan, bench_seek, bench_refresh);
criterion_main!(benches);
