//! Container throughput.
//!
//! Run with: cargo bench --bench entries
//!
//! Compares the backends against their std counterparts on the same key
//! sequence, and the cost of the inverse index on top of a plain put.

use std::collections::{BTreeMap, HashMap};
use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use nexus_txcollections::{
    ArrayElements, BidiType, HashEntries, LinkedElements, LinkedHashEntries, RedBlackTreeEntries,
};
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

const COUNT: usize = 10_000;

fn shuffled_keys() -> Vec<u64> {
    let mut keys: Vec<u64> = (0..COUNT as u64).collect();
    keys.shuffle(&mut SmallRng::seed_from_u64(42));
    keys
}

// ============================================================================
// Put
// ============================================================================

fn bench_put(c: &mut Criterion) {
    let mut group = c.benchmark_group("put");
    group.throughput(Throughput::Elements(COUNT as u64));
    let keys = shuffled_keys();

    group.bench_function("hash", |b| {
        b.iter(|| {
            let mut m = HashEntries::<u64, u64>::builder().build().unwrap();
            for &k in &keys {
                black_box(m.put(k, k).unwrap());
            }
            m
        });
    });

    group.bench_function("hash/bidi", |b| {
        b.iter(|| {
            let mut m = HashEntries::<u64, u64>::builder()
                .bidi(BidiType::AllValues)
                .build()
                .unwrap();
            for &k in &keys {
                black_box(m.put(k, k).unwrap());
            }
            m
        });
    });

    group.bench_function("linked_hash", |b| {
        b.iter(|| {
            let mut m = LinkedHashEntries::<u64, u64>::builder().build().unwrap();
            for &k in &keys {
                black_box(m.put(k, k).unwrap());
            }
            m
        });
    });

    group.bench_function("tree", |b| {
        b.iter(|| {
            let mut m = RedBlackTreeEntries::<u64, u64>::builder().build().unwrap();
            for &k in &keys {
                black_box(m.put(k, k).unwrap());
            }
            m
        });
    });

    group.bench_function("std/HashMap", |b| {
        b.iter(|| {
            let mut m = HashMap::new();
            for &k in &keys {
                black_box(m.insert(k, k));
            }
            m
        });
    });

    group.bench_function("std/BTreeMap", |b| {
        b.iter(|| {
            let mut m = BTreeMap::new();
            for &k in &keys {
                black_box(m.insert(k, k));
            }
            m
        });
    });

    group.finish();
}

// ============================================================================
// Sorted build
// ============================================================================

fn bench_tree_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("tree_build");
    group.throughput(Throughput::Elements(COUNT as u64));
    let sorted: Vec<(u64, u64)> = (0..COUNT as u64).map(|k| (k, k)).collect();
    let shuffled: Vec<(u64, u64)> = shuffled_keys().into_iter().map(|k| (k, k)).collect();

    for (name, input) in [("sorted", &sorted), ("shuffled", &shuffled)] {
        group.bench_with_input(BenchmarkId::new("put_all", name), input, |b, input| {
            b.iter(|| {
                let mut m = RedBlackTreeEntries::<u64, u64>::builder().build().unwrap();
                m.put_all(input.iter().copied()).unwrap();
                m
            });
        });
    }

    group.finish();
}

// ============================================================================
// Navigation
// ============================================================================

fn bench_navigation(c: &mut Criterion) {
    let mut group = c.benchmark_group("navigation");
    let mut tree = RedBlackTreeEntries::<u64, u64>::builder().build().unwrap();
    tree.put_all((0..COUNT as u64).map(|k| (k * 2, k))).unwrap();
    let probes = shuffled_keys();

    group.bench_function("floor", |b| {
        b.iter(|| {
            for k in &probes {
                black_box(tree.floor(k));
            }
        });
    });

    group.bench_function("rank", |b| {
        b.iter(|| {
            for k in &probes {
                black_box(tree.rank(&(k & !1)));
            }
        });
    });

    group.bench_function("sub_tree_len", |b| {
        b.iter(|| {
            let view = tree.sub_map(1_000, true, 9_000, false).unwrap();
            black_box(view.len())
        });
    });

    group.finish();
}

// ============================================================================
// Positional access
// ============================================================================

fn bench_positional(c: &mut Criterion) {
    let mut group = c.benchmark_group("positional");
    const LEN: usize = 2_000;
    let mut array = ArrayElements::<u64>::builder().build().unwrap();
    array.add_all(0..LEN as u64).unwrap();
    let mut linked = LinkedElements::<u64>::builder().build().unwrap();
    linked.add_all(0..LEN as u64).unwrap();

    // Sequential scans are what the last-access cache serves.
    group.bench_function("array/sequential_get", |b| {
        b.iter(|| {
            for i in 0..LEN {
                black_box(array.get(i));
            }
        });
    });

    group.bench_function("linked/sequential_get", |b| {
        b.iter(|| {
            for i in 0..LEN {
                black_box(linked.get(i));
            }
        });
    });

    group.bench_function("linked/index_of_repeat", |b| {
        b.iter(|| {
            for _ in 0..64 {
                black_box(linked.index_of(&(LEN as u64 / 2)));
            }
        });
    });

    group.finish();
}

criterion_group!(benches, bench_put, bench_tree_build, bench_navigation, bench_positional);
criterion_main!(benches);
