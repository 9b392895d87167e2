//! Benchmark: write-then-read propagation
//!
//! Measures a source write followed by a read at the bottom of the graph,
//! for a linear chain (every node recomputes) and a wide fan-out where an
//! unchanged intermediate lets the version skip cut evaluation short.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ripple_core::reactive::{Computed, Signal};

fn chain(source: &Signal<u64>, depth: usize) -> Computed<u64> {
    let mut last = {
        let source = source.clone();
        Computed::new(move || source.get() + 1)
    };
    for _ in 1..depth {
        let previous = last.clone();
        last = Computed::new(move || previous.get() + 1);
    }
    last
}

fn bench_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("chain");

    for depth in [10, 100, 1000] {
        let source = Signal::new(0u64);
        let tail = chain(&source, depth);
        tail.get();

        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, _| {
            let mut n = 0u64;
            b.iter(|| {
                n += 1;
                source.set(n);
                black_box(tail.get())
            });
        });
    }

    group.finish();
}

fn bench_fan_out_skip(c: &mut Criterion) {
    let mut group = c.benchmark_group("fan_out_skip");

    for width in [10, 100, 1000] {
        let source = Signal::new(0u64);
        let parity = {
            let source = source.clone();
            Computed::new(move || source.get() % 2)
        };
        let leaves: Vec<Computed<u64>> = (0..width as u64)
            .map(|i| {
                let parity = parity.clone();
                Computed::new(move || parity.get() + i)
            })
            .collect();
        leaves.iter().for_each(|leaf| {
            leaf.get();
        });

        // Steps of two keep the parity, so no leaf recomputes.
        group.bench_with_input(BenchmarkId::from_parameter(width), &width, |b, _| {
            let mut n = 0u64;
            b.iter(|| {
                n += 2;
                source.set(n);
                for leaf in &leaves {
                    black_box(leaf.get());
                }
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_chain, bench_fan_out_skip);
criterion_main!(benches);
