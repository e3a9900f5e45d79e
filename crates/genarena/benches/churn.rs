//! Criterion benchmarks for insert/release/lookup churn.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use genarena::{Arena, TypedRef};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

const N: u32 = 1024;

fn bench_insert(c: &mut Criterion) {
    c.bench_function("insert_1024", |b| {
        b.iter(|| {
            let mut arena = Arena::<u64>::new();
            for i in 0..u64::from(N) {
                black_box(arena.insert(i));
            }
            arena
        })
    });
}

fn bench_lookup(c: &mut Criterion) {
    let mut arena = Arena::<u64>::new();
    let mut refs: Vec<TypedRef<u64>> = (0..u64::from(N)).map(|i| arena.insert(i)).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(1);
    refs.shuffle(&mut rng);

    c.bench_function("get_1024_shuffled", |b| {
        b.iter(|| {
            let mut sum = 0u64;
            for r in &refs {
                sum = sum.wrapping_add(*black_box(&arena[*r]));
            }
            sum
        })
    });
}

fn bench_churn(c: &mut Criterion) {
    c.bench_function("churn_release_half_reinsert", |b| {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        b.iter(|| {
            let mut arena = Arena::<u64>::new();
            let mut refs: Vec<TypedRef<u64>> =
                (0..u64::from(N)).map(|i| arena.insert(i)).collect();
            refs.shuffle(&mut rng);
            for r in refs.drain(refs.len() / 2..) {
                arena.release(r).unwrap();
            }
            for i in 0..u64::from(N) / 2 {
                refs.push(arena.insert(i));
            }
            arena
        })
    });
}

criterion_group!(benches, bench_insert, bench_lookup, bench_churn);
criterion_main!(benches);
