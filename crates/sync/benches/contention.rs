use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use custody_sync::{Property, SharedManager};
use parking_lot::Mutex;
use rayon::prelude::*;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn make_accounts(n: usize) -> Vec<Property<i64>> {
    (0..n).map(|_| Property::new(0)).collect()
}

/// Pairs `(i, j)` with `i != j`. With `overlap_ratio` near 1.0 every op
/// touches account 0; near 0.0 ops spread across all accounts.
fn make_pairs(ops: usize, accounts: usize, overlap_ratio: f64) -> Vec<(usize, usize)> {
    (0..ops)
        .map(|k| {
            let from = if (k as f64 / ops as f64) < overlap_ratio {
                0
            } else {
                1 + k % (accounts - 1)
            };
            let to = if from + 1 < accounts { from + 1 } else { 1 };
            (from, to)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Benchmark: uncontended single borrow
// ---------------------------------------------------------------------------

fn bench_single_borrow(c: &mut Criterion) {
    let manager = SharedManager::new();
    let p = Property::new(0_u64);

    c.bench_function("single_borrow", |b| {
        b.iter(|| {
            manager.borrow(&p, |mut acc| {
                *acc += 1;
                black_box(*acc)
            })
        });
    });
}

// ---------------------------------------------------------------------------
// Benchmark: parallel transfers at varying overlap
// ---------------------------------------------------------------------------

fn bench_parallel_transfers(c: &mut Criterion) {
    let mut group = c.benchmark_group("parallel_transfers");
    let accounts = make_accounts(64);

    for overlap in [0.0, 0.3, 1.0] {
        let pairs = make_pairs(1_000, accounts.len(), overlap);
        let manager = SharedManager::new();

        group.bench_with_input(
            BenchmarkId::new("overlap", format!("{overlap:.1}")),
            &pairs,
            |b, pairs| {
                b.iter(|| {
                    pairs.par_iter().for_each(|&(from, to)| {
                        manager.borrow((&accounts[from], &accounts[to]), |(mut a, mut b)| {
                            *a -= 1;
                            *b += 1;
                        });
                    });
                });
            },
        );
    }
    group.finish();
}

// ---------------------------------------------------------------------------
// Benchmark: manager vs one coarse mutex
// ---------------------------------------------------------------------------

fn bench_manager_vs_coarse(c: &mut Criterion) {
    let pairs = make_pairs(1_000, 64, 0.0);
    let mut group = c.benchmark_group("manager_vs_coarse");

    let accounts = make_accounts(64);
    let manager = SharedManager::new();
    group.bench_function("manager", |b| {
        b.iter(|| {
            pairs.par_iter().for_each(|&(from, to)| {
                manager.borrow((&accounts[from], &accounts[to]), |(mut a, mut b)| {
                    *a -= 1;
                    *b += 1;
                });
            });
        });
    });

    let coarse = Mutex::new(vec![0_i64; 64]);
    group.bench_function("coarse_mutex", |b| {
        b.iter(|| {
            pairs.par_iter().for_each(|&(from, to)| {
                let mut balances = coarse.lock();
                balances[from] -= 1;
                balances[to] += 1;
            });
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_single_borrow,
    bench_parallel_transfers,
    bench_manager_vs_coarse,
);
criterion_main!(benches);
