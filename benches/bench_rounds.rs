//! Round benchmarks: bounded selection, merge, and full rounds.
//!
//! Run with:
//! ```
//! cargo bench --bench bench_rounds
//! ```

#[path = "../src/test_support.rs"]
mod test_support;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;
use std::time::Duration;
use test_support::{generate_table, ScoreProfile};
use topn_extract::{run_round, BoundedRankedSet, ItemId, PartitionedInput, RoundContext};

// =============================================================================
// RANKED SET
// =============================================================================

fn bench_ranked_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("ranked/insert");
    group.warm_up_time(Duration::from_secs(1));
    group.measurement_time(Duration::from_secs(3));

    let table = generate_table(100_000, 1, ScoreProfile::Continuous, 42);
    group.throughput(Throughput::Elements(table.items.len() as u64));
    for capacity in [10usize, 100, 1_000] {
        group.bench_with_input(
            BenchmarkId::from_parameter(capacity),
            &capacity,
            |b, &capacity| {
                b.iter(|| {
                    let mut set = BoundedRankedSet::new(capacity);
                    for item in &table.items {
                        set.insert(item.id, item.scores[0]);
                    }
                    black_box(set.extract_all_sorted_descending())
                })
            },
        );
    }
    group.finish();
}

// =============================================================================
// FULL ROUND
// =============================================================================

fn bench_round(c: &mut Criterion) {
    let mut group = c.benchmark_group("round");
    group.sample_size(20);
    group.warm_up_time(Duration::from_secs(1));
    group.measurement_time(Duration::from_secs(5));

    let table = generate_table(500_000, 4, ScoreProfile::Continuous, 7);
    let count = table.items.len() as u64;
    group.throughput(Throughput::Elements(count));
    for partitions in [1usize, 8, 32] {
        let input = PartitionedInput::split(table.items.clone(), partitions);
        group.bench_with_input(
            BenchmarkId::new("partitions", partitions),
            &input,
            |b, input| {
                b.iter(|| {
                    let report = run_round(RoundContext::new(1, 2, 100), input, 10_000)
                        .expect("round");
                    black_box(report.results.first().map(|r| r.id).unwrap_or(ItemId(0)))
                })
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_ranked_insert, bench_round);
criterion_main!(benches);
