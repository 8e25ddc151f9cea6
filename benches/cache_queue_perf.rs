//! Benchmark: LRU queue operations

use archetype_resource::{AssetHandle, AssetPriorityQueue};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

const ASSETS: u32 = 4096;

fn filled_queue() -> AssetPriorityQueue {
    let mut queue = AssetPriorityQueue::new();
    for index in 0..ASSETS {
        queue.insert_asset(AssetHandle::new(index));
    }
    queue
}

fn cache_queue_perf_benchmark(c: &mut Criterion) {
    let mut queue = filled_queue();
    let mut next = 0;

    // One promotion per drawn asset per frame
    c.bench_function("queue_make_highest_priority", |b| {
        b.iter(|| {
            next = (next + 7919) % ASSETS;
            queue.make_asset_highest_priority(black_box(AssetHandle::new(next)));
        })
    });

    c.bench_function("queue_evict_all", |b| {
        b.iter_batched(
            filled_queue,
            |mut queue| {
                while let Some(handle) = queue.remove_lowest_priority_asset() {
                    black_box(handle);
                }
            },
            criterion::BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, cache_queue_perf_benchmark);
criterion_main!(benches);
