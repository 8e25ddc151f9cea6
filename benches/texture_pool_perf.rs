//! Benchmark: texture pool recycling

use archetype_resource::{GpuTextureFormat, MockGpu, TextureDescriptor, TexturePool};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn texture_pool_perf_benchmark(c: &mut Criterion) {
    let gpu = MockGpu::new();
    let mut pool = TexturePool::new();
    let desc = TextureDescriptor {
        width: 256,
        height: 256,
        format: GpuTextureFormat::Rgba8Unorm,
        ..Default::default()
    };

    // Warm the pool so every allocation is a hit
    let warm = pool.allocate_texture(&gpu, &desc).unwrap();
    pool.release_texture(warm);

    c.bench_function("pool_allocate_release_hit", |b| {
        b.iter(|| {
            let texture = pool.allocate_texture(&gpu, black_box(&desc)).unwrap();
            pool.release_texture(texture);
        })
    });

    c.bench_function("pool_free_count", |b| {
        b.iter(|| black_box(pool.free_count_for(&desc)))
    });
}

criterion_group!(benches, texture_pool_perf_benchmark);
criterion_main!(benches);
