use core::hint::black_box;
use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use keygen::{Key, KeyPool, MemoryBackend};
use tokio::runtime::Builder;

const TOTAL_KEYS: usize = 1024;

fn bench_generate(c: &mut Criterion) {
    let mut group = c.benchmark_group("key");
    group.throughput(Throughput::Elements(1));

    group.bench_function("generate", |b| {
        b.iter(|| black_box(Key::generate().unwrap()));
    });

    group.bench_function("parse/valid", |b| {
        b.iter(|| black_box(Key::parse(black_box(b"abc123"))));
    });

    group.bench_function("parse/invalid", |b| {
        b.iter(|| black_box(Key::parse(black_box(b"abcd12@4"))));
    });

    group.finish();
}

/// Allocates and releases every key of a pre-filled in-memory pool.
fn bench_pool_cycle(c: &mut Criterion) {
    let rt = Builder::new_multi_thread().enable_all().build().unwrap();

    let mut group = c.benchmark_group("pool/memory");
    group.throughput(Throughput::Elements(TOTAL_KEYS as u64));

    let pool = KeyPool::new(MemoryBackend::new());
    rt.block_on(async {
        for _ in 0..TOTAL_KEYS {
            // collisions are vanishingly rare and harmless here
            let _ = pool.create(&Key::generate().unwrap()).await;
        }
    });

    group.bench_function(format!("elems/{TOTAL_KEYS}"), |b| {
        b.to_async(&rt).iter(|| async {
            let mut keys = Vec::with_capacity(TOTAL_KEYS);
            while let Ok(key) = pool.allocate_first().await {
                keys.push(key);
            }
            for key in &keys {
                pool.deallocate(key).await.unwrap();
            }
            black_box(keys.len())
        });
    });

    group.finish();
}

criterion_group!(benches, bench_generate, bench_pool_cycle);
criterion_main!(benches);
