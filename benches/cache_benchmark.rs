//! Performance benchmarks for relcache
//!
//! This benchmark suite measures:
//! - InMemory backend operations (put, get, has, delete)
//! - SQL backend operations over in-memory SQLite (put, get, populate on miss)
//! - JSON codec across different payload sizes
//!
//! Run with: cargo bench
//! View results: open target/criterion/report/index.html

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use relcache::backend::{Cache, InMemoryBackend, SqlBackend};
use relcache::fallback::Fallback;
use relcache::serialization::{Codec, JsonCodec};
use serde::{Deserialize, Serialize};
use std::hint::black_box;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

// ============================================================================
// Benchmark Test Fixtures
// ============================================================================

/// Benchmark value with configurable data size
#[derive(Clone, Serialize, Deserialize)]
struct BenchValue {
    id: String,
    data: Vec<u8>,
}

impl BenchValue {
    fn new(size: usize) -> Self {
        BenchValue {
            id: "bench".to_string(),
            data: vec![1u8; size],
        }
    }
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Runtime::new().expect("Failed to create Tokio runtime")
}

// ============================================================================
// Group 1: InMemory Backend Benchmarks
// ============================================================================

fn inmemory_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("inmemory_backend");
    let rt = runtime();

    for size in [100, 1_000, 10_000].iter() {
        // PUT operation
        group
            .throughput(Throughput::Bytes(*size as u64))
            .bench_with_input(BenchmarkId::new("put", size), size, |b, &size| {
                let backend = InMemoryBackend::new();
                let value = BenchValue::new(size);

                b.to_async(&rt).iter(|| async {
                    backend
                        .put(black_box("test_key"), black_box(value.clone()), None)
                        .await
                        .expect("Failed to put")
                });
            });

        // GET operation (cache hit)
        group
            .throughput(Throughput::Bytes(*size as u64))
            .bench_with_input(BenchmarkId::new("get_hit", size), size, |b, &size| {
                let backend = InMemoryBackend::new();
                rt.block_on(async {
                    backend
                        .put("test_key", BenchValue::new(size), None)
                        .await
                        .expect("Failed to put");
                });

                b.to_async(&rt)
                    .iter(|| async { backend.get::<BenchValue>(black_box("test_key")).await });
            });
    }

    // GET operation (cache miss) - size doesn't matter for misses
    group.bench_function("get_miss", |b| {
        let backend = InMemoryBackend::new();

        b.to_async(&rt)
            .iter(|| async { backend.get::<BenchValue>(black_box("nonexistent_key")).await });
    });

    // HAS operation
    group.bench_function("has", |b| {
        let backend = InMemoryBackend::new();
        rt.block_on(async {
            backend
                .put("test_key", BenchValue::new(1_000), None)
                .await
                .expect("Failed to put");
        });

        b.to_async(&rt)
            .iter(|| async { backend.has(black_box("test_key")).await });
    });

    // DELETE operation
    group.bench_function("delete", |b| {
        let backend = InMemoryBackend::new();
        let value = BenchValue::new(1_000);

        b.to_async(&rt).iter(|| async {
            backend
                .put("test_key", value.clone(), None)
                .await
                .expect("Failed to put");
            backend.delete(black_box("test_key")).await
        });
    });

    group.finish();
}

// ============================================================================
// Group 2: SQL Backend Benchmarks (SQLite in memory)
// ============================================================================

fn sql_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("sql_backend");
    let rt = runtime();

    // Payloads stay well under the 8192 character value column.
    for size in [100, 1_000].iter() {
        group
            .throughput(Throughput::Bytes(*size as u64))
            .bench_with_input(BenchmarkId::new("put", size), size, |b, &size| {
                let backend = SqlBackend::from_connection_string("sqlite::memory:");
                let value = BenchValue::new(size);

                b.to_async(&rt).iter(|| async {
                    backend
                        .put(black_box("test_key"), black_box(value.clone()), None)
                        .await
                        .expect("Failed to put")
                });
            });

        group
            .throughput(Throughput::Bytes(*size as u64))
            .bench_with_input(BenchmarkId::new("get_hit", size), size, |b, &size| {
                let backend = SqlBackend::from_connection_string("sqlite::memory:");
                rt.block_on(async {
                    backend
                        .put("test_key", BenchValue::new(size), None)
                        .await
                        .expect("Failed to put");
                });

                b.to_async(&rt)
                    .iter(|| async { backend.get::<BenchValue>(black_box("test_key")).await });
            });
    }

    // Miss with fallback: lookup + insert of a fresh key each iteration
    group.bench_function("populate_on_miss", |b| {
        let backend = SqlBackend::from_connection_string("sqlite::memory:");
        let counter = Arc::new(AtomicU64::new(0));

        b.to_async(&rt).iter(|| {
            let backend = backend.clone();
            let counter = counter.clone();
            async move {
                let current = counter.fetch_add(1, Ordering::Relaxed);
                backend
                    .get_or(
                        &format!("bench_miss_{}", current),
                        Fallback::value(BenchValue::new(100)),
                    )
                    .await
            }
        });
    });

    group.finish();
}

// ============================================================================
// Group 3: Codec Benchmarks
// ============================================================================

fn codec_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("json_codec");

    for size in [100, 1_000, 10_000].iter() {
        let value = BenchValue::new(*size);

        group
            .throughput(Throughput::Bytes(*size as u64))
            .bench_with_input(BenchmarkId::new("encode", size), &value, |b, value| {
                b.iter(|| JsonCodec.encode(black_box(value)));
            });

        let payload = JsonCodec.encode(&value).expect("Failed to encode");
        group
            .throughput(Throughput::Bytes(*size as u64))
            .bench_with_input(BenchmarkId::new("decode", size), &payload, |b, payload| {
                b.iter(|| JsonCodec.decode::<BenchValue>(black_box(payload)));
            });
    }

    group.finish();
}

// ============================================================================
// Benchmark Registration
// ============================================================================

criterion_group!(benches, inmemory_benchmarks, sql_benchmarks, codec_benchmarks);
criterion_main!(benches);
