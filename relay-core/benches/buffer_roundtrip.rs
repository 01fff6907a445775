//! Benchmarks the pooled write -> flush -> read round trip a codec sees on every frame.
use std::{env, time::Duration};

use criterion::{black_box, Criterion};
use relay_core::buffer::{BufferAllocator, BufferPool, FixedClassPool};
use relay_core::{ReadableBuffer, WritableBuffer};

fn bench_pooled_roundtrip(c: &mut Criterion) {
    let pool = FixedClassPool::new();
    c.bench_function("buffer_roundtrip_pooled", |b| {
        b.iter(|| {
            let mut buf = pool.acquire(1024, usize::MAX);
            buf.put_slice(&[0u8; 512]).unwrap();
            buf.put_slice(&[1u8; 512]).unwrap();
            let remaining = buf.remaining();
            let out = buf.read_slice(remaining).unwrap();
            buf.release();
            black_box(out)
        });
    });
}

fn bench_class_lookup(c: &mut Criterion) {
    let pool = FixedClassPool::new();
    c.bench_function("buffer_acquire_fresh", |b| {
        b.iter(|| black_box(pool.acquire_buf(1024, usize::MAX)));
    });
}

fn main() {
    let mut quick_mode = false;
    for arg in env::args().skip(1) {
        if arg == "--quick" {
            quick_mode = true;
        }
    }

    let mut criterion = Criterion::default();
    if quick_mode {
        criterion = criterion
            .sample_size(10)
            .warm_up_time(Duration::from_millis(100))
            .measurement_time(Duration::from_millis(250));
    }

    bench_pooled_roundtrip(&mut criterion);
    bench_class_lookup(&mut criterion);
    criterion.final_summary();
}
