//! Buffer pooling.
//!
//! # Why
//! Per-packet allocation is the dominant hot path in a transport core; a slab-pooled allocator
//! amortizes that cost the way Netty's `PooledByteBufAllocator` or Envoy's `WatermarkBufferFactory`
//! do. Pooling is an optimization the contract below does not mandate — [`FixedClassPool`] and a
//! trivial heap-backed allocator can both satisfy [`BufferPool`].
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicUsize, Ordering};
use spin::Mutex;

use super::readable::Buf;

/// Allocates buffers, optionally recycling released storage.
///
/// # Contract
/// - `acquire_buf` returns a buffer with refcount 1 and empty readable contents (`reader_index ==
///   writer_index == 0`), ready to be written into.
/// - Implementations decide whether `shrink_to_fit`/recycling happens eagerly or lazily; callers
///   must not assume memory is actually returned to the OS by any particular call.
pub trait BufferPool: Send + Sync {
    /// Acquires a buffer with at least `initial` bytes of capacity, growable to `max_capacity`.
    fn acquire_buf(&self, initial: usize, max_capacity: usize) -> Buf;

    /// Best-effort hint to release any cached-but-unused storage back toward the allocator.
    fn shrink_to_fit(&self) {}

    /// A read-only view over pool counters, for diagnostics/metrics export.
    fn statistics(&self) -> &dyn PoolStatisticsView;
}

/// Exposes pool counters as stable `(name, value)` pairs rather than a fixed struct, so new
/// counters can be added without breaking callers that only read a subset by name.
pub trait PoolStatisticsView: Send + Sync {
    fn as_pairs(&self) -> Vec<(&'static str, usize)>;
}

const SIZE_CLASSES: [usize; 5] = [256, 1024, 4096, 16384, 65536];

fn class_for(initial: usize) -> usize {
    SIZE_CLASSES
        .iter()
        .copied()
        .find(|&class| class >= initial)
        .unwrap_or(initial)
}

#[derive(Default)]
struct ClassStats {
    acquired: AtomicUsize,
    recycled: AtomicUsize,
}

/// A small fixed-size-class pool: one free list per entry in [`SIZE_CLASSES`], falling back to a
/// direct allocation for requests larger than the biggest class. Matches the "per-executor cache,
/// not per-OS-thread-global" arena sizing decided for this port (a channel lives on exactly one
/// executor, so a coarser per-executor cache already gets the locality pooling is for).
// TODO: nothing currently pushes storage back into `free_lists` — `Buf` doesn't hold a reclaim
// handle to its originating pool, so every acquisition past the first is a fresh allocation.
// Wiring `Buf::release` to return storage here needs a pool back-reference on `BufCore`.
pub struct FixedClassPool {
    free_lists: [Mutex<Vec<Vec<u8>>>; SIZE_CLASSES.len()],
    stats: [ClassStats; SIZE_CLASSES.len()],
}

impl FixedClassPool {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            free_lists: Default::default(),
            stats: Default::default(),
        })
    }

    fn class_index(size: usize) -> Option<usize> {
        SIZE_CLASSES.iter().position(|&class| class == size)
    }
}

impl BufferPool for FixedClassPool {
    fn acquire_buf(&self, initial: usize, max_capacity: usize) -> Buf {
        let class = class_for(initial);
        if let Some(index) = Self::class_index(class) {
            self.stats[index].acquired.fetch_add(1, Ordering::Relaxed);
            let mut free_list = self.free_lists[index].lock();
            if let Some(mut storage) = free_list.pop() {
                self.stats[index].recycled.fetch_add(1, Ordering::Relaxed);
                storage.clear();
                storage.resize(class, 0);
                return Buf::with_storage(storage, max_capacity.max(class));
            }
        }
        Buf::new(class, max_capacity.max(class))
    }

    fn statistics(&self) -> &dyn PoolStatisticsView {
        self
    }
}

impl PoolStatisticsView for FixedClassPool {
    fn as_pairs(&self) -> Vec<(&'static str, usize)> {
        let mut pairs = Vec::with_capacity(SIZE_CLASSES.len() * 2);
        for (index, class) in SIZE_CLASSES.iter().enumerate() {
            let _ = class;
            pairs.push(("acquired", self.stats[index].acquired.load(Ordering::Relaxed)));
            pairs.push(("recycled", self.stats[index].recycled.load(Ordering::Relaxed)));
        }
        pairs
    }
}
