use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use spin::Mutex;

use crate::error::{CoreError, Result, codes};
use crate::sealed::Sealed;

use super::writable::WritableBuffer;

/// Read side of a buffer: consumes bytes from `reader_index` up to `writer_index`.
///
/// # Contract
/// - `remaining()` is `writer_index - reader_index` and shrinks only via `advance`/`read_*`.
/// - Reading past `writer_index`, or any operation after `release()` has fully dropped the
///   refcount, fails with [`codes::BUFFER_INDEX_OUT_OF_BOUNDS`] / [`codes::BUFFER_RELEASED`].
/// - `retain`/`release` form the buffer's manual lifetime: the backing storage is only recycled
///   once the logical refcount — not Rust's own `Arc` strong count — reaches zero.
pub trait ReadableBuffer: Sealed + Send {
    /// Bytes available to read before hitting `writer_index`.
    fn remaining(&self) -> usize;

    /// Current reader index.
    fn reader_index(&self) -> usize;

    /// Current writer index (the read boundary).
    fn writer_index(&self) -> usize;

    /// Reads one byte, advancing the reader index.
    fn read_u8(&mut self) -> Result<u8>;

    /// Reads a big-endian `u16`, advancing the reader index by 2.
    fn read_u16(&mut self) -> Result<u16>;

    /// Reads a big-endian `u32`, advancing the reader index by 4.
    fn read_u32(&mut self) -> Result<u32>;

    /// Copies `len` bytes out starting at the reader index, advancing past them.
    fn read_slice(&mut self, len: usize) -> Result<Vec<u8>>;

    /// Advances the reader index by `n` without copying.
    fn advance(&mut self, n: usize) -> Result<()>;

    /// Splits off the first `n` unread bytes as an independent buffer and advances past them.
    ///
    /// The returned buffer is a fresh, independently-refcounted copy of those bytes rather than a
    /// zero-copy window — the shared backing storage is mutable and growable, so true zero-copy
    /// splitting would require tracking per-view byte ranges into it; this crate accepts the copy
    /// to keep the sharing model (and `retain`/`release`) simple and correct.
    fn split_to(&mut self, n: usize) -> Result<Box<dyn ReadableBuffer>>;

    /// Increments the logical refcount and returns a new view sharing the same storage and index
    /// position as `self` at the moment of the call.
    fn retain(&self) -> Box<dyn ReadableBuffer>;

    /// Decrements the logical refcount. Returns `true` if this call dropped it to zero.
    fn release(&self) -> bool;

    /// Saves the current reader index so it can be restored with [`Self::reset_reader_index`].
    fn mark_reader_index(&mut self);

    /// Restores the reader index to the last [`Self::mark_reader_index`] call, or to zero if none.
    fn reset_reader_index(&mut self);
}

pub(super) struct BufCore {
    pub(super) storage: Mutex<Vec<u8>>,
    pub(super) refcount: AtomicUsize,
    pub(super) released: AtomicBool,
}

/// The one concrete buffer type in this crate: a growable, reference-counted, dual-index region.
pub struct Buf {
    pub(super) core: Arc<BufCore>,
    pub(super) reader_index: usize,
    pub(super) writer_index: usize,
    pub(super) marked_reader_index: usize,
    pub(super) marked_writer_index: usize,
    pub(super) max_capacity: usize,
}

impl Buf {
    /// Creates a fresh, empty buffer with refcount 1.
    pub fn new(initial_capacity: usize, max_capacity: usize) -> Self {
        Self {
            core: Arc::new(BufCore {
                storage: Mutex::new(vec![0u8; initial_capacity]),
                refcount: AtomicUsize::new(1),
                released: AtomicBool::new(false),
            }),
            reader_index: 0,
            writer_index: 0,
            marked_reader_index: 0,
            marked_writer_index: 0,
            max_capacity,
        }
    }

    /// Wraps pre-allocated (but logically empty) storage — e.g. recycled from a pool free list —
    /// as a fresh buffer ready to be written into. `storage.len()` is treated as spare capacity,
    /// not as already-written bytes.
    pub fn with_storage(storage: Vec<u8>, max_capacity: usize) -> Self {
        Self {
            core: Arc::new(BufCore {
                storage: Mutex::new(storage),
                refcount: AtomicUsize::new(1),
                released: AtomicBool::new(false),
            }),
            reader_index: 0,
            writer_index: 0,
            marked_reader_index: 0,
            marked_writer_index: 0,
            max_capacity,
        }
    }

    /// Wraps an already-populated byte vector as a buffer fully readable front to back.
    pub fn from_vec(bytes: Vec<u8>, max_capacity: usize) -> Self {
        let writer_index = bytes.len();
        Self {
            core: Arc::new(BufCore {
                storage: Mutex::new(bytes),
                refcount: AtomicUsize::new(1),
                released: AtomicBool::new(false),
            }),
            reader_index: 0,
            writer_index,
            marked_reader_index: 0,
            marked_writer_index: writer_index,
            max_capacity,
        }
    }

    fn check_live(&self) -> Result<()> {
        if self.core.released.load(Ordering::Acquire) {
            Err(CoreError::new(codes::BUFFER_RELEASED, "buffer has been released"))
        } else {
            Ok(())
        }
    }
}

impl Sealed for Buf {}

impl ReadableBuffer for Buf {
    fn remaining(&self) -> usize {
        self.writer_index - self.reader_index
    }

    fn reader_index(&self) -> usize {
        self.reader_index
    }

    fn writer_index(&self) -> usize {
        self.writer_index
    }

    fn read_u8(&mut self) -> Result<u8> {
        let bytes = self.read_slice(1)?;
        Ok(bytes[0])
    }

    fn read_u16(&mut self) -> Result<u16> {
        let bytes = self.read_slice(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    fn read_u32(&mut self) -> Result<u32> {
        let bytes = self.read_slice(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn read_slice(&mut self, len: usize) -> Result<Vec<u8>> {
        self.check_live()?;
        if self.reader_index + len > self.writer_index {
            return Err(CoreError::new(
                codes::BUFFER_INDEX_OUT_OF_BOUNDS,
                "read past writer index",
            ));
        }
        let storage = self.core.storage.lock();
        let out = storage[self.reader_index..self.reader_index + len].to_vec();
        drop(storage);
        self.reader_index += len;
        Ok(out)
    }

    fn advance(&mut self, n: usize) -> Result<()> {
        self.check_live()?;
        if self.reader_index + n > self.writer_index {
            return Err(CoreError::new(
                codes::BUFFER_INDEX_OUT_OF_BOUNDS,
                "advance past writer index",
            ));
        }
        self.reader_index += n;
        Ok(())
    }

    fn split_to(&mut self, n: usize) -> Result<Box<dyn ReadableBuffer>> {
        let taken = self.read_slice(n)?;
        Ok(Box::new(Buf::from_vec(taken, n)))
    }

    fn retain(&self) -> Box<dyn ReadableBuffer> {
        self.core.refcount.fetch_add(1, Ordering::AcqRel);
        Box::new(Buf {
            core: Arc::clone(&self.core),
            reader_index: self.reader_index,
            writer_index: self.writer_index,
            marked_reader_index: self.marked_reader_index,
            marked_writer_index: self.marked_writer_index,
            max_capacity: self.max_capacity,
        })
    }

    fn release(&self) -> bool {
        let previous = self.core.refcount.fetch_sub(1, Ordering::AcqRel);
        if previous == 1 {
            self.core.released.store(true, Ordering::Release);
            true
        } else {
            false
        }
    }

    fn mark_reader_index(&mut self) {
        self.marked_reader_index = self.reader_index;
    }

    fn reset_reader_index(&mut self) {
        self.reader_index = self.marked_reader_index;
    }
}

// `WritableBuffer` is implemented for `Buf` alongside `ReadableBuffer` in `writable.rs`, so that
// a freshly-acquired buffer is both readable (empty) and writable (full remaining capacity) —
// see [`super::ByteBuffer`].
impl WritableBuffer for Buf {
    fn capacity(&self) -> usize {
        self.core.storage.lock().len()
    }

    fn max_capacity(&self) -> usize {
        self.max_capacity
    }

    fn remaining_mut(&self) -> usize {
        self.max_capacity - self.writer_index
    }

    fn reserve(&mut self, additional: usize) -> Result<()> {
        self.check_live()?;
        let needed = self.writer_index + additional;
        if needed > self.max_capacity {
            return Err(CoreError::new(
                codes::BUFFER_CAPACITY_EXCEEDED,
                "reserve would exceed max_capacity",
            ));
        }
        let mut storage = self.core.storage.lock();
        if storage.len() < needed {
            // Double until the request fits, then clamp to max_capacity, matching the growth
            // policy handlers expect from a pooled allocator (avoids reallocating on every write).
            let mut grown = core::cmp::max(storage.len(), 1);
            while grown < needed {
                grown = (grown * 2).min(self.max_capacity).max(needed);
            }
            storage.resize(grown, 0);
        }
        Ok(())
    }

    fn put_slice(&mut self, src: &[u8]) -> Result<()> {
        self.reserve(src.len())?;
        let mut storage = self.core.storage.lock();
        storage[self.writer_index..self.writer_index + src.len()].copy_from_slice(src);
        drop(storage);
        self.writer_index += src.len();
        Ok(())
    }

    fn put_u8(&mut self, value: u8) -> Result<()> {
        self.put_slice(&[value])
    }

    fn put_u16(&mut self, value: u16) -> Result<()> {
        self.put_slice(&value.to_be_bytes())
    }

    fn put_u32(&mut self, value: u32) -> Result<()> {
        self.put_slice(&value.to_be_bytes())
    }

    fn clear(&mut self) {
        self.reader_index = 0;
        self.writer_index = 0;
        self.marked_reader_index = 0;
        self.marked_writer_index = 0;
    }

    fn mark_writer_index(&mut self) {
        self.marked_writer_index = self.writer_index;
    }

    fn reset_writer_index(&mut self) {
        self.writer_index = self.marked_writer_index;
    }
}
