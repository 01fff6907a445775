use crate::error::Result;
use crate::sealed::Sealed;

/// Write side of a buffer: appends bytes at `writer_index`, growing storage up to `max_capacity`.
///
/// # Contract
/// - `reserve` grows backing storage (doubling, then clamped) so that `remaining_mut() >= additional`
///   afterward, or fails with [`crate::error::codes::BUFFER_CAPACITY_EXCEEDED`].
/// - `put_*` advance `writer_index`; they never touch `reader_index`.
pub trait WritableBuffer: Sealed + Send {
    /// Total allocated storage length (may exceed `writer_index`).
    fn capacity(&self) -> usize;

    /// The ceiling `capacity()` is allowed to grow to.
    fn max_capacity(&self) -> usize;

    /// Bytes that can still be written before `max_capacity` is reached.
    fn remaining_mut(&self) -> usize;

    /// Ensures at least `additional` more bytes can be written without exceeding `max_capacity`.
    fn reserve(&mut self, additional: usize) -> Result<()>;

    /// Appends `src`, growing storage as needed.
    fn put_slice(&mut self, src: &[u8]) -> Result<()>;

    /// Appends one byte.
    fn put_u8(&mut self, value: u8) -> Result<()>;

    /// Appends a big-endian `u16`.
    fn put_u16(&mut self, value: u16) -> Result<()>;

    /// Appends a big-endian `u32`.
    fn put_u32(&mut self, value: u32) -> Result<()>;

    /// Resets both indices to zero, retaining allocated capacity for reuse.
    fn clear(&mut self);

    /// Saves the current writer index so it can be restored with [`Self::reset_writer_index`].
    fn mark_writer_index(&mut self);

    /// Restores the writer index to the last [`Self::mark_writer_index`] call.
    fn reset_writer_index(&mut self);
}
