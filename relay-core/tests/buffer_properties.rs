use proptest::prelude::*;

use relay_core::buffer::{BufferAllocator, FixedClassPool};
use relay_core::{ReadableBuffer, WritableBuffer};

/// Writes then reads back arbitrary chunks, checking the reader/writer index invariants a codec
/// relies on after every operation: `reader_index <= writer_index`, and `remaining()` always
/// equals the count of bytes not yet read back.
fn write_then_read_chunks(chunks: Vec<Vec<u8>>) -> Result<(), TestCaseError> {
    let pool = FixedClassPool::new();
    let total: usize = chunks.iter().map(Vec::len).sum();
    let mut buf = pool.acquire(total.max(1), usize::MAX);

    let mut expected = Vec::new();
    for chunk in &chunks {
        buf.put_slice(chunk).unwrap();
        expected.extend_from_slice(chunk);
        prop_assert!(buf.reader_index() <= buf.writer_index());
    }
    prop_assert_eq!(buf.remaining(), expected.len());

    let mut actual = Vec::new();
    while buf.remaining() > 0 {
        let take = (buf.remaining()).min(7);
        let slice = buf.read_slice(take).unwrap();
        actual.extend_from_slice(&slice);
        prop_assert!(buf.reader_index() <= buf.writer_index());
    }
    prop_assert_eq!(actual, expected);
    buf.release();
    Ok(())
}

proptest! {
    #[test]
    fn write_then_read_back_reproduces_input_bytes(
        chunks in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..32), 0..16)
    ) {
        write_then_read_chunks(chunks)?;
    }

    #[test]
    fn split_to_never_leaves_reader_index_ahead_of_writer_index(
        bytes in prop::collection::vec(any::<u8>(), 1..64),
        split_at in 0usize..64,
    ) {
        let pool = FixedClassPool::new();
        let mut buf = pool.acquire(bytes.len(), usize::MAX);
        buf.put_slice(&bytes).unwrap();
        let split_at = split_at.min(buf.remaining());

        let mut prefix = buf.split_to(split_at).unwrap();
        prop_assert_eq!(prefix.remaining(), split_at);
        prop_assert_eq!(buf.remaining(), bytes.len() - split_at);
        prop_assert!(buf.reader_index() <= buf.writer_index());
        prop_assert!(prefix.reader_index() <= prefix.writer_index());

        prefix.release();
        buf.release();
    }
}
