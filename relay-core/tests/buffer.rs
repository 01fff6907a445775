use relay_core::buffer::{BufferAllocator, FixedClassPool};
use relay_core::error::codes;
use relay_core::{ReadableBuffer, WritableBuffer};

#[test]
fn write_then_read_round_trips_bytes() {
    let pool = FixedClassPool::new();
    let mut buf = pool.acquire(64, usize::MAX);
    buf.put_slice(b"hello").unwrap();
    assert_eq!(buf.remaining(), 5);
    let bytes = buf.read_slice(5).unwrap();
    assert_eq!(bytes, b"hello");
    assert_eq!(buf.remaining(), 0);
}

#[test]
fn read_u32_is_big_endian() {
    let pool = FixedClassPool::new();
    let mut buf = pool.acquire(8, usize::MAX);
    buf.put_u32(0x01020304).unwrap();
    assert_eq!(buf.read_u32().unwrap(), 0x01020304);
}

#[test]
fn reading_past_writer_index_fails() {
    let pool = FixedClassPool::new();
    let mut buf = pool.acquire(4, usize::MAX);
    buf.put_slice(&[1, 2]).unwrap();
    let err = buf.read_slice(3).unwrap_err();
    assert_eq!(err.code(), codes::BUFFER_INDEX_OUT_OF_BOUNDS);
}

#[test]
fn retain_keeps_a_buffer_alive_past_one_release() {
    let pool = FixedClassPool::new();
    let mut buf = pool.acquire(4, usize::MAX);
    buf.put_slice(&[9, 9]).unwrap();
    let second = buf.retain();
    assert!(!buf.release(), "a retained buffer must not report itself fully released");
    assert!(second.release(), "the last reference drops the refcount to zero");
}

#[test]
fn split_to_copies_the_prefix_and_advances_past_it() {
    let pool = FixedClassPool::new();
    let mut buf = pool.acquire(8, usize::MAX);
    buf.put_slice(&[1, 2, 3, 4]).unwrap();
    let mut prefix = buf.split_to(2).unwrap();
    assert_eq!(prefix.read_slice(2).unwrap(), vec![1, 2]);
    assert_eq!(buf.read_slice(2).unwrap(), vec![3, 4]);
}

#[test]
fn capacity_exceeded_is_reported_rather_than_silently_truncated() {
    let pool = FixedClassPool::new();
    let mut buf = pool.acquire(4, 4);
    buf.put_slice(&[0, 0, 0, 0]).unwrap();
    let err = buf.put_slice(&[1]).unwrap_err();
    assert_eq!(err.code(), codes::BUFFER_CAPACITY_EXCEEDED);
}
