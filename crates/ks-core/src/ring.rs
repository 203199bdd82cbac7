//! Lock-free SPSC ring buffer over a fixed-capacity byte-record slot array.
//!
//! # Memory ordering
//!
//! Producer (`try_push`): load `tail` relaxed (only the producer writes it),
//! consult a producer-private cache of `head` to avoid a cross-core read on
//! the fast path, and only fall back to an acquire load of the real `head`
//! when the cache says the ring might be full. Write the slot, then publish
//! the new `tail` with release.
//!
//! Consumer (`try_pop`) mirrors this with `head`/`tail` swapped. The release
//! on `tail` and the acquire on `tail` (whether direct or via the cache
//! refresh) pair up, so slot bytes written before the release are visible
//! after the acquire.
//!
//! `Ring` is `#[repr(C)]` and contains no pointers, heap allocations, or
//! `Drop` impls — it is valid to place it at an arbitrary address inside a
//! `mmap`'d shared-memory segment shared by two unrelated processes.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::align::CacheAligned;
use crate::backoff::Backoff;
use crate::consts::{QUEUE_CAPACITY, QUEUE_MASK, SLOT_CAPACITY};
use crate::error::RingError;
use crate::invariants::{debug_assert_bounded_count, debug_assert_monotonic};
use crate::shm::ShmInit;

/// A single fixed-capacity record: a length prefix plus up to
/// `SLOT_CAPACITY - 1` payload bytes, NUL-terminated at `bytes[len]`.
#[repr(C)]
#[derive(Clone, Copy)]
struct Slot {
    len: u32,
    bytes: [u8; SLOT_CAPACITY],
}

impl Slot {
    const fn zeroed() -> Self {
        Self {
            len: 0,
            bytes: [0u8; SLOT_CAPACITY],
        }
    }
}

#[repr(C)]
pub struct Ring {
    // === PRODUCER HOT ===
    tail: CacheAligned<AtomicU64>,
    /// Producer-owned cache of `head`; written only by the producer.
    cached_head: CacheAligned<UnsafeCell<u64>>,

    // === CONSUMER HOT ===
    head: CacheAligned<AtomicU64>,
    /// Consumer-owned cache of `tail`; written only by the consumer.
    cached_tail: CacheAligned<UnsafeCell<u64>>,

    // === DATA ===
    slots: [UnsafeCell<Slot>; QUEUE_CAPACITY],
}

// SAFETY: all cross-process access goes through the atomic head/tail with
// explicit ordering; the two `UnsafeCell<u64>` caches and the slot array are
// each single-writer by construction (producer role vs. consumer role).
unsafe impl Sync for Ring {}

unsafe impl ShmInit for Ring {
    unsafe fn init_in_place(ptr: *mut Self) {
        std::ptr::addr_of_mut!((*ptr).tail).write(CacheAligned::new(AtomicU64::new(0)));
        std::ptr::addr_of_mut!((*ptr).cached_head).write(CacheAligned::new(UnsafeCell::new(0)));
        std::ptr::addr_of_mut!((*ptr).head).write(CacheAligned::new(AtomicU64::new(0)));
        std::ptr::addr_of_mut!((*ptr).cached_tail).write(CacheAligned::new(UnsafeCell::new(0)));

        let slots = std::ptr::addr_of_mut!((*ptr).slots).cast::<UnsafeCell<Slot>>();
        for i in 0..QUEUE_CAPACITY {
            slots.add(i).write(UnsafeCell::new(Slot::zeroed()));
        }
    }
}

impl Ring {
    /// Number of slots usable before the ring reports full (`Q - 1`; one
    /// slot is sacrificed to disambiguate full from empty).
    pub const USABLE_CAPACITY: usize = QUEUE_CAPACITY - 1;

    /// Number of records currently queued.
    pub fn len(&self) -> usize {
        let tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Relaxed);
        tail.wrapping_sub(head) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() >= Self::USABLE_CAPACITY
    }

    /// Enqueue a record without blocking. Bytes beyond `SLOT_CAPACITY - 1`
    /// are silently truncated, per §4.1's full/empty policy.
    pub fn try_push(&self, bytes: &[u8]) -> Result<(), RingError> {
        let tail = self.tail.load(Ordering::Relaxed);

        // SAFETY: cached_head is written only by the producer, which is us.
        let mut cached_head = unsafe { *self.cached_head.get() };
        if tail.wrapping_sub(cached_head) as usize >= Self::USABLE_CAPACITY {
            cached_head = self.head.load(Ordering::Acquire);
            // SAFETY: single producer writer; the acquire above synchronizes
            // with the consumer's release store on `head`.
            unsafe {
                *self.cached_head.get() = cached_head;
            }
            if tail.wrapping_sub(cached_head) as usize >= Self::USABLE_CAPACITY {
                return Err(RingError::Full);
            }
        }

        let idx = (tail as usize) & QUEUE_MASK;
        let payload_len = bytes.len().min(SLOT_CAPACITY - 1);

        // SAFETY: slot `idx` lies beyond the range the consumer may read
        // (it hasn't been published via `tail` yet), and only the producer
        // writes slots.
        unsafe {
            let slot = &mut *self.slots[idx].get();
            slot.bytes[..payload_len].copy_from_slice(&bytes[..payload_len]);
            slot.bytes[payload_len] = 0;
            slot.len = payload_len as u32;
        }

        let new_tail = tail.wrapping_add(1);
        debug_assert_monotonic!("tail", tail, new_tail);
        debug_assert_bounded_count!(
            new_tail.wrapping_sub(cached_head) as usize,
            Self::USABLE_CAPACITY
        );
        self.tail.store(new_tail, Ordering::Release);
        Ok(())
    }

    /// Dequeue a record without blocking. Returns the record's original
    /// length (may exceed `buf.len()`, in which case the copy is truncated
    /// to `buf.len()`).
    pub fn try_pop(&self, buf: &mut [u8]) -> Result<usize, RingError> {
        let head = self.head.load(Ordering::Relaxed);

        // SAFETY: cached_tail is written only by the consumer, which is us.
        let mut cached_tail = unsafe { *self.cached_tail.get() };
        if head == cached_tail {
            cached_tail = self.tail.load(Ordering::Acquire);
            // SAFETY: single consumer writer; the acquire above synchronizes
            // with the producer's release store on `tail`.
            unsafe {
                *self.cached_tail.get() = cached_tail;
            }
            if head == cached_tail {
                return Err(RingError::Empty);
            }
        }

        let idx = (head as usize) & QUEUE_MASK;
        // SAFETY: slots in [head, tail) were fully written by the producer
        // before the release store on `tail` that we just acquired (or
        // cached from an earlier acquire); only the consumer reads them.
        let len = unsafe {
            let slot = &*self.slots[idx].get();
            let len = slot.len as usize;
            let n = len.min(buf.len());
            buf[..n].copy_from_slice(&slot.bytes[..n]);
            len
        };

        let new_head = head.wrapping_add(1);
        debug_assert_monotonic!("head", head, new_head);
        self.head.store(new_head, Ordering::Release);
        Ok(len)
    }

    /// Busy-wait push with an optional deadline. `timeout_ms < 0` waits
    /// forever; this is what every production caller passes.
    pub fn push_blocking(&self, bytes: &[u8], timeout_ms: i64) -> Result<(), RingError> {
        let deadline = deadline_from_timeout(timeout_ms);
        let mut backoff = Backoff::new();
        loop {
            match self.try_push(bytes) {
                Ok(()) => return Ok(()),
                Err(RingError::Full) => {}
                Err(other) => return Err(other),
            }
            if past_deadline(deadline) {
                return Err(RingError::TimedOut);
            }
            backoff.snooze();
        }
    }

    /// Busy-wait pop with an optional deadline. `timeout_ms < 0` waits
    /// forever.
    pub fn pop_blocking(&self, buf: &mut [u8], timeout_ms: i64) -> Result<usize, RingError> {
        let deadline = deadline_from_timeout(timeout_ms);
        let mut backoff = Backoff::new();
        loop {
            match self.try_pop(buf) {
                Ok(n) => return Ok(n),
                Err(RingError::Empty) => {}
                Err(other) => return Err(other),
            }
            if past_deadline(deadline) {
                return Err(RingError::TimedOut);
            }
            backoff.snooze();
        }
    }
}

fn deadline_from_timeout(timeout_ms: i64) -> Option<Instant> {
    if timeout_ms < 0 {
        None
    } else {
        Some(Instant::now() + Duration::from_millis(timeout_ms as u64))
    }
}

fn past_deadline(deadline: Option<Instant>) -> bool {
    deadline.is_some_and(|d| Instant::now() >= d)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::alloc::{alloc_zeroed, dealloc, Layout};

    /// Heap-allocates a zeroed, correctly aligned `Ring` and runs its
    /// in-place initializer — a stand-in for the real mmap'd segment in
    /// single-process unit tests.
    struct TestRing(*mut Ring, Layout);

    impl TestRing {
        fn new() -> Self {
            let layout = Layout::new::<Ring>();
            unsafe {
                let ptr = alloc_zeroed(layout).cast::<Ring>();
                assert!(!ptr.is_null());
                Ring::init_in_place(ptr);
                Self(ptr, layout)
            }
        }

        fn get(&self) -> &Ring {
            unsafe { &*self.0 }
        }
    }

    impl Drop for TestRing {
        fn drop(&mut self) {
            unsafe { dealloc(self.0.cast::<u8>(), self.1) }
        }
    }

    #[test]
    fn push_then_pop_roundtrips() {
        let ring = TestRing::new();
        let ring = ring.get();

        ring.try_push(b"hello").unwrap();
        let mut buf = [0u8; 64];
        let n = ring.try_pop(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"hello");
        assert!(ring.is_empty());
    }

    #[test]
    fn pop_on_empty_ring_is_empty_error() {
        let ring = TestRing::new();
        let mut buf = [0u8; 8];
        assert_eq!(ring.get().try_pop(&mut buf), Err(RingError::Empty));
    }

    #[test]
    fn fifo_order_is_preserved() {
        let ring = TestRing::new();
        let ring = ring.get();
        for i in 0..10u8 {
            ring.try_push(&[i]).unwrap();
        }
        let mut buf = [0u8; 8];
        for i in 0..10u8 {
            let n = ring.try_pop(&mut buf).unwrap();
            assert_eq!(n, 1);
            assert_eq!(buf[0], i);
        }
    }

    #[test]
    fn reports_full_after_usable_capacity_pushes() {
        let ring = TestRing::new();
        let ring = ring.get();
        for _ in 0..Ring::USABLE_CAPACITY {
            ring.try_push(b"x").unwrap();
        }
        assert!(ring.is_full());
        assert_eq!(ring.try_push(b"x"), Err(RingError::Full));
    }

    #[test]
    fn payload_at_capacity_boundary_is_exact_truncated_beyond() {
        let ring = TestRing::new();
        let ring = ring.get();

        let exact = vec![b'a'; SLOT_CAPACITY - 1];
        ring.try_push(&exact).unwrap();
        let mut buf = [0u8; SLOT_CAPACITY];
        let n = ring.try_pop(&mut buf).unwrap();
        assert_eq!(n, SLOT_CAPACITY - 1);
        assert_eq!(&buf[..n], exact.as_slice());

        let oversized = vec![b'b'; SLOT_CAPACITY + 10];
        ring.try_push(&oversized).unwrap();
        let n = ring.try_pop(&mut buf).unwrap();
        assert_eq!(n, SLOT_CAPACITY - 1);
    }

    #[test]
    fn blocking_pop_times_out_on_empty_ring() {
        let ring = TestRing::new();
        let mut buf = [0u8; 8];
        let start = Instant::now();
        let result = ring.get().pop_blocking(&mut buf, 20);
        assert_eq!(result, Err(RingError::TimedOut));
        assert!(start.elapsed() >= Duration::from_millis(15));
    }

    #[test]
    fn blocking_push_succeeds_once_space_frees_up() {
        let ring = TestRing::new();
        let ring = ring.get();
        for _ in 0..Ring::USABLE_CAPACITY {
            ring.try_push(b"x").unwrap();
        }

        std::thread::scope(|scope| {
            scope.spawn(|| {
                std::thread::sleep(Duration::from_millis(10));
                let mut buf = [0u8; 8];
                ring.try_pop(&mut buf).unwrap();
            });
            ring.push_blocking(b"y", 500).unwrap();
        });
    }
}
