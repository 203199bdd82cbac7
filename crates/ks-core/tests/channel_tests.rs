//! Integration tests for the per-client `Channel` segment: the handshake
//! flags and the two embedded rings, run against real POSIX shared memory.

use std::sync::atomic::{AtomicU64, Ordering};

use ks_core::channel::Channel;
use ks_core::shm::ShmHandle;

static COUNTER: AtomicU64 = AtomicU64::new(0);

struct TestSegment {
    handle: Option<ShmHandle<Channel>>,
    name: String,
}

impl TestSegment {
    fn new() -> Self {
        let name = format!(
            "/ks_core_channel_test_{}_{}",
            std::process::id(),
            COUNTER.fetch_add(1, Ordering::Relaxed)
        );
        let handle = ShmHandle::<Channel>::attach(&name, true).expect("attach for test segment");
        Self {
            handle: Some(handle),
            name,
        }
    }

    fn channel(&self) -> &Channel {
        self.handle.as_ref().unwrap().get()
    }
}

impl Drop for TestSegment {
    fn drop(&mut self) {
        self.handle.take();
        let _ = ks_core::shm::destroy(&self.name);
    }
}

#[test]
fn handshake_flags_start_false_and_latch_true() {
    let segment = TestSegment::new();
    let channel = segment.channel();

    assert!(!channel.client_connected());
    assert!(!channel.server_ready());

    channel.mark_client_connected();
    channel.mark_server_ready();

    assert!(channel.client_connected());
    assert!(channel.server_ready());
}

#[test]
fn request_and_response_rings_are_independent() {
    let segment = TestSegment::new();
    let channel = segment.channel();

    channel.request_ring().try_push(b"conv2d|req-1|worker-a").unwrap();
    assert!(channel.response_ring().is_empty());

    let mut buf = [0u8; 64];
    let n = channel.request_ring().try_pop(&mut buf).unwrap();
    assert_eq!(&buf[..n], b"conv2d|req-1|worker-a");

    channel.response_ring().try_push(b"req-1|1|OK\n").unwrap();
    let n = channel.response_ring().try_pop(&mut buf).unwrap();
    assert_eq!(&buf[..n], b"req-1|1|OK\n");
}

#[test]
fn reattaching_an_existing_segment_preserves_its_state() {
    let segment = TestSegment::new();
    segment.channel().mark_server_ready();

    let reattached =
        ShmHandle::<Channel>::attach(&segment.name, false).expect("segment already exists");
    assert!(reattached.get().server_ready());
}
