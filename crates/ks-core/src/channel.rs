//! The per-client channel segment: two rings plus the handshake flags that
//! let the client and server each learn when the other side is actually
//! attached and ready (§4.2, §4.3).

use std::sync::atomic::{AtomicBool, Ordering};

use crate::align::CacheAligned;
use crate::ring::Ring;
use crate::shm::ShmInit;

/// A client's dedicated request/response channel.
///
/// Requests flow client → server through `request_ring`; responses flow
/// server → client through `response_ring`. Each ring is single-producer,
/// single-consumer from its own point of view, but the two rings together
/// make the channel itself safe for exactly one client thread and exactly
/// one server service-task thread to share — never more.
#[repr(C)]
pub struct Channel {
    request_ring: Ring,
    response_ring: Ring,
    /// Set by the client once it has mapped this segment and registered
    /// itself; the server's service task will not begin servicing a channel
    /// until it observes this flip to `true`.
    client_connected: CacheAligned<AtomicBool>,
    /// Set by the server once its service task has attached the segment and
    /// is ready to read `request_ring`; the client blocks its first send on
    /// this flag per §4.7.
    server_ready: CacheAligned<AtomicBool>,
}

unsafe impl Sync for Channel {}

unsafe impl ShmInit for Channel {
    unsafe fn init_in_place(ptr: *mut Self) {
        Ring::init_in_place(std::ptr::addr_of_mut!((*ptr).request_ring));
        Ring::init_in_place(std::ptr::addr_of_mut!((*ptr).response_ring));
        std::ptr::addr_of_mut!((*ptr).client_connected)
            .write(CacheAligned::new(AtomicBool::new(false)));
        std::ptr::addr_of_mut!((*ptr).server_ready).write(CacheAligned::new(AtomicBool::new(false)));
    }
}

impl Channel {
    pub fn request_ring(&self) -> &Ring {
        &self.request_ring
    }

    pub fn response_ring(&self) -> &Ring {
        &self.response_ring
    }

    pub fn mark_client_connected(&self) {
        self.client_connected.store(true, Ordering::Release);
    }

    /// Flipped by the worker on clean shutdown (§4.7 step 7); also part of
    /// the reactor's liveness predicate (§4.5) — a crashed worker never
    /// calls this, which is why the reaper also probes the pid directly.
    pub fn mark_client_disconnected(&self) {
        self.client_connected.store(false, Ordering::Release);
    }

    pub fn client_connected(&self) -> bool {
        self.client_connected.load(Ordering::Acquire)
    }

    pub fn mark_server_ready(&self) {
        self.server_ready.store(true, Ordering::Release);
    }

    pub fn server_ready(&self) -> bool {
        self.server_ready.load(Ordering::Acquire)
    }
}
