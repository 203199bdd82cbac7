//! The worker-side half of the protocol in §4.7: attach to the registry,
//! create a channel, register, and run the two-phase handshake before any
//! request may be sent.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use ks_core::channel::Channel;
use ks_core::names::{registry_segment_name, validate_channel_name};
use ks_core::registry::Registry;
use ks_core::shm::ShmHandle;
use ks_core::RingError;

use crate::error::ConnectError;

const REGISTRY_POLL_INTERVAL: Duration = Duration::from_millis(100);

static CHANNEL_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A live connection to the server: an attached registry, a created
/// channel, and the registry slot this worker owns.
///
/// Dropping a `Connector` performs the clean-shutdown sequence from §4.7
/// step 7: flip `client_connected` false, unregister the slot, and detach
/// (but never destroy — only the server unlinks a channel segment) the
/// channel mapping.
pub struct Connector {
    registry: ShmHandle<Registry>,
    channel: ShmHandle<Channel>,
    channel_name: String,
    slot: usize,
}

impl Connector {
    /// Runs the full connect sequence. `client_type` and `unique_id` are
    /// recorded in the registry entry; `attach_timeout` bounds how long to
    /// wait for the server's two readiness signals.
    pub fn connect(
        client_type: &str,
        unique_id: &str,
        attach_timeout: Duration,
    ) -> Result<Self, ConnectError> {
        let registry_name = registry_segment_name();
        let registry = ShmHandle::<Registry>::attach(&registry_name, false)?;

        wait_until(attach_timeout, || registry.get().server_ready())
            .ok_or(ConnectError::ServerNotReady)?;

        let pid = u64::from(std::process::id());
        let channel_name = format!(
            "/ks_{client_type}_{pid}_{}",
            CHANNEL_COUNTER.fetch_add(1, Ordering::Relaxed)
        );
        validate_channel_name(&channel_name)
            .expect("generated channel names never collide with a reserved legacy name");

        let channel =
            ShmHandle::<Channel>::attach(&channel_name, true).map_err(ConnectError::Channel)?;

        let slot = match registry.get().register(pid, &channel_name, client_type, unique_id) {
            Ok(slot) => slot,
            Err(err) => {
                let _ = channel.detach();
                let _ = ks_core::shm::destroy(&channel_name);
                return Err(ConnectError::RegistryFull(err));
            }
        };

        channel.get().mark_client_connected();

        if wait_until(attach_timeout, || channel.get().server_ready()).is_none() {
            registry.get().unregister(slot);
            let _ = channel.detach();
            return Err(ConnectError::ChannelNeverAdopted);
        }

        Ok(Self {
            registry,
            channel,
            channel_name,
            slot,
        })
    }

    /// The channel segment name this connector registered under.
    pub fn channel_name(&self) -> &str {
        &self.channel_name
    }

    /// Sends one already-formatted request line. `timeout_ms < 0` waits
    /// indefinitely; production callers should pass a bounded timeout since,
    /// unlike the server, a stuck worker has no reaper to notice it.
    pub fn send_request(&self, line: &str, timeout_ms: i64) -> Result<(), RingError> {
        self.channel
            .get()
            .request_ring()
            .push_blocking(line.as_bytes(), timeout_ms)
    }

    /// Receives one response line into `buf`, returning its length.
    pub fn recv_response(&self, buf: &mut [u8], timeout_ms: i64) -> Result<usize, RingError> {
        self.channel.get().response_ring().pop_blocking(buf, timeout_ms)
    }
}

impl Drop for Connector {
    fn drop(&mut self) {
        self.channel.get().mark_client_disconnected();
        self.registry.get().unregister(self.slot);
        // The channel mapping is released (munmap) when `self.channel`
        // drops right after this; per §9 the worker never unlinks a
        // channel segment it created, so no `destroy` call here.
    }
}

fn wait_until(timeout: Duration, mut predicate: impl FnMut() -> bool) -> Option<()> {
    let deadline = Instant::now() + timeout;
    loop {
        if predicate() {
            return Some(());
        }
        if Instant::now() >= deadline {
            return None;
        }
        std::thread::sleep(REGISTRY_POLL_INTERVAL);
    }
}
