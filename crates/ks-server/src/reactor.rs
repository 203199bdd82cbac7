//! The server reactor (§4.5): owns the registry segment, scans it for new
//! clients, adopts them onto a dedicated service task, and reaps clients
//! whose liveness predicate fails.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use ks_core::channel::Channel;
use ks_core::names::registry_segment_name;
use ks_core::registry::{EntrySnapshot, Registry};
use ks_core::shm::ShmHandle;
use ks_core::ShmError;

const SCAN_PERIOD: Duration = Duration::from_millis(100);

/// Everything the reactor and a client's service task need to know about
/// one adopted channel. Shared via `Arc` between the reactor's active-table
/// entry and the spawned service task; neither side owns it exclusively.
pub(crate) struct ClientRecord {
    pub slot: usize,
    pub channel_name: String,
    pub pid: u64,
    pub channel: Arc<ShmHandle<Channel>>,
    /// Cleared by the reactor's reaper, or by the service task itself on a
    /// clean per-channel disconnect; polled by the service task's loop.
    pub running: AtomicBool,
    pub last_activity_millis: AtomicU64,
}

pub struct Reactor {
    registry: Arc<ShmHandle<Registry>>,
    registry_name: String,
    active: Mutex<HashMap<usize, Arc<ClientRecord>>>,
    shutdown: Arc<AtomicBool>,
}

impl Reactor {
    /// Creates and attaches the registry segment, runs its initializer, and
    /// marks it ready. The only startup failure mode the server surfaces as
    /// fatal (§6 "process surface").
    pub fn bootstrap(shutdown: Arc<AtomicBool>) -> Result<Self, ShmError> {
        let registry_name = registry_segment_name();
        let registry = ShmHandle::<Registry>::attach(&registry_name, true)?;
        registry.get().mark_server_ready();
        tracing::info!(segment = %registry_name, "registry ready");

        Ok(Self {
            registry: Arc::new(registry),
            registry_name,
            active: Mutex::new(HashMap::new()),
            shutdown,
        })
    }

    /// Runs the scan loop on the calling thread until the shutdown flag is
    /// set, then drains every adopted client and destroys both the
    /// registry segment and any still-bound channel segments.
    pub fn run(&self) {
        let mut last_version = self.registry.get().version().wrapping_sub(1);
        while !self.shutdown.load(Ordering::Acquire) {
            let version = self.registry.get().version();
            if version != last_version {
                last_version = version;
                for (slot, snapshot) in self.registry.get().snapshot() {
                    self.adopt(slot, &snapshot);
                }
            }
            self.reap();
            thread::sleep(SCAN_PERIOD);
        }
        self.drain();
    }

    fn adopt(&self, slot: usize, snapshot: &EntrySnapshot) {
        let channel_name = snapshot.segment_name.as_str();
        let mut active = self.active.lock().expect("active-client table poisoned");
        if active.contains_key(&slot) {
            return;
        }
        if active.values().any(|r| r.channel_name == channel_name) {
            tracing::warn!(channel = channel_name, "duplicate channel name, ignoring");
            return;
        }

        let channel = match ShmHandle::<Channel>::attach(channel_name, false) {
            Ok(channel) => channel,
            Err(ShmError::NotFound { .. }) => return,
            Err(err) => {
                tracing::warn!(error = %err, channel = channel_name, "failed to attach channel");
                return;
            }
        };

        let record = Arc::new(ClientRecord {
            slot,
            channel_name: channel_name.to_string(),
            pid: snapshot.pid,
            channel: Arc::new(channel),
            running: AtomicBool::new(true),
            last_activity_millis: AtomicU64::new(now_millis()),
        });
        active.insert(slot, Arc::clone(&record));
        drop(active);

        let shutdown = Arc::clone(&self.shutdown);
        let task_record = Arc::clone(&record);
        thread::spawn(move || crate::service::run(task_record, shutdown));

        tracing::info!(slot, channel = channel_name, "adopted client");
    }

    fn reap(&self) {
        let live_slots: HashSet<usize> = self
            .registry
            .get()
            .snapshot()
            .into_iter()
            .map(|(slot, _)| slot)
            .collect();

        let mut active = self.active.lock().expect("active-client table poisoned");
        let mut dead = Vec::new();
        for (&slot, record) in active.iter() {
            let registry_alive = live_slots.contains(&slot);
            let channel_alive = record.channel.get().client_connected();
            let process_alive = ks_core::process::is_alive(record.pid);
            if !(registry_alive && channel_alive && process_alive) {
                record.running.store(false, Ordering::Release);
                dead.push(slot);
            }
        }
        for slot in dead {
            if let Some(record) = active.remove(&slot) {
                self.registry.get().unregister(slot);
                if let Err(err) = ks_core::shm::destroy(&record.channel_name) {
                    tracing::warn!(error = %err, channel = %record.channel_name, "failed to destroy channel segment");
                }
                tracing::info!(slot, channel = %record.channel_name, "reaped client");
            }
        }
    }

    fn drain(&self) {
        tracing::info!("shutdown: draining adopted clients");
        let mut active = self.active.lock().expect("active-client table poisoned");
        for (_, record) in active.drain() {
            record.running.store(false, Ordering::Release);
            if let Err(err) = ks_core::shm::destroy(&record.channel_name) {
                tracing::warn!(error = %err, channel = %record.channel_name, "failed to destroy channel segment");
            }
        }
        drop(active);

        if let Err(err) = ks_core::shm::destroy(&self.registry_name) {
            tracing::error!(error = %err, "failed to destroy registry segment");
        }
        tracing::info!("shutdown complete");
    }
}

fn now_millis() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the Unix epoch")
        .as_millis() as u64
}
