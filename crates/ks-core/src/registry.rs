//! The shared-memory worker registry: a fixed table of entries a client
//! writes once at startup and the server scans to discover new channels
//! (§4.3).

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use crate::align::CacheAligned;
use crate::consts::{MAX_CLIENT_TYPE, MAX_SEGMENT_NAME, MAX_UNIQUE_ID, REGISTRY_CAPACITY};
use crate::error::RegistryError;
use crate::shm::ShmInit;

/// Fixed-width byte buffer for a registry string field. Stored as raw bytes
/// (not `str`) since the segment may be read by a process with a different
/// idea of what's in it mid-write; readers validate UTF-8 on the way out.
#[repr(C)]
#[derive(Clone, Copy)]
struct FixedStr<const N: usize> {
    len: u8,
    bytes: [u8; N],
}

impl<const N: usize> FixedStr<N> {
    const fn zeroed() -> Self {
        Self {
            len: 0,
            bytes: [0u8; N],
        }
    }

    fn set(&mut self, s: &str) -> Result<(), &'static str> {
        if s.len() > N {
            return Err("too long");
        }
        self.bytes[..s.len()].copy_from_slice(s.as_bytes());
        self.bytes[s.len()..].fill(0);
        self.len = s.len() as u8;
        Ok(())
    }

    fn get(&self) -> String {
        let n = self.len as usize;
        String::from_utf8_lossy(&self.bytes[..n.min(N)]).into_owned()
    }
}

/// One registered worker's public record.
#[repr(C)]
struct Entry {
    /// Bumped past zero to publish a write, bumped again (still even) once
    /// the write is complete; readers retry if they observe an odd value
    /// or if the value changes out from under them mid-read.
    version: CacheAligned<AtomicU32>,
    active: CacheAligned<AtomicBool>,
    pid: AtomicU64,
    /// Unix timestamp (milliseconds) of the worker's last heartbeat.
    last_heartbeat: AtomicU64,
    segment_name: UnsafeCell<FixedStr<MAX_SEGMENT_NAME>>,
    client_type: UnsafeCell<FixedStr<MAX_CLIENT_TYPE>>,
    unique_id: UnsafeCell<FixedStr<MAX_UNIQUE_ID>>,
}

unsafe impl Sync for Entry {}

/// A consistent snapshot of one registry entry, read out via the
/// version-gated protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntrySnapshot {
    pub pid: u64,
    pub last_heartbeat: u64,
    pub segment_name: String,
    pub client_type: String,
    pub unique_id: String,
}

/// The full registry segment: a fixed table of [`Entry`], a flag the
/// server sets once it has created and is actively scanning the table, and
/// a table-wide version counter the scan loop uses to skip a pass entirely
/// when nothing has changed since the last one.
#[repr(C)]
pub struct Registry {
    server_ready: CacheAligned<AtomicBool>,
    /// Bumped (release) on every `active` transition anywhere in the
    /// table. The reactor's scan loop reads this (acquire) once per pass
    /// and only walks `entries` when it differs from the value it saw last
    /// time.
    version: CacheAligned<AtomicU32>,
    entries: [Entry; REGISTRY_CAPACITY],
}

unsafe impl Sync for Registry {}

unsafe impl ShmInit for Registry {
    unsafe fn init_in_place(ptr: *mut Self) {
        std::ptr::addr_of_mut!((*ptr).server_ready).write(CacheAligned::new(AtomicBool::new(false)));
        std::ptr::addr_of_mut!((*ptr).version).write(CacheAligned::new(AtomicU32::new(0)));

        let entries = std::ptr::addr_of_mut!((*ptr).entries).cast::<Entry>();
        for i in 0..REGISTRY_CAPACITY {
            entries.add(i).write(Entry {
                version: CacheAligned::new(AtomicU32::new(0)),
                active: CacheAligned::new(AtomicBool::new(false)),
                pid: AtomicU64::new(0),
                last_heartbeat: AtomicU64::new(0),
                segment_name: UnsafeCell::new(FixedStr::zeroed()),
                client_type: UnsafeCell::new(FixedStr::zeroed()),
                unique_id: UnsafeCell::new(FixedStr::zeroed()),
            });
        }
    }
}

impl Registry {
    pub fn mark_server_ready(&self) {
        self.server_ready.store(true, Ordering::Release);
    }

    pub fn server_ready(&self) -> bool {
        self.server_ready.load(Ordering::Acquire)
    }

    /// Claims the first inactive slot and publishes the caller's record
    /// into it. Returns the slot index, which the caller should remember
    /// in order to call [`Registry::unregister`] or
    /// [`Registry::update_heartbeat`] later.
    pub fn register(
        &self,
        pid: u64,
        segment_name: &str,
        client_type: &str,
        unique_id: &str,
    ) -> Result<usize, RegistryError> {
        if segment_name.len() > MAX_SEGMENT_NAME {
            return Err(RegistryError::FieldTooLong {
                field: "segment_name",
                max: MAX_SEGMENT_NAME,
            });
        }
        if client_type.len() > MAX_CLIENT_TYPE {
            return Err(RegistryError::FieldTooLong {
                field: "client_type",
                max: MAX_CLIENT_TYPE,
            });
        }
        if unique_id.len() > MAX_UNIQUE_ID {
            return Err(RegistryError::FieldTooLong {
                field: "unique_id",
                max: MAX_UNIQUE_ID,
            });
        }

        for entry in &self.entries {
            if entry
                .active
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                let version = entry.version.fetch_add(1, Ordering::AcqRel) + 1;
                debug_assert!(version % 2 == 1, "version should be odd mid-write");

                // SAFETY: we hold exclusive write access to this slot's
                // fields from the moment `active` flips true (the CAS
                // above) until we bump `version` to even below; no other
                // writer can observe an odd version and proceed.
                unsafe {
                    (*entry.segment_name.get())
                        .set(segment_name)
                        .expect("length already checked");
                    (*entry.client_type.get())
                        .set(client_type)
                        .expect("length already checked");
                    (*entry.unique_id.get())
                        .set(unique_id)
                        .expect("length already checked");
                }
                entry.pid.store(pid, Ordering::Relaxed);
                entry.last_heartbeat.store(now_millis(), Ordering::Relaxed);
                entry.version.fetch_add(1, Ordering::Release);
                self.version.fetch_add(1, Ordering::Release);

                let idx = index_of(&self.entries, entry);
                return Ok(idx);
            }
        }
        Err(RegistryError::Full)
    }

    /// Clears the slot so a future `register` call may reuse it. Called by
    /// the client on clean shutdown, and by the server's reaper once it has
    /// confirmed the owning process is dead.
    pub fn unregister(&self, idx: usize) {
        self.entries[idx].active.store(false, Ordering::Release);
        self.version.fetch_add(1, Ordering::Release);
    }

    /// The table-wide mutation counter. The reactor's scan loop reads this
    /// once per pass; an unchanged value means no slot transitioned and the
    /// pass can skip straight to the reaper.
    pub fn version(&self) -> u32 {
        self.version.load(Ordering::Acquire)
    }

    /// Bumps the slot's heartbeat timestamp to now. Not part of the
    /// reactor's liveness predicate (§4.5 uses only `active`,
    /// `client_connected`, and a process-alive probe) — this is a
    /// descriptor field for post-mortem/diagnostic inspection via
    /// `snapshot`, available for a caller that wants to track per-client
    /// staleness independently of the reaper.
    pub fn update_heartbeat(&self, idx: usize) {
        self.entries[idx]
            .last_heartbeat
            .store(now_millis(), Ordering::Relaxed);
    }

    /// Takes a torn-read-safe snapshot of every active entry, skipping any
    /// slot whose version is odd (write in progress) at read time rather
    /// than spinning on it — the scan loop runs again shortly regardless.
    pub fn snapshot(&self) -> Vec<(usize, EntrySnapshot)> {
        let mut out = Vec::new();
        for (idx, entry) in self.entries.iter().enumerate() {
            if !entry.active.load(Ordering::Acquire) {
                continue;
            }
            let v0 = entry.version.load(Ordering::Acquire);
            if v0 % 2 != 0 {
                continue;
            }
            // SAFETY: between the two version loads we only read, and a
            // concurrent writer bumps `version` to odd before touching any
            // field below, so a mismatch here means we must discard.
            let snapshot = unsafe {
                EntrySnapshot {
                    pid: entry.pid.load(Ordering::Relaxed),
                    last_heartbeat: entry.last_heartbeat.load(Ordering::Relaxed),
                    segment_name: (*entry.segment_name.get()).get(),
                    client_type: (*entry.client_type.get()).get(),
                    unique_id: (*entry.unique_id.get()).get(),
                }
            };
            let v1 = entry.version.load(Ordering::Acquire);
            if v0 != v1 {
                continue;
            }
            out.push((idx, snapshot));
        }
        out
    }
}

fn index_of(entries: &[Entry], entry: &Entry) -> usize {
    let base = entries.as_ptr() as usize;
    let this = entry as *const Entry as usize;
    (this - base) / std::mem::size_of::<Entry>()
}

fn now_millis() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the Unix epoch")
        .as_millis() as u64
}
