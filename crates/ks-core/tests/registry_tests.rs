//! Integration tests for the shared registry, run against a real POSIX
//! shared-memory segment.

use std::sync::atomic::{AtomicU64, Ordering};

use ks_core::registry::Registry;
use ks_core::shm::ShmHandle;
use ks_core::{RegistryError, MAX_SEGMENT_NAME, REGISTRY_CAPACITY};

static COUNTER: AtomicU64 = AtomicU64::new(0);

struct TestSegment {
    handle: Option<ShmHandle<Registry>>,
    name: String,
}

impl TestSegment {
    fn new() -> Self {
        let name = format!(
            "/ks_core_registry_test_{}_{}",
            std::process::id(),
            COUNTER.fetch_add(1, Ordering::Relaxed)
        );
        let handle = ShmHandle::<Registry>::attach(&name, true).expect("attach for test segment");
        Self {
            handle: Some(handle),
            name,
        }
    }

    fn registry(&self) -> &Registry {
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
fn table_version_bumps_on_every_active_transition() {
    let segment = TestSegment::new();
    let registry = segment.registry();

    let v0 = registry.version();
    let idx = registry
        .register(1, "/kernel_scheduler_chan", "t", "u")
        .unwrap();
    let v1 = registry.version();
    assert_ne!(v0, v1, "register must bump the table-wide version");

    registry.unregister(idx);
    let v2 = registry.version();
    assert_ne!(v1, v2, "unregister must bump the table-wide version");
}

#[test]
fn register_then_snapshot_round_trips_fields() {
    let segment = TestSegment::new();
    let registry = segment.registry();

    let idx = registry
        .register(4242, "/kernel_scheduler_chan_a", "pytorch", "worker-1")
        .expect("room for one entry");

    let snapshot = registry.snapshot();
    let (found_idx, entry) = snapshot
        .into_iter()
        .find(|(i, _)| *i == idx)
        .expect("just-registered entry appears in the snapshot");
    assert_eq!(found_idx, idx);
    assert_eq!(entry.pid, 4242);
    assert_eq!(entry.segment_name, "/kernel_scheduler_chan_a");
    assert_eq!(entry.client_type, "pytorch");
    assert_eq!(entry.unique_id, "worker-1");
}

#[test]
fn unregister_frees_the_slot_for_reuse() {
    let segment = TestSegment::new();
    let registry = segment.registry();

    let idx = registry
        .register(1, "/kernel_scheduler_chan_a", "t", "u")
        .unwrap();
    registry.unregister(idx);

    assert!(registry
        .snapshot()
        .iter()
        .all(|(i, _)| *i != idx));

    let idx2 = registry
        .register(2, "/kernel_scheduler_chan_b", "t", "u")
        .unwrap();
    assert_eq!(idx2, idx, "freed slot should be reused before a new one");
}

#[test]
fn registry_reports_full_after_capacity_registrations() {
    let segment = TestSegment::new();
    let registry = segment.registry();

    for i in 0..REGISTRY_CAPACITY {
        registry
            .register(i as u64, "/kernel_scheduler_chan", "t", "u")
            .expect("within capacity");
    }

    assert_eq!(
        registry.register(999, "/kernel_scheduler_chan", "t", "u"),
        Err(RegistryError::Full)
    );
}

#[test]
fn rejects_a_segment_name_over_the_length_budget() {
    let segment = TestSegment::new();
    let registry = segment.registry();

    let too_long = "x".repeat(MAX_SEGMENT_NAME + 1);
    assert_eq!(
        registry.register(1, &too_long, "t", "u"),
        Err(RegistryError::FieldTooLong {
            field: "segment_name",
            max: MAX_SEGMENT_NAME,
        })
    );
}

#[test]
fn heartbeat_updates_are_reflected_in_snapshots() {
    let segment = TestSegment::new();
    let registry = segment.registry();

    let idx = registry
        .register(1, "/kernel_scheduler_chan", "t", "u")
        .unwrap();
    let before = registry
        .snapshot()
        .into_iter()
        .find(|(i, _)| *i == idx)
        .unwrap()
        .1
        .last_heartbeat;

    std::thread::sleep(std::time::Duration::from_millis(5));
    registry.update_heartbeat(idx);

    let after = registry
        .snapshot()
        .into_iter()
        .find(|(i, _)| *i == idx)
        .unwrap()
        .1
        .last_heartbeat;
    assert!(after >= before);
}
