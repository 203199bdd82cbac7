//! Shared layout and wire contract between the decision server and its
//! worker clients: lock-free SPSC rings, the per-client channel segment,
//! the shared worker registry, process liveness probing, the request/
//! response wire format, and POSIX shared-memory mapping.
//!
//! Every type placed inside a mapped segment is `#[repr(C)]`, contains no
//! pointers or heap allocations, and implements [`shm::ShmInit`] so that
//! [`shm::ShmHandle`] can construct it in place over raw, zeroed memory
//! shared by two unrelated processes.

mod align;
mod backoff;
mod consts;
mod invariants;

pub mod channel;
pub mod error;
pub mod names;
pub mod process;
pub mod registry;
pub mod ring;
pub mod shm;
pub mod wire;

pub use channel::Channel;
pub use consts::{
    MAX_CLIENT_TYPE, MAX_SEGMENT_NAME, MAX_UNIQUE_ID, QUEUE_CAPACITY, REGISTRY_CAPACITY,
    SLOT_CAPACITY,
};
pub use error::{RegistryError, RingError, ShmError, WireError};
pub use registry::{EntrySnapshot, Registry};
pub use ring::Ring;
pub use shm::{ShmHandle, ShmInit};
