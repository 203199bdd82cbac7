//! Layout constants shared by every component that touches the mapped structs.
//!
//! These sizes are part of the wire-compatible ABI between the client and
//! server builds (§6 "Segment layout") — changing any of them changes the
//! shared-memory layout and is a breaking change for anything with an
//! already-running peer.

/// `Q`: number of slots in one SPSC ring. Must be a power of two (masking
/// relies on it).
pub const QUEUE_CAPACITY: usize = 1024;

/// Index mask for wrapping a `head`/`tail` counter into `[0, QUEUE_CAPACITY)`.
pub const QUEUE_MASK: usize = QUEUE_CAPACITY - 1;

/// `S`: fixed payload capacity of one slot, in bytes, including the NUL
/// terminator. Effective payload length is at most `SLOT_CAPACITY - 1`.
pub const SLOT_CAPACITY: usize = 256;

/// `N`: number of entries in the registry table.
pub const REGISTRY_CAPACITY: usize = 64;

/// Maximum length, in bytes, of a registry entry's channel segment name
/// (not counting the NUL terminator).
pub const MAX_SEGMENT_NAME: usize = 63;

/// Maximum length, in bytes, of a registry entry's client type tag.
pub const MAX_CLIENT_TYPE: usize = 15;

/// Maximum length, in bytes, of a registry entry's client-chosen unique id.
pub const MAX_UNIQUE_ID: usize = 63;

const _: () = assert!(QUEUE_CAPACITY.is_power_of_two());
