use thiserror::Error;

/// Errors raised by the SPSC ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RingError {
    /// `try_push` found no free slot.
    #[error("ring is full")]
    Full,
    /// `try_pop` found no pending record.
    #[error("ring is empty")]
    Empty,
    /// A blocking variant exceeded its deadline.
    #[error("timed out waiting on ring")]
    TimedOut,
}

/// Errors raised by the shared-memory mapper.
#[derive(Debug, Error)]
pub enum ShmError {
    /// `shm_open` (or the subsequent `ftruncate`/`mmap`) failed.
    #[error("failed to open shared-memory segment {name:?}: {source}")]
    OpenFailed {
        name: String,
        #[source]
        source: nix::Error,
    },
    /// The segment was opened for attach (not create) but does not exist.
    #[error("shared-memory segment {name:?} does not exist")]
    NotFound { name: String },
    /// `munmap` failed while detaching.
    #[error("failed to unmap shared-memory segment: {0}")]
    UnmapFailed(nix::Error),
    /// `shm_unlink` failed while destroying a segment.
    #[error("failed to unlink shared-memory segment {name:?}: {source}")]
    UnlinkFailed {
        name: String,
        #[source]
        source: nix::Error,
    },
}

/// Errors raised by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Every slot is currently active.
    #[error("registry has no free slot (capacity exhausted)")]
    Full,
    /// A string field supplied to `register` exceeds its storage budget.
    #[error("field {field} exceeds its maximum length of {max} bytes")]
    FieldTooLong { field: &'static str, max: usize },
}

/// Errors raised while parsing the request/response wire format.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
    /// Fewer than the three mandatory `|`-delimited fields were present.
    #[error("malformed request (expected at least 3 fields, got {found})")]
    MalformedRequest { found: usize },
}
