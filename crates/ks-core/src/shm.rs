//! POSIX shared-memory mapper: create-or-open, size, map, unmap, unlink.
//!
//! This is the only module that talks to the OS's shared-memory namespace.
//! Everything above it (`Ring`, `Channel`, `Registry`) only needs a `&T`
//! into memory that happens to be mapped `MAP_SHARED`; this module is what
//! gets them there.

use std::ffi::{c_void, CString};
use std::marker::PhantomData;
use std::num::NonZeroUsize;
use std::ptr::NonNull;

use nix::fcntl::OFlag;
use nix::sys::mman::{mmap, munmap, shm_open, shm_unlink, MapFlags, ProtFlags};
use nix::sys::stat::Mode;
use nix::unistd::ftruncate;

use crate::error::ShmError;

/// Marker for POD structs that may be placed at an arbitrary address inside
/// a shared-memory segment and accessed concurrently by two unrelated
/// processes: `#[repr(C)]`, no pointers, no heap allocation, no `Drop`.
///
/// # Safety
/// Implementors must ensure `init_in_place` writes only within
/// `size_of::<Self>()` bytes starting at `ptr`, using raw pointer writes
/// that never read the (possibly uninitialized) memory they're writing to.
pub unsafe trait ShmInit: Sized {
    /// # Safety
    /// `ptr` must point to `size_of::<Self>()` bytes of freshly truncated,
    /// zeroed memory, exclusively owned by the caller for the duration of
    /// this call.
    unsafe fn init_in_place(ptr: *mut Self);
}

/// A mapped shared-memory segment holding exactly one `T`.
///
/// Dropping the handle unmaps the segment but does **not** unlink it from
/// the OS namespace — per §9, exactly one party (always the server, for
/// both channels and the registry) ever calls [`destroy`], and it does so
/// explicitly rather than as a side effect of some handle going out of
/// scope in some other process.
pub struct ShmHandle<T> {
    ptr: NonNull<T>,
    _marker: PhantomData<T>,
}

// SAFETY: the handle only ever hands out shared references to the mapped
// struct; `T`'s own internals (atomics, single-writer `UnsafeCell`s) carry
// whatever synchronization is needed for cross-thread/cross-process access.
unsafe impl<T: Sync> Sync for ShmHandle<T> {}
unsafe impl<T: Sync> Send for ShmHandle<T> {}

impl<T: ShmInit> ShmHandle<T> {
    /// Opens or creates the named segment and maps it as `T`.
    ///
    /// When `create` is true, the segment is truncated to `size_of::<T>()`
    /// and `T::init_in_place` runs exactly once. When `create` is false and
    /// the segment does not exist, returns [`ShmError::NotFound`] — the
    /// caller (typically the reactor's `adopt`) is expected to retry later.
    pub fn attach(name: &str, create: bool) -> Result<Self, ShmError> {
        let cname = CString::new(name).expect("segment name must not contain a NUL byte");

        let mut oflag = OFlag::O_RDWR;
        if create {
            oflag |= OFlag::O_CREAT;
        }
        let mode = Mode::S_IRUSR | Mode::S_IWUSR;

        let fd = shm_open(&cname, oflag, mode).map_err(|source| {
            if !create && source == nix::Error::ENOENT {
                ShmError::NotFound {
                    name: name.to_string(),
                }
            } else {
                ShmError::OpenFailed {
                    name: name.to_string(),
                    source,
                }
            }
        })?;

        let size = std::mem::size_of::<T>();
        if create {
            ftruncate(&fd, size as i64).map_err(|source| ShmError::OpenFailed {
                name: name.to_string(),
                source,
            })?;
        }

        let len = NonZeroUsize::new(size).expect("mapped type must be non-zero sized");
        // SAFETY: `fd` refers to a segment of at least `size` bytes — we
        // just truncated it on the creating path, and an already-existing
        // segment was sized this way by whichever process created it,
        // since both sides share the same struct layout (consts.rs).
        let ptr = unsafe {
            mmap(
                None,
                len,
                ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
                MapFlags::MAP_SHARED,
                &fd,
                0,
            )
        }
        .map_err(|source| ShmError::OpenFailed {
            name: name.to_string(),
            source,
        })?;
        // `fd` is dropped here (closed); the mapping outlives the descriptor.

        let ptr = ptr.cast::<T>();
        if create {
            // SAFETY: freshly truncated memory, not yet visible to any
            // other thread or process via this handle.
            unsafe { T::init_in_place(ptr.as_ptr()) };
        }

        Ok(Self {
            ptr,
            _marker: PhantomData,
        })
    }

    /// Borrows the mapped struct.
    pub fn get(&self) -> &T {
        // SAFETY: `ptr` stays validly mapped for the lifetime of `self`,
        // and `T::init_in_place` ran before any handle (ours or a peer's)
        // was constructed over this segment.
        unsafe { self.ptr.as_ref() }
    }

    /// Explicitly unmaps the segment, surfacing any failure. Equivalent to
    /// dropping the handle except that `munmap` errors are not silently
    /// logged-and-swallowed.
    pub fn detach(self) -> Result<(), ShmError> {
        let len = std::mem::size_of::<T>();
        let ptr = self.ptr;
        std::mem::forget(self);
        // SAFETY: `ptr`/`len` describe exactly the mapping `attach` created;
        // `forget` above ensures `Drop::drop` does not also unmap it.
        unsafe { munmap(ptr.cast::<c_void>(), len) }.map_err(ShmError::UnmapFailed)
    }
}

impl<T> Drop for ShmHandle<T> {
    fn drop(&mut self) {
        let len = std::mem::size_of::<T>();
        // SAFETY: see `detach`; this path runs only when the caller didn't
        // already consume the handle through it.
        if let Err(err) = unsafe { munmap(self.ptr.cast::<c_void>(), len) } {
            tracing::warn!(error = %err, "failed to unmap shared-memory segment on drop");
        }
    }
}

/// Unlinks a named segment from the OS namespace. Idempotent: a missing
/// segment is not an error, since the caller may be racing a peer's own
/// cleanup (e.g. the reactor reaping a client that also unregistered
/// cleanly moments earlier).
pub fn destroy(name: &str) -> Result<(), ShmError> {
    let cname = CString::new(name).expect("segment name must not contain a NUL byte");
    match shm_unlink(&cname) {
        Ok(()) | Err(nix::Error::ENOENT) => Ok(()),
        Err(source) => Err(ShmError::UnlinkFailed {
            name: name.to_string(),
            source,
        }),
    }
}
