//! Process liveness probing, used by the reaper to decide whether a
//! registry entry's owning worker is still around (§4.6).

use nix::sys::signal::kill;
use nix::unistd::Pid;

/// Probes whether `pid` names a live process by sending it the null signal.
///
/// `ESRCH` (no such process) is the only outcome that means "dead" — a
/// process we're not permitted to signal (`EPERM`, e.g. a different uid) or
/// any other errno is treated as "alive", since the only thing we actually
/// know for certain is that the pid isn't *confirmed* gone.
pub fn is_alive(pid: u64) -> bool {
    let Ok(pid) = i32::try_from(pid) else {
        return false;
    };
    match kill(Pid::from_raw(pid), None) {
        Ok(()) => true,
        Err(nix::Error::ESRCH) => false,
        Err(_) => true,
    }
}
