//! Shared scaffolding for the end-to-end scenario tests (§8): spawns a
//! real `ks-server` child process per test, isolated from every other test
//! (and from any real server that might be running on this host) by giving
//! each one its own `$USER`-scoped registry name.

use std::process::{Child, Command};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;

/// These tests all ultimately key off `$USER` (the registry's namespacing
/// rule, §6) and each test sets that variable process-wide for its own
/// isolated tag — so at most one of these tests may run at a time even
/// though each spawns its own server subprocess.
pub static SERIALIZE: Mutex<()> = Mutex::new(());

static TAG_COUNTER: AtomicU64 = AtomicU64::new(0);

pub fn unique_user_tag() -> String {
    format!(
        "kstest{}_{}",
        std::process::id(),
        TAG_COUNTER.fetch_add(1, Ordering::Relaxed)
    )
}

pub struct TestServer {
    child: Child,
    user_tag: String,
}

impl TestServer {
    /// Spawns `ks-server` with `$USER` set to a fresh tag, and blocks the
    /// test's env var in place for the duration of this guard's lifetime.
    pub fn spawn() -> Self {
        let user_tag = unique_user_tag();
        std::env::set_var("USER", &user_tag);

        let child = Command::new(env!("CARGO_BIN_EXE_ks-server"))
            .env("USER", &user_tag)
            .env("RUST_LOG", "ks_server=info,ks_core=info")
            .spawn()
            .expect("failed to spawn ks-server");

        Self { child, user_tag }
    }

    pub fn user_tag(&self) -> &str {
        &self.user_tag
    }

    /// Sends SIGTERM and waits (bounded) for the process to exit, matching
    /// scenario 6's "within 1 s" bound.
    pub fn terminate_gracefully(mut self) {
        let pid = Pid::from_raw(self.child.id() as i32);
        let _ = kill(pid, Signal::SIGTERM);

        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        loop {
            match self.child.try_wait() {
                Ok(Some(_)) => break,
                Ok(None) if std::time::Instant::now() < deadline => {
                    std::thread::sleep(Duration::from_millis(20));
                }
                _ => {
                    let _ = self.child.kill();
                    break;
                }
            }
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
        // Best-effort: a test that panicked before a graceful shutdown
        // would otherwise leak this segment into the next test run.
        let _ = ks_core::shm::destroy(&format!("/kernel_scheduler_registry_{}", self.user_tag));
    }
}

/// Retries `f` until it returns `Some`, sleeping briefly between attempts,
/// up to `timeout`.
pub fn retry_until<T>(timeout: Duration, mut f: impl FnMut() -> Option<T>) -> Option<T> {
    let deadline = std::time::Instant::now() + timeout;
    loop {
        if let Some(v) = f() {
            return Some(v);
        }
        if std::time::Instant::now() >= deadline {
            return None;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
}
