//! Structured logging setup (§1 ambient stack, §6 logging surface).
//!
//! `RUST_LOG` controls verbosity via `tracing_subscriber::EnvFilter`;
//! absent any override, lifecycle events log at `info` and per-request
//! tracing at `debug`.

pub fn init() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("ks_server=info,ks_core=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}
