//! The decision server's entry point (§6 "process surface"): takes no
//! arguments, responds to SIGINT/SIGTERM by flipping the shutdown flag and
//! exiting cleanly, exit code 0 on clean shutdown, non-zero if the registry
//! segment cannot be created.

mod logging;
mod policy;
mod reactor;
mod service;

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use reactor::Reactor;

fn main() {
    logging::init();

    let shutdown = Arc::new(AtomicBool::new(false));
    if let Err(err) = signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(&shutdown))
    {
        tracing::error!(error = %err, "failed to register SIGINT handler");
        std::process::exit(1);
    }
    if let Err(err) =
        signal_hook::flag::register(signal_hook::consts::SIGTERM, Arc::clone(&shutdown))
    {
        tracing::error!(error = %err, "failed to register SIGTERM handler");
        std::process::exit(1);
    }

    let reactor = match Reactor::bootstrap(shutdown) {
        Ok(reactor) => reactor,
        Err(err) => {
            tracing::error!(error = %err, "failed to create registry segment");
            std::process::exit(1);
        }
    };

    reactor.run();
}
