//! Worker-side connector for the kernel-admission scheduler: attaches to
//! the server's registry, creates a per-worker channel, and runs the
//! two-phase handshake described in §4.7 before any request may be sent.

pub mod connector;
pub mod error;

pub use connector::Connector;
pub use error::ConnectError;
