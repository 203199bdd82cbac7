use thiserror::Error;

/// Errors raised while connecting to the server (§4.7).
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("registry segment: {0}")]
    Registry(#[from] ks_core::ShmError),
    #[error("registry never reported server_ready within the attach timeout")]
    ServerNotReady,
    #[error("channel segment: {0}")]
    Channel(ks_core::ShmError),
    #[error("channel's server_ready handshake never completed within the timeout")]
    ChannelNeverAdopted,
    #[error("registry is full: {0}")]
    RegistryFull(#[from] ks_core::RegistryError),
}
