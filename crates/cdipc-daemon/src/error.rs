use cdipc_core::{StoreError, TransportError};
use nix::errno::Errno;
use thiserror::Error;

/// Errors that stop the server
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Failed to install signal handler: {0}")]
    Signal(#[source] Errno),
}

pub type Result<T> = std::result::Result<T, DaemonError>;
