//! cdipc-daemon - Record server for cdipc
//!
//! This crate provides the server side of the record protocol:
//! - A single-threaded receive and dispatch loop over any `ServerTransport`
//! - Streaming replies for catalog searches
//! - Shutdown on SIGINT, SIGHUP or SIGTERM

mod dispatch;
pub mod error;
pub mod signals;

#[cfg(test)]
mod testing;

pub use error::{DaemonError, Result};

use std::path::Path;

use cdipc_core::{FileStore, RecordStore, ServerTransport, TransportError};
use tracing::{debug, info, warn};

/// Serves requests from one transport against one store
pub struct Server<S: RecordStore, T: ServerTransport> {
    store: S,
    transport: T,
    handled: u64,
}

impl<T: ServerTransport> Server<FileStore, T> {
    /// Open the store in `data_dir`, then start listening
    pub fn start(transport_config: &T::Config, data_dir: &Path, new_database: bool) -> Result<Self> {
        let store = FileStore::open(data_dir, new_database)?;
        let transport = T::open(transport_config)?;
        Ok(Self::new(store, transport))
    }
}

impl<S: RecordStore, T: ServerTransport> Server<S, T> {
    pub fn new(store: S, transport: T) -> Self {
        Self {
            store,
            transport,
            handled: 0,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Requests answered so far
    pub fn handled(&self) -> u64 {
        self.handled
    }

    /// Receive one request and answer it.
    ///
    /// A request that cannot be decoded is answered with a failure when its
    /// origin is readable and dropped otherwise; neither stops the server.
    pub fn handle_next(&mut self) -> Result<()> {
        let message = match self.transport.receive() {
            Ok(message) => message,
            Err(TransportError::Malformed {
                origin_id: Some(origin),
                source,
            }) => {
                warn!("Malformed request from {}: {}", origin, source);
                dispatch::reject(&mut self.transport, origin, &source.to_string());
                return Ok(());
            }
            Err(TransportError::Malformed { origin_id: None, source }) => {
                warn!("Dropping unreadable request: {}", source);
                return Ok(());
            }
            Err(e @ TransportError::ShortRead { .. }) => {
                warn!("Dropping request: {}", e);
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        dispatch::dispatch(&mut self.store, &mut self.transport, &message);
        self.handled += 1;
        Ok(())
    }

    /// Serve until a termination signal arrives
    pub fn run(&mut self) -> Result<()> {
        self.run_until(signals::shutdown_requested)
    }

    /// Serve until `stop` returns true, then close the transport.
    ///
    /// `stop` is checked before each receive and after a receive is
    /// interrupted by a signal. A signal landing after the check but before
    /// the receive blocks is only seen once the next request has been
    /// answered. A request already received is always answered, since its
    /// client is blocked waiting on the reply.
    pub fn run_until(&mut self, mut stop: impl FnMut() -> bool) -> Result<()> {
        info!("Server ready");
        let outcome = loop {
            if stop() {
                break Ok(());
            }
            match self.handle_next() {
                Ok(()) => {}
                Err(DaemonError::Transport(TransportError::Interrupted)) => {
                    debug!("Receive interrupted");
                }
                Err(e) => break Err(e),
            }
        };

        self.transport.close();
        info!("Server stopped after {} requests", self.handled);
        outcome
    }

    /// Close the transport now
    pub fn close(&mut self) {
        self.transport.close();
    }

    pub fn into_parts(self) -> (S, T) {
        (self.store, self.transport)
    }
}
