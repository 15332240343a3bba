use anyhow::{Context, Result};
use cdipc_core::{Config, FileStore, ServerTransport, TransportKind};
use cdipc_daemon::{signals, Server};
use std::path::Path;
use tracing::info;

pub fn run(config: &Config, init: bool) -> Result<()> {
    signals::install_handlers().context("Failed to install signal handlers")?;

    match config.transport.kind {
        TransportKind::Fifo => serve::<cdipc_core::FifoServer>(&config.fifo, &config.store.data_dir, init),
        TransportKind::Queue => serve_queue(config, init),
    }
}

#[cfg(target_os = "linux")]
fn serve_queue(config: &Config, init: bool) -> Result<()> {
    serve::<cdipc_core::QueueServer>(&config.queue, &config.store.data_dir, init)
}

#[cfg(not(target_os = "linux"))]
fn serve_queue(_config: &Config, _init: bool) -> Result<()> {
    anyhow::bail!("The message queue transport is only available on Linux")
}

fn serve<T: ServerTransport>(transport_config: &T::Config, data_dir: &Path, init: bool) -> Result<()> {
    let mut server = Server::<FileStore, T>::start(transport_config, data_dir, init)
        .context("Could not initialize server")?;
    info!("Serving records from {}", data_dir.display());

    server.run().context("Server stopped on a fatal error")?;
    Ok(())
}
