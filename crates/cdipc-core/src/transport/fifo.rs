//! Named pipe transport
//!
//! All clients write requests into one well-known pipe. Each client reads its
//! replies from a private pipe named after its process id, which the server
//! opens only for the duration of one reply session.
//!
//! Two descriptor rules keep the blocking reads honest:
//! - the server treats a zero-byte read on its inbound pipe as "every writer
//!   left" and reopens, which blocks until the next client connects;
//! - a client holds both a reader and a writer on its own pipe while it waits
//!   for replies, so its reads block between server sessions instead of
//!   reporting end of file.

use std::fs::File;
use std::io::{Read, Write};
use std::os::fd::{AsRawFd, FromRawFd};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use nix::errno::Errno;
use nix::fcntl::{fcntl, open, FcntlArg, OFlag};
use nix::sys::stat::Mode;
use nix::unistd::{mkfifo, unlink};
use tracing::debug;

use super::{check_read, check_write, decode_frame, ClientTransport, ServerTransport};
use crate::config::FifoConfig;
use crate::error::{TransportError, TransportResult};
use crate::wire::{stamp_origin, WireMessage, WIRE_SIZE};

/// Server end: owns the inbound pipe
pub struct FifoServer {
    config: FifoConfig,
    path: PathBuf,
    inbound: Option<File>,
    outbound: Option<File>,
    closed: bool,
}

impl ServerTransport for FifoServer {
    type Config = FifoConfig;

    fn open(config: &FifoConfig) -> TransportResult<Self> {
        let path = config.server_pipe();
        remove_stale(&path).map_err(|e| TransportError::pipe("unlink", &path, e))?;
        mkfifo(&path, mode(config.mode)).map_err(|e| TransportError::pipe("mkfifo", &path, e))?;

        // A non-blocking open succeeds without a writer; reads are switched
        // back to blocking right after.
        let inbound = open_fifo(&path, OFlag::O_RDONLY | OFlag::O_NONBLOCK)
            .and_then(|file| set_blocking(&file).map(|()| file))
            .map_err(|e| TransportError::pipe("open", &path, e))?;

        debug!("Listening on {}", path.display());
        Ok(Self {
            config: config.clone(),
            path,
            inbound: Some(inbound),
            outbound: None,
            closed: false,
        })
    }

    fn receive(&mut self) -> TransportResult<WireMessage> {
        loop {
            if self.closed {
                return Err(TransportError::Closed);
            }

            if self.inbound.is_none() {
                let file = open_fifo(&self.path, OFlag::O_RDONLY)
                    .map_err(|e| TransportError::pipe("open", &self.path, e))?;
                debug!("Reopened {}", self.path.display());
                self.inbound = Some(file);
            }
            let Some(inbound) = self.inbound.as_mut() else {
                return Err(TransportError::Closed);
            };

            let mut frame = [0u8; WIRE_SIZE];
            match inbound.read(&mut frame) {
                Ok(0) => {
                    // Every writer has gone; wait for the next one
                    self.inbound = None;
                }
                Ok(n) => {
                    check_read(n)?;
                    return decode_frame(&frame);
                }
                Err(e) => return Err(TransportError::io(e)),
            }
        }
    }

    fn reply_begin(&mut self, origin_id: u32) -> TransportResult<()> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        let path = self.config.client_pipe(origin_id);
        let file = open_fifo(&path, OFlag::O_WRONLY).map_err(|e| TransportError::pipe("open", &path, e))?;
        self.outbound = Some(file);
        Ok(())
    }

    fn reply_send(&mut self, message: &WireMessage) -> TransportResult<()> {
        let outbound = self.outbound.as_mut().ok_or(TransportError::NoReplyChannel)?;
        let frame = message.encode()?;
        let n = outbound.write(&frame).map_err(TransportError::io)?;
        check_write(n)
    }

    fn reply_end(&mut self) {
        self.outbound = None;
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.inbound = None;
        self.outbound = None;
        if let Err(e) = unlink(&self.path) {
            debug!("Could not remove {}: {}", self.path.display(), e);
        }
        debug!("Closed {}", self.path.display());
    }
}

impl Drop for FifoServer {
    fn drop(&mut self) {
        self.close();
    }
}

/// Client end: a writer on the server pipe plus a private reply pipe
pub struct FifoClient {
    origin_id: u32,
    server_path: PathBuf,
    own_path: PathBuf,
    to_server: Option<File>,
    reader: Option<File>,
    writer: Option<File>,
    closed: bool,
}

impl FifoClient {
    /// Connect using an explicit origin id instead of the process id
    pub fn open_as(config: &FifoConfig, origin_id: u32) -> TransportResult<Self> {
        let server_path = config.server_pipe();
        let to_server = connect(&server_path, config)?;

        let own_path = config.client_pipe(origin_id);
        remove_stale(&own_path).map_err(|e| TransportError::pipe("unlink", &own_path, e))?;
        mkfifo(&own_path, mode(config.mode)).map_err(|e| TransportError::pipe("mkfifo", &own_path, e))?;

        debug!("Connected to {} as {}", server_path.display(), origin_id);
        Ok(Self {
            origin_id,
            server_path,
            own_path,
            to_server: Some(to_server),
            reader: None,
            writer: None,
            closed: false,
        })
    }

    /// Path of the pipe replies arrive on
    pub fn reply_path(&self) -> &Path {
        &self.own_path
    }
}

impl ClientTransport for FifoClient {
    type Config = FifoConfig;

    fn open(config: &FifoConfig) -> TransportResult<Self> {
        Self::open_as(config, std::process::id())
    }

    fn origin_id(&self) -> u32 {
        self.origin_id
    }

    fn send(&mut self, message: &WireMessage) -> TransportResult<()> {
        let to_server = self.to_server.as_mut().ok_or(TransportError::Closed)?;
        let mut frame = message.encode()?;
        stamp_origin(&mut frame, self.origin_id);
        let n = to_server.write(&frame).map_err(TransportError::io)?;
        check_write(n)
    }

    fn reply_begin(&mut self) -> TransportResult<()> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        if self.reader.is_some() && self.writer.is_some() {
            return Ok(());
        }

        let path = &self.own_path;
        let reader = open_fifo(path, OFlag::O_RDONLY | OFlag::O_NONBLOCK)
            .map_err(|e| TransportError::pipe("open", path, e))?;
        // A reader exists now, so this open does not block
        let writer = open_fifo(path, OFlag::O_WRONLY).map_err(|e| TransportError::pipe("open", path, e))?;
        set_blocking(&reader).map_err(|e| TransportError::pipe("fcntl", path, e))?;

        self.reader = Some(reader);
        self.writer = Some(writer);
        Ok(())
    }

    fn reply_receive(&mut self) -> TransportResult<WireMessage> {
        let reader = self.reader.as_mut().ok_or(TransportError::NoReplyChannel)?;
        let mut frame = [0u8; WIRE_SIZE];
        match reader.read(&mut frame) {
            Ok(0) => Err(TransportError::PeerClosed),
            Ok(n) => {
                check_read(n)?;
                decode_frame(&frame)
            }
            Err(e) => Err(TransportError::io(e)),
        }
    }

    fn reply_end(&mut self) {
        // The descriptor pair stays open for the next request
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.to_server = None;
        self.reader = None;
        self.writer = None;
        if let Err(e) = unlink(&self.own_path) {
            debug!("Could not remove {}: {}", self.own_path.display(), e);
        }
        debug!("Disconnected from {}", self.server_path.display());
    }
}

impl Drop for FifoClient {
    fn drop(&mut self) {
        self.close();
    }
}

/// Open the server pipe for writing, waiting briefly for a reader
fn connect(path: &Path, config: &FifoConfig) -> TransportResult<File> {
    let delay = Duration::from_millis(config.connect_retry_delay_ms);
    let mut attempt = 0;

    loop {
        match open_fifo(path, OFlag::O_WRONLY | OFlag::O_NONBLOCK) {
            Ok(file) => {
                set_blocking(&file).map_err(|e| TransportError::pipe("fcntl", path, e))?;
                return Ok(file);
            }
            Err(Errno::ENOENT) => return Err(TransportError::ServerNotRunning),
            // No reader yet: the server may be between two opens
            Err(Errno::ENXIO) if attempt < config.connect_retries => {
                attempt += 1;
                debug!("No reader on {}, retry {}", path.display(), attempt);
                thread::sleep(delay);
            }
            Err(Errno::ENXIO) => return Err(TransportError::ServerNotRunning),
            Err(e) => return Err(TransportError::pipe("open", path, e)),
        }
    }
}

fn open_fifo(path: &Path, flags: OFlag) -> nix::Result<File> {
    let fd = open(path, flags | OFlag::O_CLOEXEC, Mode::empty())?;
    // SAFETY: `open` just returned this descriptor and nothing else owns it
    Ok(unsafe { File::from_raw_fd(fd) })
}

fn set_blocking(file: &File) -> nix::Result<()> {
    let fd = file.as_raw_fd();
    let flags = OFlag::from_bits_truncate(fcntl(fd, FcntlArg::F_GETFL)?);
    fcntl(fd, FcntlArg::F_SETFL(flags & !OFlag::O_NONBLOCK))?;
    Ok(())
}

fn remove_stale(path: &Path) -> nix::Result<()> {
    match unlink(path) {
        Ok(()) | Err(Errno::ENOENT) => Ok(()),
        Err(e) => Err(e),
    }
}

fn mode(bits: u32) -> Mode {
    Mode::from_bits_truncate(bits as libc::mode_t)
}
