use std::path::PathBuf;

use nix::errno::Errno;
use thiserror::Error;

/// Errors produced while encoding or decoding a wire frame
#[derive(Debug, Error)]
pub enum WireError {
    #[error("Frame has {actual} bytes, expected {expected}")]
    Length { expected: usize, actual: usize },

    #[error("Bad frame magic: {0:02x?}")]
    BadMagic([u8; 4]),

    #[error("Unsupported wire format version: {0}")]
    UnsupportedVersion(u16),

    #[error("Unknown operation tag: {0}")]
    UnknownOperation(u8),

    #[error("Unknown status tag: {0}")]
    UnknownStatus(u8),

    #[error("Field {field} is {len} bytes, max {max}")]
    FieldTooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("Field {field} contains a NUL byte")]
    EmbeddedNul { field: &'static str },

    #[error("Field {field} is not valid UTF-8")]
    InvalidText { field: &'static str },
}

/// Errors raised by either IPC transport
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{op} failed on {}: {source}", path.display())]
    Pipe {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: Errno,
    },

    #[error("{op} failed on message queue {key:#x}: {source}")]
    Queue {
        op: &'static str,
        key: i32,
        #[source]
        source: Errno,
    },

    #[error("Server not running")]
    ServerNotRunning,

    #[error("Interrupted by signal")]
    Interrupted,

    #[error("Short read: got {actual} of {expected} bytes")]
    ShortRead { expected: usize, actual: usize },

    #[error("Short write: wrote {actual} of {expected} bytes")]
    ShortWrite { expected: usize, actual: usize },

    #[error("Peer closed the connection")]
    PeerClosed,

    #[error("No reply channel is open")]
    NoReplyChannel,

    #[error("Transport is closed")]
    Closed,

    #[error("Origin id {0} cannot be used as a message type")]
    InvalidOrigin(u32),

    #[error("Malformed message: {source}")]
    Malformed {
        /// Origin id read from the frame header, when the header was intact
        origin_id: Option<u32>,
        #[source]
        source: WireError,
    },

    #[error("Protocol error: {0}")]
    Wire(#[from] WireError),
}

impl TransportError {
    /// Map an errno from a pipe call, keeping signal interruption distinguishable
    pub(crate) fn pipe(op: &'static str, path: impl Into<PathBuf>, errno: Errno) -> Self {
        match errno {
            Errno::EINTR => TransportError::Interrupted,
            source => TransportError::Pipe {
                op,
                path: path.into(),
                source,
            },
        }
    }

    /// Map an errno from a message queue call
    pub(crate) fn queue(op: &'static str, key: i32, errno: Errno) -> Self {
        match errno {
            Errno::EINTR => TransportError::Interrupted,
            Errno::EIDRM => TransportError::PeerClosed,
            source => TransportError::Queue { op, key, source },
        }
    }

    /// Map a read/write error on an open descriptor
    pub(crate) fn io(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::Interrupted => TransportError::Interrupted,
            std::io::ErrorKind::BrokenPipe => TransportError::PeerClosed,
            _ => TransportError::Io(err),
        }
    }
}

/// Errors raised by a record store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] bincode::Error),

    #[error("Catalog key is empty")]
    EmptyKey,

    #[error("Catalog key too long: {len} bytes, max {max}")]
    KeyTooLong { len: usize, max: usize },

    #[error("No such record: {0}")]
    NotFound(String),

    #[error("Store is locked by another process: {0}")]
    Locked(PathBuf),
}

/// Errors surfaced by the client proxy
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Protocol error: {0}")]
    Wire(#[from] WireError),

    #[error("Server rejected request: {0}")]
    Rejected(String),

    #[error("Unexpected reply: {0}")]
    UnexpectedReply(String),

    #[error("Search spool error: {0}")]
    Spool(#[from] std::io::Error),
}

pub type TransportResult<T> = std::result::Result<T, TransportError>;
pub type StoreResult<T> = std::result::Result<T, StoreError>;
pub type ClientResult<T> = std::result::Result<T, ClientError>;
