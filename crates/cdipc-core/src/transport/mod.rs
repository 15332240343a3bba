//! IPC transports between the record client and the server
//!
//! Both backends present the same request/response contract. A server
//! receives one request at a time and answers it with a reply session:
//! `reply_begin`, any number of `reply_send`, then `reply_end`. A client sends
//! one request and reads its replies inside the same kind of session.
//!
//! Transports own every OS resource they create. Pipes and queues are made
//! and removed only by `open` and `close`.

pub mod fifo;
#[cfg(target_os = "linux")]
pub mod queue;

pub use fifo::{FifoClient, FifoServer};
#[cfg(target_os = "linux")]
pub use queue::{QueueClient, QueueServer};

use crate::error::{TransportError, TransportResult};
use crate::wire::{peek_origin, WireMessage, WIRE_SIZE};

/// Server half of a transport
pub trait ServerTransport: Sized {
    type Config;

    /// Create the inbound channel and start listening
    fn open(config: &Self::Config) -> TransportResult<Self>;

    /// Block until one complete request arrives
    fn receive(&mut self) -> TransportResult<WireMessage>;

    /// Prepare to answer the client identified by `origin_id`
    fn reply_begin(&mut self, origin_id: u32) -> TransportResult<()>;

    /// Send one reply within the current session
    fn reply_send(&mut self, message: &WireMessage) -> TransportResult<()>;

    /// Finish the current reply session
    fn reply_end(&mut self);

    /// Release the channel and remove what `open` created. Idempotent.
    fn close(&mut self);
}

/// Client half of a transport
pub trait ClientTransport: Sized {
    type Config;

    /// Attach to a running server
    fn open(config: &Self::Config) -> TransportResult<Self>;

    /// The id the server routes replies by
    fn origin_id(&self) -> u32;

    /// Send one request; the origin id is stamped by the transport
    fn send(&mut self, message: &WireMessage) -> TransportResult<()>;

    /// Prepare to read the replies to the last request
    fn reply_begin(&mut self) -> TransportResult<()>;

    /// Block until one reply arrives
    fn reply_receive(&mut self) -> TransportResult<WireMessage>;

    /// Finish the current reply session
    fn reply_end(&mut self);

    /// Release everything the client holds. Idempotent.
    fn close(&mut self);
}

/// Decode a received frame, keeping the origin id of a malformed one
pub(crate) fn decode_frame(frame: &[u8]) -> TransportResult<WireMessage> {
    WireMessage::decode(frame).map_err(|source| TransportError::Malformed {
        origin_id: peek_origin(frame),
        source,
    })
}

/// Check the byte count of a single read against the frame size
pub(crate) fn check_read(actual: usize) -> TransportResult<()> {
    if actual == WIRE_SIZE {
        Ok(())
    } else {
        Err(TransportError::ShortRead {
            expected: WIRE_SIZE,
            actual,
        })
    }
}

/// Check the byte count of a single write against the frame size
pub(crate) fn check_write(actual: usize) -> TransportResult<()> {
    if actual == WIRE_SIZE {
        Ok(())
    } else {
        Err(TransportError::ShortWrite {
            expected: WIRE_SIZE,
            actual,
        })
    }
}
