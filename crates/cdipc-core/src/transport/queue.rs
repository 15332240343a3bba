//! System V message queue transport
//!
//! Two system-wide queues keyed from the config: requests flow into the
//! server queue, replies into the client queue. Every message carries the
//! client's origin id as its message type. The server reads any type; each
//! client reads only its own, so one reply queue serves every client.

use std::ptr;

use libc::{c_int, c_long, c_void};
use nix::errno::Errno;
use tracing::{debug, warn};

use super::{check_read, decode_frame, ClientTransport, ServerTransport};
use crate::config::QueueConfig;
use crate::error::{TransportError, TransportResult};
use crate::wire::{stamp_origin, WireMessage, WIRE_SIZE};

/// Receive buffer, one byte over a frame so an oversized message shows up
/// as a bad length
const RECEIVE_SIZE: usize = WIRE_SIZE + 1;

/// In-memory layout `msgsnd`/`msgrcv` expect: a type word then the payload
#[repr(C)]
struct QueueFrame {
    mtype: c_long,
    payload: [u8; RECEIVE_SIZE],
}

impl QueueFrame {
    fn empty() -> Self {
        Self {
            mtype: 0,
            payload: [0u8; RECEIVE_SIZE],
        }
    }
}

/// A queue identifier together with the key it was looked up by
#[derive(Debug, Clone, Copy)]
struct Queue {
    key: i32,
    id: c_int,
}

impl Queue {
    fn get(key: i32, flags: c_int) -> nix::Result<Self> {
        // SAFETY: msgget takes no pointers
        let id = unsafe { libc::msgget(key as libc::key_t, flags) };
        if id == -1 {
            Err(Errno::last())
        } else {
            Ok(Self { key, id })
        }
    }

    fn send(&self, mtype: u32, payload: &[u8; WIRE_SIZE]) -> TransportResult<()> {
        let mut frame = QueueFrame::empty();
        frame.mtype = mtype as c_long;
        frame.payload[..WIRE_SIZE].copy_from_slice(payload);
        // SAFETY: frame is a live QueueFrame holding at least WIRE_SIZE payload bytes
        let rc = unsafe {
            libc::msgsnd(
                self.id,
                &frame as *const QueueFrame as *const c_void,
                WIRE_SIZE,
                0,
            )
        };
        if rc == -1 {
            return Err(TransportError::queue("msgsnd", self.key, Errno::last()));
        }
        Ok(())
    }

    /// Block until a message of `mtype` arrives (`0` takes any type).
    ///
    /// A message of the wrong size is consumed and reported as `ShortRead`;
    /// longer ones are cut at `RECEIVE_SIZE` by `MSG_NOERROR`.
    fn receive(&self, mtype: u32) -> TransportResult<WireMessage> {
        let mut frame = QueueFrame::empty();
        // SAFETY: frame has room for a type word plus RECEIVE_SIZE payload bytes
        let n = unsafe {
            libc::msgrcv(
                self.id,
                &mut frame as *mut QueueFrame as *mut c_void,
                RECEIVE_SIZE,
                mtype as c_long,
                libc::MSG_NOERROR,
            )
        };
        if n < 0 {
            return Err(TransportError::queue("msgrcv", self.key, Errno::last()));
        }
        check_read(n as usize)?;
        decode_frame(&frame.payload[..WIRE_SIZE])
    }

    fn remove(&self) -> nix::Result<()> {
        // SAFETY: IPC_RMID ignores the buffer argument
        let rc = unsafe { libc::msgctl(self.id, libc::IPC_RMID, ptr::null_mut()) };
        if rc == -1 {
            Err(Errno::last())
        } else {
            Ok(())
        }
    }
}

/// Server end: creates and finally removes both queues
pub struct QueueServer {
    requests: Queue,
    replies: Queue,
    closed: bool,
}

impl ServerTransport for QueueServer {
    type Config = QueueConfig;

    fn open(config: &QueueConfig) -> TransportResult<Self> {
        let flags = libc::IPC_CREAT | (config.mode & 0o777) as c_int;
        let requests = Queue::get(config.server_key, flags)
            .map_err(|e| TransportError::queue("msgget", config.server_key, e))?;
        let replies = Queue::get(config.client_key, flags)
            .map_err(|e| TransportError::queue("msgget", config.client_key, e))?;

        debug!(
            "Listening on message queues {:#x}/{:#x}",
            config.server_key, config.client_key
        );
        Ok(Self {
            requests,
            replies,
            closed: false,
        })
    }

    fn receive(&mut self) -> TransportResult<WireMessage> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        self.requests.receive(0)
    }

    fn reply_begin(&mut self, _origin_id: u32) -> TransportResult<()> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        Ok(())
    }

    fn reply_send(&mut self, message: &WireMessage) -> TransportResult<()> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        self.replies.send(message.origin_id, &message.encode()?)
    }

    fn reply_end(&mut self) {}

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        for queue in [self.requests, self.replies] {
            if let Err(e) = queue.remove() {
                warn!("Failed to remove message queue {:#x}: {}", queue.key, e);
            }
        }
        debug!("Removed message queues");
    }
}

impl Drop for QueueServer {
    fn drop(&mut self) {
        self.close();
    }
}

/// Client end: attaches to the server's queues and removes nothing
pub struct QueueClient {
    origin_id: u32,
    requests: Queue,
    replies: Queue,
    closed: bool,
}

impl QueueClient {
    /// Attach using an explicit origin id instead of the process id.
    ///
    /// The id doubles as the message type, so it must be nonzero.
    pub fn open_as(config: &QueueConfig, origin_id: u32) -> TransportResult<Self> {
        if origin_id == 0 || origin_id > c_long::MAX as u32 {
            return Err(TransportError::InvalidOrigin(origin_id));
        }
        let attach = |key: i32| match Queue::get(key, 0) {
            Ok(queue) => Ok(queue),
            Err(Errno::ENOENT) => Err(TransportError::ServerNotRunning),
            Err(e) => Err(TransportError::queue("msgget", key, e)),
        };
        let requests = attach(config.server_key)?;
        let replies = attach(config.client_key)?;

        debug!("Attached to message queues as {}", origin_id);
        Ok(Self {
            origin_id,
            requests,
            replies,
            closed: false,
        })
    }
}

impl ClientTransport for QueueClient {
    type Config = QueueConfig;

    fn open(config: &QueueConfig) -> TransportResult<Self> {
        Self::open_as(config, std::process::id())
    }

    fn origin_id(&self) -> u32 {
        self.origin_id
    }

    fn send(&mut self, message: &WireMessage) -> TransportResult<()> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        let mut frame = message.encode()?;
        stamp_origin(&mut frame, self.origin_id);
        self.requests.send(self.origin_id, &frame)
    }

    fn reply_begin(&mut self) -> TransportResult<()> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        Ok(())
    }

    fn reply_receive(&mut self) -> TransportResult<WireMessage> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        self.replies.receive(self.origin_id)
    }

    fn reply_end(&mut self) {}

    fn close(&mut self) {
        self.closed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::{CatalogEntry, Request, Status};

    /// Keys unique to this test process and test case
    fn test_config(case: i32) -> QueueConfig {
        let base = 0x3c00_0000 | ((std::process::id() as i32 & 0xffff) << 8);
        QueueConfig {
            server_key: base | (case << 1),
            client_key: base | (case << 1) | 1,
            mode: 0o600,
        }
    }

    #[test]
    fn test_client_without_server() {
        assert!(matches!(
            QueueClient::open_as(&test_config(1), 7),
            Err(TransportError::ServerNotRunning)
        ));
    }

    #[test]
    fn test_replies_routed_by_origin() -> TransportResult<()> {
        let config = test_config(2);
        let mut server = QueueServer::open(&config)?;
        let mut first = QueueClient::open_as(&config, 100)?;
        let mut second = QueueClient::open_as(&config, 200)?;

        first.send(&WireMessage::request(0, &Request::GetCatalog { catalog: "A".into() }))?;
        second.send(&WireMessage::request(0, &Request::GetCatalog { catalog: "B".into() }))?;

        for _ in 0..2 {
            let request = server.receive()?;
            server.reply_begin(request.origin_id)?;
            let mut reply = request.reply(Status::Ok);
            reply.catalog = CatalogEntry::new(request.catalog.catalog.clone(), "T", "CD", "ART");
            server.reply_send(&reply)?;
            server.reply_end();
        }

        // The later client reads first and still gets only its own reply
        second.reply_begin()?;
        let reply = second.reply_receive()?;
        assert_eq!(reply.origin_id, 200);
        assert_eq!(reply.catalog.catalog, "B");

        first.reply_begin()?;
        let reply = first.reply_receive()?;
        assert_eq!(reply.origin_id, 100);
        assert_eq!(reply.catalog.catalog, "A");
        Ok(())
    }

    /// Put a raw message of `len` bytes on `queue`
    fn send_raw(queue: &Queue, mtype: c_long, len: usize) {
        #[repr(C)]
        struct Oversized {
            mtype: c_long,
            payload: [u8; 600],
        }
        let frame = Oversized {
            mtype,
            payload: [0xab; 600],
        };
        assert!(len <= frame.payload.len());
        // SAFETY: frame outlives the call and holds at least len payload bytes
        let rc = unsafe {
            libc::msgsnd(
                queue.id,
                &frame as *const Oversized as *const c_void,
                len,
                0,
            )
        };
        assert_eq!(rc, 0, "msgsnd: {}", Errno::last());
    }

    #[test]
    fn test_wrong_size_messages_are_consumed() -> TransportResult<()> {
        let config = test_config(4);
        let mut server = QueueServer::open(&config)?;
        let mut client = QueueClient::open_as(&config, 300)?;

        send_raw(&server.requests, 300, 600);
        send_raw(&server.requests, 300, 9);
        client.send(&WireMessage::request(0, &Request::CreateDatabase))?;

        assert!(matches!(
            server.receive(),
            Err(TransportError::ShortRead { actual, .. }) if actual == WIRE_SIZE + 1
        ));
        assert!(matches!(
            server.receive(),
            Err(TransportError::ShortRead { actual: 9, .. })
        ));
        // The queue is still usable afterwards
        let request = server.receive()?;
        assert_eq!(request.origin_id, 300);
        assert_eq!(request.to_request(), Request::CreateDatabase);
        Ok(())
    }

    #[test]
    fn test_zero_origin_refused() -> TransportResult<()> {
        let config = test_config(5);
        let _server = QueueServer::open(&config)?;
        assert!(matches!(
            QueueClient::open_as(&config, 0),
            Err(TransportError::InvalidOrigin(0))
        ));
        Ok(())
    }

    #[test]
    fn test_close_removes_queues() -> TransportResult<()> {
        let config = test_config(3);
        let mut server = QueueServer::open(&config)?;
        let mut client = QueueClient::open_as(&config, 5)?;
        client.close();
        client.close();

        server.close();
        server.close();
        assert!(matches!(
            QueueClient::open_as(&config, 5),
            Err(TransportError::ServerNotRunning)
        ));
        Ok(())
    }
}
