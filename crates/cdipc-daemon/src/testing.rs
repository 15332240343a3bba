use std::collections::VecDeque;

use cdipc_core::error::TransportResult;
use cdipc_core::{ServerTransport, TransportError, WireMessage};

/// Server transport that plays back requests and records replies
#[derive(Default)]
pub struct ScriptedServer {
    pub requests: VecDeque<TransportResult<WireMessage>>,
    pub replies: Vec<WireMessage>,
    pub sessions: Vec<u32>,
    pub sessions_ended: usize,
    /// Replies accepted before `reply_send` starts failing
    pub send_budget: Option<usize>,
    pub refuse_sessions: bool,
    pub closed: bool,
}

impl ScriptedServer {
    pub fn with_requests(requests: Vec<WireMessage>) -> Self {
        Self {
            requests: requests.into_iter().map(Ok).collect(),
            ..Self::default()
        }
    }
}

impl ServerTransport for ScriptedServer {
    type Config = ();

    fn open(_config: &()) -> TransportResult<Self> {
        Ok(Self::default())
    }

    fn receive(&mut self) -> TransportResult<WireMessage> {
        self.requests.pop_front().unwrap_or(Err(TransportError::Closed))
    }

    fn reply_begin(&mut self, origin_id: u32) -> TransportResult<()> {
        if self.refuse_sessions {
            return Err(TransportError::PeerClosed);
        }
        self.sessions.push(origin_id);
        Ok(())
    }

    fn reply_send(&mut self, message: &WireMessage) -> TransportResult<()> {
        if let Some(budget) = self.send_budget.as_mut() {
            if *budget == 0 {
                return Err(TransportError::PeerClosed);
            }
            *budget -= 1;
        }
        self.replies.push(message.clone());
        Ok(())
    }

    fn reply_end(&mut self) {
        self.sessions_ended += 1;
    }

    fn close(&mut self) {
        self.closed = true;
    }
}
