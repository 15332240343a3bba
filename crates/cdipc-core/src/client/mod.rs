//! Client-side proxy for the record store
//!
//! Every store call becomes one request over a `ClientTransport`. Point
//! operations read exactly one reply. A search reads the whole reply burst up
//! to `NoMoreResults` and hands back a `SearchCursor` over the spooled entries.
//! A `Failed` reply ends the burst early; what arrived before it is kept.

mod cursor;

pub use cursor::SearchCursor;

use cursor::Spool;
use tracing::{debug, warn};

use crate::error::{ClientError, ClientResult};
use crate::transport::ClientTransport;
use crate::wire::{CatalogEntry, Request, Status, TrackEntry, WireMessage};

pub struct RecordClient<T: ClientTransport> {
    transport: T,
    /// Cursor behind `find_catalog`
    active_search: Option<SearchCursor>,
}

impl<T: ClientTransport> RecordClient<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            active_search: None,
        }
    }

    /// Connect a transport and wrap it
    pub fn connect(config: &T::Config) -> ClientResult<Self> {
        Ok(Self::new(T::open(config)?))
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Drop any held cursor and release the transport
    pub fn close(&mut self) {
        self.active_search = None;
        self.transport.close();
    }

    pub fn create_database(&mut self) -> ClientResult<()> {
        self.exchange(Request::CreateDatabase).map(|_| ())
    }

    /// Fetch a catalog entry; `None` when the server has no such key
    pub fn get_catalog(&mut self, catalog: &str) -> ClientResult<Option<CatalogEntry>> {
        let reply = self.exchange(Request::GetCatalog {
            catalog: catalog.to_string(),
        })?;
        Ok(Some(reply.catalog).filter(|entry| !entry.is_empty()))
    }

    pub fn get_track(&mut self, catalog: &str, track_no: i32) -> ClientResult<Option<TrackEntry>> {
        let reply = self.exchange(Request::GetTrack {
            catalog: catalog.to_string(),
            track_no,
        })?;
        Ok(Some(reply.track).filter(|entry| !entry.is_empty()))
    }

    pub fn add_catalog(&mut self, entry: &CatalogEntry) -> ClientResult<()> {
        self.exchange(Request::AddCatalog(entry.clone())).map(|_| ())
    }

    pub fn add_track(&mut self, entry: &TrackEntry) -> ClientResult<()> {
        self.exchange(Request::AddTrack(entry.clone())).map(|_| ())
    }

    pub fn delete_catalog(&mut self, catalog: &str) -> ClientResult<()> {
        self.exchange(Request::DeleteCatalog {
            catalog: catalog.to_string(),
        })
        .map(|_| ())
    }

    pub fn delete_track(&mut self, catalog: &str, track_no: i32) -> ClientResult<()> {
        self.exchange(Request::DeleteTrack {
            catalog: catalog.to_string(),
            track_no,
        })
        .map(|_| ())
    }

    /// Run a catalog search and return a cursor over every match
    pub fn search(&mut self, query: &str) -> ClientResult<SearchCursor> {
        let request = WireMessage::request(
            self.transport.origin_id(),
            &Request::FindCatalog {
                query: query.to_string(),
            },
        );
        self.transport.send(&request)?;
        if let Err(e) = self.transport.reply_begin() {
            self.transport.reply_end();
            return Err(e.into());
        }

        let mut spool = Spool::new();
        let mut truncated = None;
        let outcome = loop {
            let reply = match self.transport.reply_receive() {
                Ok(reply) => reply,
                Err(e) => break Err(ClientError::from(e)),
            };
            if reply.operation != request.operation {
                break Err(unexpected(&request, &reply));
            }
            match reply.status {
                Status::Ok => spool.push(&reply.catalog),
                Status::NoMoreResults => break Ok(()),
                Status::Failed => {
                    truncated = Some(reply.diagnostic);
                    break Ok(());
                }
            }
        };
        self.transport.reply_end();

        outcome?;
        let cursor = spool.finish(truncated)?;
        match cursor.truncated() {
            Some(diagnostic) => warn!(
                "Search for {:?} cut short after {} entries: {}",
                query,
                cursor.remaining(),
                diagnostic
            ),
            None => debug!("Search for {:?} matched {} entries", query, cursor.remaining()),
        }
        Ok(cursor)
    }

    /// Step through a search one entry per call.
    ///
    /// `new_search` drops any earlier cursor and runs `query` afresh. Without
    /// it the next spooled entry is returned, and once the results run out
    /// the call answers `None` without touching the transport.
    pub fn find_catalog(&mut self, query: &str, new_search: bool) -> ClientResult<Option<CatalogEntry>> {
        if new_search {
            self.active_search = None;
            self.active_search = Some(self.search(query)?);
        }

        let Some(cursor) = self.active_search.as_mut() else {
            return Ok(None);
        };
        let next = cursor.next_entry();
        if cursor.is_exhausted() || !matches!(next, Ok(Some(_))) {
            self.active_search = None;
        }
        next
    }

    /// Send one request and read its single reply
    fn exchange(&mut self, request: Request) -> ClientResult<WireMessage> {
        let message = WireMessage::request(self.transport.origin_id(), &request);
        self.transport.send(&message)?;

        let reply = self
            .transport
            .reply_begin()
            .and_then(|()| self.transport.reply_receive());
        self.transport.reply_end();
        let reply = reply?;

        if reply.operation != message.operation {
            return Err(unexpected(&message, &reply));
        }
        match reply.status {
            Status::Ok => Ok(reply),
            Status::Failed => Err(ClientError::Rejected(reply.diagnostic)),
            Status::NoMoreResults => Err(ClientError::UnexpectedReply(format!(
                "end of results in reply to {:?}",
                message.operation
            ))),
        }
    }
}

fn unexpected(request: &WireMessage, reply: &WireMessage) -> ClientError {
    ClientError::UnexpectedReply(format!(
        "{:?} reply to a {:?} request",
        reply.operation, request.operation
    ))
}
