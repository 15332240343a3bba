//! Request handling: one store call, one reply session

use cdipc_core::error::StoreResult;
use cdipc_core::{CatalogEntry, RecordStore, Request, ServerTransport, Status, TransportError, WireMessage};
use tracing::{debug, warn};

/// Answer one decoded request
pub(crate) fn dispatch<S, T>(store: &mut S, transport: &mut T, message: &WireMessage)
where
    S: RecordStore,
    T: ServerTransport,
{
    let origin = message.origin_id;
    let request = message.to_request();
    debug!("{:?} from {}", request.operation(), origin);

    if let Err(e) = transport.reply_begin(origin) {
        warn!("Cannot reach client {}, dropping {:?}: {}", origin, request.operation(), e);
        return;
    }

    let reply = match request {
        Request::FindCatalog { query } => {
            stream_search(store, transport, message, &query);
            transport.reply_end();
            return;
        }
        Request::CreateDatabase => conclude(message, store.reset()),
        Request::GetCatalog { catalog } => {
            let mut reply = message.reply(Status::Ok);
            reply.catalog = store.get_catalog(&catalog).unwrap_or_default();
            reply
        }
        Request::GetTrack { catalog, track_no } => {
            let mut reply = message.reply(Status::Ok);
            reply.track = store.get_track(&catalog, track_no).unwrap_or_default();
            reply
        }
        Request::AddCatalog(entry) => conclude(message, store.put_catalog(entry)),
        Request::AddTrack(entry) => conclude(message, store.put_track(entry)),
        Request::DeleteCatalog { catalog } => conclude(message, store.delete_catalog(&catalog)),
        Request::DeleteTrack { catalog, track_no } => {
            conclude(message, store.delete_track(&catalog, track_no))
        }
    };
    if let Err(e) = transport.reply_send(&reply) {
        warn!("Reply to {} failed: {}", origin, e);
    }

    transport.reply_end();
}

/// Answer a request whose origin is known but whose payload was unreadable
pub(crate) fn reject<T: ServerTransport>(transport: &mut T, origin_id: u32, reason: &str) {
    if let Err(e) = transport.reply_begin(origin_id) {
        warn!("Cannot reach client {}: {}", origin_id, e);
        return;
    }
    let reply = WireMessage::rejection(origin_id, &format!("command failed: {}", reason));
    if let Err(e) = transport.reply_send(&reply) {
        warn!("Reply to {} failed: {}", origin_id, e);
    }
    transport.reply_end();
}

/// Reply to a store mutation: the echoed request, or a failure with its cause
fn conclude(message: &WireMessage, result: StoreResult<()>) -> WireMessage {
    match result {
        Ok(()) => message.reply(Status::Ok),
        Err(e) => {
            debug!("{:?} from {} failed: {}", message.operation, message.origin_id, e);
            let mut failed = message.reply(Status::Failed);
            failed.set_diagnostic(&format!("command failed: {}", e));
            failed
        }
    }
}

/// Send every match as its own reply, then the end marker
fn stream_search<S, T>(store: &mut S, transport: &mut T, message: &WireMessage, query: &str)
where
    S: RecordStore,
    T: ServerTransport,
{
    let mut sent = 0usize;
    let mut first_call = true;

    while let Some(entry) = store.find_catalog_next(query, first_call) {
        first_call = false;
        let mut reply = message.reply(Status::Ok);
        reply.catalog = entry;
        if let Err(e) = transport.reply_send(&reply) {
            warn!(
                "Search stream to {} aborted after {} entries: {}",
                message.origin_id, sent, e
            );
            abort_stream(transport, message, &e);
            return;
        }
        sent += 1;
    }

    let mut end = message.reply(Status::NoMoreResults);
    end.catalog = CatalogEntry::default();
    if let Err(e) = transport.reply_send(&end) {
        warn!("End of search to {} failed: {}", message.origin_id, e);
        return;
    }
    debug!("Streamed {} matches for {:?} to {}", sent, query, message.origin_id);
}

fn abort_stream<T: ServerTransport>(transport: &mut T, message: &WireMessage, cause: &TransportError) {
    let mut failed = message.reply(Status::Failed);
    failed.catalog = CatalogEntry::default();
    failed.set_diagnostic(&format!("command failed: {}", cause));
    if let Err(e) = transport.reply_send(&failed) {
        debug!("Could not report aborted search to {}: {}", message.origin_id, e);
    }
}
