use std::path::Path;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use cdipc_core::config::FifoConfig;
use cdipc_core::error::TransportResult;
use cdipc_core::{
    CatalogEntry, ClientError, ClientTransport, FifoClient, FifoServer, MemoryStore, Operation,
    RecordClient, RecordStore, Request, ServerTransport, Status, TrackEntry, WireMessage,
};
use cdipc_daemon::{Result, Server};
use tempfile::tempdir;

fn config(dir: &Path) -> FifoConfig {
    FifoConfig {
        dir: dir.to_path_buf(),
        connect_retries: 100,
        ..FifoConfig::default()
    }
}

/// Serve exactly `requests` requests on a background thread
fn serve<T>(mut server: Server<MemoryStore, T>, requests: usize) -> JoinHandle<Result<Server<MemoryStore, T>>>
where
    T: ServerTransport + Send + 'static,
{
    thread::spawn(move || {
        for _ in 0..requests {
            server.handle_next()?;
        }
        Ok(server)
    })
}

#[test]
fn test_add_get_delete_over_fifo() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let config = config(dir.path());
    let server = Server::new(MemoryStore::new(), FifoServer::open(&config)?);
    let handle = serve(server, 7);

    let mut client = RecordClient::new(FifoClient::open_as(&config, 1001)?);
    let entry = CatalogEntry::new("CAT1", "T", "CD", "ART");

    client.add_catalog(&entry)?;
    assert_eq!(client.get_catalog("CAT1")?, Some(entry));

    client.add_track(&TrackEntry::new("CAT1", 1, "Opening"))?;
    assert_eq!(
        client.get_track("CAT1", 1)?.map(|t| t.text),
        Some("Opening".to_string())
    );

    client.delete_catalog("CAT1")?;
    for _ in 0..2 {
        assert!(matches!(
            client.delete_catalog("CAT1"),
            Err(ClientError::Rejected(_))
        ));
    }
    client.close();

    let server = handle.join().unwrap()?;
    assert_eq!(server.handled(), 7);
    assert_eq!(server.store().get_catalog("CAT1"), None);
    Ok(())
}

#[test]
fn test_sequential_requests_answered_in_order() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let config = config(dir.path());
    let mut store = MemoryStore::new();
    for n in 0..10 {
        store.put_catalog(CatalogEntry::new(format!("CAT{}", n), format!("Title {}", n), "CD", "ART"))?;
    }
    let handle = serve(Server::new(store, FifoServer::open(&config)?), 10);

    let mut client = RecordClient::new(FifoClient::open_as(&config, 1002)?);
    for n in 0..10 {
        let entry = client.get_catalog(&format!("CAT{}", n))?;
        assert_eq!(entry.map(|e| e.title), Some(format!("Title {}", n)));
    }
    client.close();
    handle.join().unwrap()?;
    Ok(())
}

#[test]
fn test_server_waits_for_next_client() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let config = config(dir.path());
    let handle = serve(Server::new(MemoryStore::new(), FifoServer::open(&config)?), 2);

    {
        let mut first = RecordClient::new(FifoClient::open_as(&config, 1003)?);
        first.add_catalog(&CatalogEntry::new("CAT9", "T", "CD", "ART"))?;
        first.close();
    }

    // The server saw every writer leave in between and must not have
    // produced an empty request from it
    let mut second = RecordClient::new(FifoClient::open_as(&config, 1004)?);
    assert_eq!(
        second.get_catalog("CAT9")?.map(|e| e.catalog),
        Some("CAT9".to_string())
    );
    second.close();

    let server = handle.join().unwrap()?;
    assert_eq!(server.handled(), 2);
    Ok(())
}

#[test]
fn test_search_cursor_over_fifo() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let config = config(dir.path());
    let mut store = MemoryStore::new();
    for key in ["CAT3", "CAT1", "XYZ", "CAT2"] {
        store.put_catalog(CatalogEntry::new(key, "T", "CD", "ART"))?;
    }
    let handle = serve(Server::new(store, FifoServer::open(&config)?), 2);

    let mut client = RecordClient::new(FifoClient::open_as(&config, 1005)?);
    let mut found = Vec::new();
    let mut new_search = true;
    while let Some(entry) = client.find_catalog("CAT", new_search)? {
        found.push(entry.catalog);
        new_search = false;
    }
    assert_eq!(found, vec!["CAT1", "CAT2", "CAT3"]);
    assert_eq!(client.find_catalog("CAT", false)?, None);

    let cursor = client.search("NOTHING")?;
    assert!(cursor.is_exhausted());
    client.close();

    let server = handle.join().unwrap()?;
    assert_eq!(server.handled(), 2);
    Ok(())
}

/// Reply log shared between a wrapped transport and the test
type ReplyLog = Arc<Mutex<Vec<(u32, Operation, Status)>>>;

/// Records every reply the inner transport sends
struct Recording<T> {
    inner: T,
    log: ReplyLog,
}

impl<T: ServerTransport> ServerTransport for Recording<T> {
    type Config = T::Config;

    fn open(config: &T::Config) -> TransportResult<Self> {
        Ok(Self {
            inner: T::open(config)?,
            log: ReplyLog::default(),
        })
    }

    fn receive(&mut self) -> TransportResult<WireMessage> {
        self.inner.receive()
    }

    fn reply_begin(&mut self, origin_id: u32) -> TransportResult<()> {
        self.inner.reply_begin(origin_id)
    }

    fn reply_send(&mut self, message: &WireMessage) -> TransportResult<()> {
        self.inner.reply_send(message)?;
        self.log
            .lock()
            .unwrap()
            .push((message.origin_id, message.operation, message.status));
        Ok(())
    }

    fn reply_end(&mut self) {
        self.inner.reply_end()
    }

    fn close(&mut self) {
        self.inner.close()
    }
}

#[test]
fn test_request_during_search_waits_for_stream() -> std::result::Result<(), Box<dyn std::error::Error>> {
    const ENTRIES: usize = 300;
    const SEARCHER: u32 = 2001;
    const OTHER: u32 = 2002;

    let dir = tempdir()?;
    let config = config(dir.path());
    let mut store = MemoryStore::new();
    for n in 0..ENTRIES {
        store.put_catalog(CatalogEntry::new(format!("CAT{:04}", n), "T", "CD", "ART"))?;
    }
    let transport = Recording::<FifoServer>::open(&config)?;
    let log = Arc::clone(&transport.log);
    let handle = serve(Server::new(store, transport), 2);

    let mut searcher = FifoClient::open_as(&config, SEARCHER)?;
    let mut other = FifoClient::open_as(&config, OTHER)?;
    searcher.reply_begin()?;
    other.reply_begin()?;

    searcher.send(&WireMessage::request(0, &Request::FindCatalog { query: "CAT".into() }))?;
    // The burst is larger than a pipe buffer, so the server is still
    // streaming when this request lands
    other.send(&WireMessage::request(0, &Request::GetCatalog { catalog: "CAT0007".into() }))?;

    let mut streamed = 0;
    loop {
        let reply = searcher.reply_receive()?;
        assert_eq!(reply.origin_id, SEARCHER);
        assert_eq!(reply.operation, Operation::FindCatalog);
        match reply.status {
            Status::Ok => streamed += 1,
            Status::NoMoreResults => break,
            Status::Failed => panic!("search failed: {}", reply.diagnostic),
        }
    }
    assert_eq!(streamed, ENTRIES);

    let reply = other.reply_receive()?;
    assert_eq!(reply.origin_id, OTHER);
    assert_eq!(reply.catalog.catalog, "CAT0007");

    searcher.close();
    other.close();
    handle.join().unwrap()?;

    let log = log.lock().unwrap();
    assert_eq!(log.len(), ENTRIES + 2);
    assert!(log[..=ENTRIES].iter().all(|(origin, _, _)| *origin == SEARCHER));
    assert_eq!(log[ENTRIES].2, Status::NoMoreResults);
    assert_eq!(log[ENTRIES + 1], (OTHER, Operation::GetCatalog, Status::Ok));
    Ok(())
}

#[test]
fn test_run_until_removes_server_pipe() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let config = config(dir.path());
    let mut server = Server::new(MemoryStore::new(), FifoServer::open(&config)?);

    let handle = thread::spawn(move || {
        // Stop at the third check, after two requests
        let mut checks = 0;
        let result = server.run_until(|| {
            checks += 1;
            checks > 2
        });
        (result, server)
    });

    let mut client = RecordClient::new(FifoClient::open_as(&config, 1006)?);
    client.create_database()?;
    client.create_database()?;
    client.close();

    let (result, server) = handle.join().unwrap();
    result?;
    assert_eq!(server.handled(), 2);
    assert!(!config.server_pipe().exists());
    Ok(())
}
