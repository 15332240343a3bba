use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};

use crate::error::{ClientError, ClientResult};
use crate::wire::{CatalogEntry, CATALOG_ENTRY_SIZE};

/// Search results received in one burst, replayed one entry at a time
///
/// Entries sit in an anonymous temp file in their wire encoding. The file is
/// released as soon as the last entry has been read.
#[derive(Debug)]
pub struct SearchCursor {
    spool: Option<BufReader<File>>,
    remaining: usize,
    truncated: Option<String>,
}

impl SearchCursor {
    /// A cursor with nothing in it
    pub fn empty() -> Self {
        Self {
            spool: None,
            remaining: 0,
            truncated: None,
        }
    }

    /// The server's diagnostic when it failed partway through the search.
    /// The entries received before the failure are still replayed.
    pub fn truncated(&self) -> Option<&str> {
        self.truncated.as_deref()
    }

    /// Entries not yet returned
    pub fn remaining(&self) -> usize {
        self.remaining
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }

    /// Pop the next entry, or `None` once the cursor is drained
    pub fn next_entry(&mut self) -> ClientResult<Option<CatalogEntry>> {
        if self.remaining == 0 {
            self.spool = None;
            return Ok(None);
        }
        let Some(spool) = self.spool.as_mut() else {
            self.remaining = 0;
            return Ok(None);
        };

        let mut buf = [0u8; CATALOG_ENTRY_SIZE];
        if let Err(e) = spool.read_exact(&mut buf) {
            self.release();
            return Err(e.into());
        }

        self.remaining -= 1;
        if self.remaining == 0 {
            self.spool = None;
        }
        Ok(Some(CatalogEntry::from_bytes(&buf)?))
    }

    fn release(&mut self) {
        self.spool = None;
        self.remaining = 0;
    }
}

impl Iterator for SearchCursor {
    type Item = ClientResult<CatalogEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_entry().transpose()
    }
}

/// Collects a reply burst into a temp file
///
/// A write failure is remembered rather than returned so the caller can keep
/// draining replies up to the end of the burst.
#[derive(Default)]
pub(crate) struct Spool {
    writer: Option<BufWriter<File>>,
    count: usize,
    failure: Option<ClientError>,
}

impl Spool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: &CatalogEntry) {
        if self.failure.is_some() {
            return;
        }
        if let Err(e) = self.write(entry) {
            self.failure = Some(e);
            self.writer = None;
        }
    }

    fn write(&mut self, entry: &CatalogEntry) -> ClientResult<()> {
        let bytes = entry.to_bytes()?;
        if self.writer.is_none() {
            self.writer = Some(BufWriter::new(tempfile::tempfile()?));
        }
        if let Some(writer) = self.writer.as_mut() {
            writer.write_all(&bytes)?;
        }
        self.count += 1;
        Ok(())
    }

    /// Rewind the spool into a cursor, or report the first write failure.
    ///
    /// `truncated` carries the server's diagnostic when the burst ended in a
    /// failure instead of `NoMoreResults`.
    pub fn finish(self, truncated: Option<String>) -> ClientResult<SearchCursor> {
        if let Some(failure) = self.failure {
            return Err(failure);
        }
        let Some(writer) = self.writer else {
            return Ok(SearchCursor {
                truncated,
                ..SearchCursor::empty()
            });
        };

        let mut file = writer.into_inner().map_err(|e| e.into_error())?;
        file.seek(SeekFrom::Start(0))?;
        Ok(SearchCursor {
            spool: Some(BufReader::new(file)),
            remaining: self.count,
            truncated,
        })
    }
}
