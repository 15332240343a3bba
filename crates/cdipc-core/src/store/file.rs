//! A `MemoryStore` persisted to bincode files
//!
//! Each table lives in its own file and is rewritten whole after every
//! mutation through a temp file, fsync and rename. An exclusive lock on
//! `store.lock` keeps a second server off the same directory.

use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use super::{MemoryStore, RecordStore};
use crate::error::{StoreError, StoreResult};
use crate::wire::{CatalogEntry, TrackEntry};

const CATALOG_FILE: &str = "catalog.db";
const TRACKS_FILE: &str = "tracks.db";
const LOCK_FILE: &str = "store.lock";

#[derive(Debug, Clone, Copy)]
enum Table {
    Catalog,
    Tracks,
    Both,
}

pub struct FileStore {
    dir: PathBuf,
    tables: MemoryStore,
    /// Held for the lifetime of the store; dropping it releases the lock
    _lock: File,
}

impl FileStore {
    /// Open the database in `dir`, wiping it first when `new_database` is set
    pub fn open(dir: &Path, new_database: bool) -> StoreResult<Self> {
        fs::create_dir_all(dir)?;

        let lock_path = dir.join(LOCK_FILE);
        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)?;
        lock.try_lock_exclusive()
            .map_err(|_| StoreError::Locked(lock_path))?;

        let mut store = Self {
            dir: dir.to_path_buf(),
            tables: MemoryStore::new(),
            _lock: lock,
        };

        if new_database {
            store.persist(Table::Both)?;
        } else {
            store.load()?;
        }

        debug!(
            "Opened store at {} ({} catalog entries, {} tracks)",
            store.dir.display(),
            store.tables.catalog_count(),
            store.tables.track_count()
        );
        Ok(store)
    }

    fn load(&mut self) -> StoreResult<()> {
        let catalogs: Vec<CatalogEntry> = read_table(&self.dir.join(CATALOG_FILE))?;
        let tracks: Vec<TrackEntry> = read_table(&self.dir.join(TRACKS_FILE))?;

        for entry in catalogs {
            self.tables.put_catalog(entry)?;
        }
        for entry in tracks {
            self.tables.put_track(entry)?;
        }
        Ok(())
    }

    fn persist(&self, table: Table) -> StoreResult<()> {
        if matches!(table, Table::Catalog | Table::Both) {
            let rows: Vec<&CatalogEntry> = self.tables.catalogs().collect();
            write_table(&self.dir.join(CATALOG_FILE), &rows)?;
        }
        if matches!(table, Table::Tracks | Table::Both) {
            let rows: Vec<&TrackEntry> = self.tables.tracks().collect();
            write_table(&self.dir.join(TRACKS_FILE), &rows)?;
        }
        Ok(())
    }

    /// Apply `change` in memory, then on disk; undo it if the write fails
    fn commit(
        &mut self,
        table: Table,
        change: impl FnOnce(&mut MemoryStore) -> StoreResult<()>,
    ) -> StoreResult<()> {
        let before = self.tables.clone();
        change(&mut self.tables)?;
        if let Err(e) = self.persist(table) {
            self.tables = before;
            return Err(e);
        }
        Ok(())
    }
}

impl RecordStore for FileStore {
    fn get_catalog(&self, catalog: &str) -> Option<CatalogEntry> {
        self.tables.get_catalog(catalog)
    }

    fn get_track(&self, catalog: &str, track_no: i32) -> Option<TrackEntry> {
        self.tables.get_track(catalog, track_no)
    }

    fn put_catalog(&mut self, entry: CatalogEntry) -> StoreResult<()> {
        self.commit(Table::Catalog, |t| t.put_catalog(entry))
    }

    fn put_track(&mut self, entry: TrackEntry) -> StoreResult<()> {
        self.commit(Table::Tracks, |t| t.put_track(entry))
    }

    fn delete_catalog(&mut self, catalog: &str) -> StoreResult<()> {
        self.commit(Table::Catalog, |t| t.delete_catalog(catalog))
    }

    fn delete_track(&mut self, catalog: &str, track_no: i32) -> StoreResult<()> {
        self.commit(Table::Tracks, |t| t.delete_track(catalog, track_no))
    }

    fn find_catalog_next(&mut self, query: &str, first_call: bool) -> Option<CatalogEntry> {
        self.tables.find_catalog_next(query, first_call)
    }

    fn reset(&mut self) -> StoreResult<()> {
        self.commit(Table::Both, |t| t.reset())
    }
}

/// Read a table file; a missing file is an empty table
fn read_table<T: DeserializeOwned>(path: &Path) -> StoreResult<Vec<T>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    Ok(bincode::deserialize_from(BufReader::new(file))?)
}

fn write_table<T: Serialize>(path: &Path, rows: &[T]) -> StoreResult<()> {
    let temp_path = path.with_extension(format!("db.{}.tmp", std::process::id()));

    let file = File::create(&temp_path)?;
    let mut writer = BufWriter::new(file);
    bincode::serialize_into(&mut writer, rows)?;
    writer.flush()?;
    writer.get_ref().sync_all()?;
    drop(writer);

    if let Err(e) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(e.into());
    }
    Ok(())
}
