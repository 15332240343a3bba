//! Record storage behind the server

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::error::{StoreError, StoreResult};
use crate::wire::{CatalogEntry, TrackEntry, CATALOG_LEN};

/// The record database the server dispatches into
pub trait RecordStore {
    /// Look up a catalog entry by key
    fn get_catalog(&self, catalog: &str) -> Option<CatalogEntry>;

    /// Look up a track by `(catalog, track_no)`
    fn get_track(&self, catalog: &str, track_no: i32) -> Option<TrackEntry>;

    /// Insert or replace a catalog entry
    fn put_catalog(&mut self, entry: CatalogEntry) -> StoreResult<()>;

    /// Insert or replace a track
    fn put_track(&mut self, entry: TrackEntry) -> StoreResult<()>;

    /// Remove a catalog entry; an absent key is an error
    fn delete_catalog(&mut self, catalog: &str) -> StoreResult<()>;

    /// Remove a track; an absent key is an error
    fn delete_track(&mut self, catalog: &str, track_no: i32) -> StoreResult<()>;

    /// Next catalog entry whose key contains `query`, in key order.
    ///
    /// `first_call` restarts the scan. Once the scan has run out it keeps
    /// returning `None` until restarted.
    fn find_catalog_next(&mut self, query: &str, first_call: bool) -> Option<CatalogEntry>;

    /// Drop every record
    fn reset(&mut self) -> StoreResult<()>;
}

/// Check a catalog key before it is stored
pub(crate) fn validate_key(catalog: &str) -> StoreResult<()> {
    if catalog.is_empty() {
        return Err(StoreError::EmptyKey);
    }
    if catalog.len() > CATALOG_LEN {
        return Err(StoreError::KeyTooLong {
            len: catalog.len(),
            max: CATALOG_LEN,
        });
    }
    Ok(())
}
