use std::collections::BTreeMap;
use std::ops::Bound;

use super::{validate_key, RecordStore};
use crate::error::{StoreError, StoreResult};
use crate::wire::{CatalogEntry, TrackEntry};

/// Where the current catalog scan stands
#[derive(Debug, Clone, Default, PartialEq, Eq)]
enum SearchPosition {
    #[default]
    Start,
    After(String),
    Done,
}

/// Both tables held in key order
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    catalogs: BTreeMap<String, CatalogEntry>,
    tracks: BTreeMap<(String, i32), TrackEntry>,
    search: SearchPosition,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn catalog_count(&self) -> usize {
        self.catalogs.len()
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    pub fn catalogs(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.catalogs.values()
    }

    pub fn tracks(&self) -> impl Iterator<Item = &TrackEntry> {
        self.tracks.values()
    }
}

impl RecordStore for MemoryStore {
    fn get_catalog(&self, catalog: &str) -> Option<CatalogEntry> {
        self.catalogs.get(catalog).cloned()
    }

    fn get_track(&self, catalog: &str, track_no: i32) -> Option<TrackEntry> {
        self.tracks.get(&(catalog.to_string(), track_no)).cloned()
    }

    fn put_catalog(&mut self, entry: CatalogEntry) -> StoreResult<()> {
        validate_key(&entry.catalog)?;
        self.catalogs.insert(entry.catalog.clone(), entry);
        Ok(())
    }

    fn put_track(&mut self, entry: TrackEntry) -> StoreResult<()> {
        validate_key(&entry.catalog)?;
        self.tracks.insert((entry.catalog.clone(), entry.track_no), entry);
        Ok(())
    }

    fn delete_catalog(&mut self, catalog: &str) -> StoreResult<()> {
        self.catalogs
            .remove(catalog)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(catalog.to_string()))
    }

    fn delete_track(&mut self, catalog: &str, track_no: i32) -> StoreResult<()> {
        self.tracks
            .remove(&(catalog.to_string(), track_no))
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(format!("{} track {}", catalog, track_no)))
    }

    fn find_catalog_next(&mut self, query: &str, first_call: bool) -> Option<CatalogEntry> {
        if first_call {
            self.search = SearchPosition::Start;
        }

        let matches = |entry: &&CatalogEntry| entry.catalog.contains(query);
        let found = match &self.search {
            SearchPosition::Start => self.catalogs.values().find(matches),
            SearchPosition::After(key) => self
                .catalogs
                .range::<str, _>((Bound::Excluded(key.as_str()), Bound::Unbounded))
                .map(|(_, entry)| entry)
                .find(matches),
            SearchPosition::Done => None,
        }
        .cloned();

        self.search = match &found {
            Some(entry) => SearchPosition::After(entry.catalog.clone()),
            None => SearchPosition::Done,
        };
        found
    }

    fn reset(&mut self) -> StoreResult<()> {
        self.catalogs.clear();
        self.tracks.clear();
        self.search = SearchPosition::Start;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(keys: &[&str]) -> MemoryStore {
        let mut store = MemoryStore::new();
        for key in keys {
            store
                .put_catalog(CatalogEntry::new(*key, "Title", "CD", "Artist"))
                .unwrap();
        }
        store
    }

    #[test]
    fn test_put_get_replace() -> StoreResult<()> {
        let mut store = MemoryStore::new();
        store.put_catalog(CatalogEntry::new("CAT1", "T", "CD", "ART"))?;
        assert_eq!(
            store.get_catalog("CAT1"),
            Some(CatalogEntry::new("CAT1", "T", "CD", "ART"))
        );

        store.put_catalog(CatalogEntry::new("CAT1", "T2", "LP", "ART"))?;
        assert_eq!(store.catalog_count(), 1);
        assert_eq!(store.get_catalog("CAT1").map(|e| e.title), Some("T2".to_string()));
        assert_eq!(store.get_catalog("CAT2"), None);
        Ok(())
    }

    #[test]
    fn test_tracks_keyed_by_number() -> StoreResult<()> {
        let mut store = MemoryStore::new();
        store.put_track(TrackEntry::new("CAT1", 1, "Intro"))?;
        store.put_track(TrackEntry::new("CAT1", 2, "Outro"))?;

        assert_eq!(store.get_track("CAT1", 2).map(|t| t.text), Some("Outro".to_string()));
        assert_eq!(store.get_track("CAT1", 3), None);

        store.delete_track("CAT1", 1)?;
        assert!(matches!(store.delete_track("CAT1", 1), Err(StoreError::NotFound(_))));
        assert_eq!(store.track_count(), 1);
        Ok(())
    }

    #[test]
    fn test_delete_absent_fails_every_time() {
        let mut store = MemoryStore::new();
        assert!(matches!(store.delete_catalog("nope"), Err(StoreError::NotFound(_))));
        assert!(matches!(store.delete_catalog("nope"), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_rejects_bad_keys() {
        let mut store = MemoryStore::new();
        assert!(matches!(
            store.put_catalog(CatalogEntry::default()),
            Err(StoreError::EmptyKey)
        ));
        assert!(matches!(
            store.put_track(TrackEntry::new("x".repeat(40), 1, "t")),
            Err(StoreError::KeyTooLong { .. })
        ));
    }

    #[test]
    fn test_find_in_key_order() {
        let mut store = store_with(&["CAT3", "XYZ", "CAT1", "CAT2"]);

        assert_eq!(store.find_catalog_next("CAT", true).unwrap().catalog, "CAT1");
        assert_eq!(store.find_catalog_next("CAT", false).unwrap().catalog, "CAT2");
        assert_eq!(store.find_catalog_next("CAT", false).unwrap().catalog, "CAT3");
        assert_eq!(store.find_catalog_next("CAT", false), None);
        assert_eq!(store.find_catalog_next("CAT", false), None);

        // Restarting begins from the first key again
        assert_eq!(store.find_catalog_next("CAT", true).unwrap().catalog, "CAT1");
    }

    #[test]
    fn test_find_substring_and_empty_query() {
        let mut store = store_with(&["ABC100", "XBC200", "ZZZ"]);
        assert_eq!(store.find_catalog_next("BC", true).unwrap().catalog, "ABC100");
        assert_eq!(store.find_catalog_next("BC", false).unwrap().catalog, "XBC200");
        assert_eq!(store.find_catalog_next("BC", false), None);

        let mut all = Vec::new();
        let mut first = true;
        while let Some(entry) = store.find_catalog_next("", first) {
            all.push(entry.catalog);
            first = false;
        }
        assert_eq!(all, vec!["ABC100", "XBC200", "ZZZ"]);
    }

    #[test]
    fn test_find_survives_deleting_current_key() -> StoreResult<()> {
        let mut store = store_with(&["A1", "A2", "A3"]);
        assert_eq!(store.find_catalog_next("A", true).unwrap().catalog, "A1");
        store.delete_catalog("A1")?;
        store.delete_catalog("A2")?;
        assert_eq!(store.find_catalog_next("A", false).unwrap().catalog, "A3");
        Ok(())
    }

    #[test]
    fn test_reset_clears_everything() -> StoreResult<()> {
        let mut store = store_with(&["A", "B"]);
        store.put_track(TrackEntry::new("A", 1, "t"))?;
        store.reset()?;
        assert_eq!(store.catalog_count(), 0);
        assert_eq!(store.track_count(), 0);
        assert_eq!(store.find_catalog_next("", false), None);
        Ok(())
    }
}
