//! Catalog and track rows as carried in the wire payload slots

use serde::{Deserialize, Serialize};

use super::codec::{FrameReader, FrameWriter};
use crate::error::WireError;

/// Maximum catalog id length (bytes)
pub const CATALOG_LEN: usize = 30;
/// Maximum title length (bytes)
pub const TITLE_LEN: usize = 70;
/// Maximum type length (bytes)
pub const TYPE_LEN: usize = 30;
/// Maximum artist length (bytes)
pub const ARTIST_LEN: usize = 70;
/// Maximum track text length (bytes)
pub const TRACK_TEXT_LEN: usize = 70;

/// Encoded size of a catalog entry
pub const CATALOG_ENTRY_SIZE: usize = (CATALOG_LEN + 1) + (TITLE_LEN + 1) + (TYPE_LEN + 1) + (ARTIST_LEN + 1);
/// Encoded size of a track entry
pub const TRACK_ENTRY_SIZE: usize = (CATALOG_LEN + 1) + 4 + (TRACK_TEXT_LEN + 1);

/// One row of the catalog table, keyed by `catalog`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub catalog: String,
    pub title: String,
    /// The "type" column (CD, LP, ...)
    #[serde(rename = "type")]
    pub kind: String,
    pub artist: String,
}

impl CatalogEntry {
    pub fn new(
        catalog: impl Into<String>,
        title: impl Into<String>,
        kind: impl Into<String>,
        artist: impl Into<String>,
    ) -> Self {
        Self {
            catalog: catalog.into(),
            title: title.into(),
            kind: kind.into(),
            artist: artist.into(),
        }
    }

    /// An entry carrying only a key, as sent in lookups
    pub fn key(catalog: impl Into<String>) -> Self {
        Self {
            catalog: catalog.into(),
            ..Self::default()
        }
    }

    /// The empty entry stands for "no record"
    pub fn is_empty(&self) -> bool {
        self.catalog.is_empty()
    }

    pub fn to_bytes(&self) -> Result<[u8; CATALOG_ENTRY_SIZE], WireError> {
        let mut buf = [0u8; CATALOG_ENTRY_SIZE];
        self.write_to(&mut FrameWriter::new(&mut buf))?;
        Ok(buf)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, WireError> {
        if bytes.len() != CATALOG_ENTRY_SIZE {
            return Err(WireError::Length {
                expected: CATALOG_ENTRY_SIZE,
                actual: bytes.len(),
            });
        }
        Self::read_from(&mut FrameReader::new(bytes))
    }

    pub(crate) fn write_to(&self, w: &mut FrameWriter<'_>) -> Result<(), WireError> {
        w.put_text("catalog", &self.catalog, CATALOG_LEN + 1)?;
        w.put_text("title", &self.title, TITLE_LEN + 1)?;
        w.put_text("type", &self.kind, TYPE_LEN + 1)?;
        w.put_text("artist", &self.artist, ARTIST_LEN + 1)
    }

    pub(crate) fn read_from(r: &mut FrameReader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            catalog: r.text("catalog", CATALOG_LEN + 1)?,
            title: r.text("title", TITLE_LEN + 1)?,
            kind: r.text("type", TYPE_LEN + 1)?,
            artist: r.text("artist", ARTIST_LEN + 1)?,
        })
    }
}

/// One row of the track table, keyed by `(catalog, track_no)`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackEntry {
    pub catalog: String,
    pub track_no: i32,
    pub text: String,
}

impl TrackEntry {
    pub fn new(catalog: impl Into<String>, track_no: i32, text: impl Into<String>) -> Self {
        Self {
            catalog: catalog.into(),
            track_no,
            text: text.into(),
        }
    }

    pub fn key(catalog: impl Into<String>, track_no: i32) -> Self {
        Self {
            catalog: catalog.into(),
            track_no,
            text: String::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.catalog.is_empty()
    }

    pub(crate) fn write_to(&self, w: &mut FrameWriter<'_>) -> Result<(), WireError> {
        w.put_text("track catalog", &self.catalog, CATALOG_LEN + 1)?;
        w.put_i32(self.track_no);
        w.put_text("track text", &self.text, TRACK_TEXT_LEN + 1)
    }

    pub(crate) fn read_from(r: &mut FrameReader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            catalog: r.text("track catalog", CATALOG_LEN + 1)?,
            track_no: r.i32(),
            text: r.text("track text", TRACK_TEXT_LEN + 1)?,
        })
    }
}
