//! Wire message shared by every transport
//!
//! Frame layout (little-endian, no padding):
//! ```text
//! ┌────────────────────┐
//! │ magic: [u8; 4]     │  <- "CDIP"
//! │ version: u16       │  <- WIRE_VERSION
//! │ operation: u8      │  <- Operation tag
//! │ status: u8         │  <- Status tag (replies only)
//! │ origin_id: u32     │  <- requesting process id
//! │ catalog entry      │  <- CATALOG_ENTRY_SIZE bytes
//! │ track entry        │  <- TRACK_ENTRY_SIZE bytes
//! │ diagnostic         │  <- DIAGNOSTIC_LEN + 1 bytes
//! └────────────────────┘
//! ```
//!
//! Every frame is exactly `WIRE_SIZE` bytes. One read or one write moves one
//! frame, and `WIRE_SIZE` stays well under `PIPE_BUF` so pipe writes from
//! different clients never interleave.

mod codec;
mod record;

pub use record::{
    CatalogEntry, TrackEntry, ARTIST_LEN, CATALOG_ENTRY_SIZE, CATALOG_LEN, TITLE_LEN,
    TRACK_ENTRY_SIZE, TRACK_TEXT_LEN, TYPE_LEN,
};

use codec::{truncate_text, FrameReader, FrameWriter};

use crate::error::WireError;

/// Frame magic value
pub const MAGIC: [u8; 4] = *b"CDIP";

/// Wire format version; bump on any layout change
pub const WIRE_VERSION: u16 = 1;

/// Header size in bytes (magic + version + operation + status + origin)
pub const HEADER_SIZE: usize = 12;

/// Offset of the origin id within the header
const ORIGIN_OFFSET: usize = 8;

/// Maximum diagnostic text length (bytes)
pub const DIAGNOSTIC_LEN: usize = 80;

/// Total encoded frame size
pub const WIRE_SIZE: usize = HEADER_SIZE + CATALOG_ENTRY_SIZE + TRACK_ENTRY_SIZE + DIAGNOSTIC_LEN + 1;

/// Requested operation (closed set)
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    CreateDatabase = 0,
    GetCatalog = 1,
    GetTrack = 2,
    AddCatalog = 3,
    AddTrack = 4,
    DeleteCatalog = 5,
    DeleteTrack = 6,
    FindCatalog = 7,
}

impl TryFrom<u8> for Operation {
    type Error = WireError;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(Operation::CreateDatabase),
            1 => Ok(Operation::GetCatalog),
            2 => Ok(Operation::GetTrack),
            3 => Ok(Operation::AddCatalog),
            4 => Ok(Operation::AddTrack),
            5 => Ok(Operation::DeleteCatalog),
            6 => Ok(Operation::DeleteTrack),
            7 => Ok(Operation::FindCatalog),
            other => Err(WireError::UnknownOperation(other)),
        }
    }
}

/// Reply status
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok = 0,
    Failed = 1,
    NoMoreResults = 2,
}

impl TryFrom<u8> for Status {
    type Error = WireError;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(Status::Ok),
            1 => Ok(Status::Failed),
            2 => Ok(Status::NoMoreResults),
            other => Err(WireError::UnknownStatus(other)),
        }
    }
}

/// A request, as the server dispatches it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    CreateDatabase,
    GetCatalog { catalog: String },
    GetTrack { catalog: String, track_no: i32 },
    AddCatalog(CatalogEntry),
    AddTrack(TrackEntry),
    DeleteCatalog { catalog: String },
    DeleteTrack { catalog: String, track_no: i32 },
    FindCatalog { query: String },
}

impl Request {
    pub fn operation(&self) -> Operation {
        match self {
            Request::CreateDatabase => Operation::CreateDatabase,
            Request::GetCatalog { .. } => Operation::GetCatalog,
            Request::GetTrack { .. } => Operation::GetTrack,
            Request::AddCatalog(_) => Operation::AddCatalog,
            Request::AddTrack(_) => Operation::AddTrack,
            Request::DeleteCatalog { .. } => Operation::DeleteCatalog,
            Request::DeleteTrack { .. } => Operation::DeleteTrack,
            Request::FindCatalog { .. } => Operation::FindCatalog,
        }
    }
}

/// One fixed-size request or reply frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireMessage {
    pub origin_id: u32,
    pub operation: Operation,
    pub status: Status,
    pub catalog: CatalogEntry,
    pub track: TrackEntry,
    pub diagnostic: String,
}

impl WireMessage {
    /// Build the request frame for `request` sent by `origin_id`
    pub fn request(origin_id: u32, request: &Request) -> Self {
        let mut message = Self {
            origin_id,
            operation: request.operation(),
            status: Status::Ok,
            catalog: CatalogEntry::default(),
            track: TrackEntry::default(),
            diagnostic: String::new(),
        };

        match request {
            Request::CreateDatabase => {}
            Request::GetCatalog { catalog } | Request::DeleteCatalog { catalog } => {
                message.catalog = CatalogEntry::key(catalog.as_str());
            }
            Request::GetTrack { catalog, track_no } | Request::DeleteTrack { catalog, track_no } => {
                message.track = TrackEntry::key(catalog.as_str(), *track_no);
            }
            Request::AddCatalog(entry) => message.catalog = entry.clone(),
            Request::AddTrack(entry) => message.track = entry.clone(),
            // The search text travels in the catalog key slot
            Request::FindCatalog { query } => message.catalog = CatalogEntry::key(query.as_str()),
        }

        message
    }

    /// Interpret this frame as a request
    pub fn to_request(&self) -> Request {
        match self.operation {
            Operation::CreateDatabase => Request::CreateDatabase,
            Operation::GetCatalog => Request::GetCatalog {
                catalog: self.catalog.catalog.clone(),
            },
            Operation::GetTrack => Request::GetTrack {
                catalog: self.track.catalog.clone(),
                track_no: self.track.track_no,
            },
            Operation::AddCatalog => Request::AddCatalog(self.catalog.clone()),
            Operation::AddTrack => Request::AddTrack(self.track.clone()),
            Operation::DeleteCatalog => Request::DeleteCatalog {
                catalog: self.catalog.catalog.clone(),
            },
            Operation::DeleteTrack => Request::DeleteTrack {
                catalog: self.track.catalog.clone(),
                track_no: self.track.track_no,
            },
            Operation::FindCatalog => Request::FindCatalog {
                query: self.catalog.catalog.clone(),
            },
        }
    }

    /// Start a reply: a copy of this request with `status` and no diagnostic
    pub fn reply(&self, status: Status) -> Self {
        Self {
            status,
            diagnostic: String::new(),
            ..self.clone()
        }
    }

    /// A failure reply for a request whose payload could not be read
    pub fn rejection(origin_id: u32, diagnostic: &str) -> Self {
        let mut message = Self::request(origin_id, &Request::CreateDatabase);
        message.status = Status::Failed;
        message.set_diagnostic(diagnostic);
        message
    }

    /// Set the diagnostic text, cut to `DIAGNOSTIC_LEN` bytes
    pub fn set_diagnostic(&mut self, text: &str) {
        self.diagnostic = truncate_text(text, DIAGNOSTIC_LEN).replace('\0', " ");
    }

    pub fn encode(&self) -> Result<[u8; WIRE_SIZE], WireError> {
        let mut frame = [0u8; WIRE_SIZE];
        let mut w = FrameWriter::new(&mut frame);
        w.put_bytes(&MAGIC);
        w.put_u16(WIRE_VERSION);
        w.put_u8(self.operation as u8);
        w.put_u8(self.status as u8);
        w.put_u32(self.origin_id);
        self.catalog.write_to(&mut w)?;
        self.track.write_to(&mut w)?;
        w.put_text("diagnostic", &self.diagnostic, DIAGNOSTIC_LEN + 1)?;
        debug_assert_eq!(w.position(), WIRE_SIZE);
        Ok(frame)
    }

    pub fn decode(frame: &[u8]) -> Result<Self, WireError> {
        if frame.len() != WIRE_SIZE {
            return Err(WireError::Length {
                expected: WIRE_SIZE,
                actual: frame.len(),
            });
        }

        let mut r = FrameReader::new(frame);
        let magic = r.take(4);
        if magic != MAGIC {
            return Err(WireError::BadMagic([magic[0], magic[1], magic[2], magic[3]]));
        }
        let version = r.u16();
        if version != WIRE_VERSION {
            return Err(WireError::UnsupportedVersion(version));
        }
        let operation = Operation::try_from(r.u8())?;
        let status = Status::try_from(r.u8())?;
        let origin_id = r.u32();
        let catalog = CatalogEntry::read_from(&mut r)?;
        let track = TrackEntry::read_from(&mut r)?;
        let diagnostic = r.text("diagnostic", DIAGNOSTIC_LEN + 1)?;

        Ok(Self {
            origin_id,
            operation,
            status,
            catalog,
            track,
            diagnostic,
        })
    }
}

/// Overwrite the origin id of an encoded frame
pub fn stamp_origin(frame: &mut [u8; WIRE_SIZE], origin_id: u32) {
    frame[ORIGIN_OFFSET..ORIGIN_OFFSET + 4].copy_from_slice(&origin_id.to_le_bytes());
}

/// Read the origin id of a frame whose header is intact, even if the rest is not
pub fn peek_origin(frame: &[u8]) -> Option<u32> {
    if frame.len() < HEADER_SIZE || frame[..4] != MAGIC {
        return None;
    }
    let id = &frame[ORIGIN_OFFSET..ORIGIN_OFFSET + 4];
    Some(u32::from_le_bytes([id[0], id[1], id[2], id[3]]))
}
