//! cdipc-core - Core library for the cdipc record server
//!
//! This crate provides everything both ends of the connection share:
//! - The fixed-size wire message and its codec
//! - Named pipe and System V message queue transports
//! - The record store interface with in-memory and file-backed stores
//! - The client proxy with search cursor emulation
//! - Configuration management

pub mod client;
pub mod config;
pub mod error;
pub mod store;
pub mod transport;
pub mod wire;

pub use client::{RecordClient, SearchCursor};
pub use config::{Config, TransportKind};
pub use error::{ClientError, StoreError, TransportError, WireError};
pub use store::{FileStore, MemoryStore, RecordStore};
pub use transport::{ClientTransport, FifoClient, FifoServer, ServerTransport};
#[cfg(target_os = "linux")]
pub use transport::{QueueClient, QueueServer};
pub use wire::{CatalogEntry, Operation, Request, Status, TrackEntry, WireMessage};
