use anyhow::Result;
use cdipc_core::{CatalogEntry, TrackEntry};
use serde_json::json;

use crate::OutputFormat;

/// Render catalog entries, one line each in text mode
pub fn catalogs(format: OutputFormat, entries: &[CatalogEntry]) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(entries
            .iter()
            .map(|e| format!("{}\t{}\t{}\t{}\n", e.catalog, e.title, e.kind, e.artist))
            .collect()),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(entries)? + "\n"),
    }
}

pub fn track(format: OutputFormat, entry: &TrackEntry) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(format!("{}\t{}\t{}\n", entry.catalog, entry.track_no, entry.text)),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(entry)? + "\n"),
    }
}

/// Confirmation for a command with nothing to show
pub fn done(format: OutputFormat, message: &str) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(format!("{}\n", message)),
        OutputFormat::Json => Ok(json!({ "status": "ok", "message": message }).to_string() + "\n"),
    }
}
