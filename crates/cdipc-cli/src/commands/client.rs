use anyhow::{bail, Context, Result};
use cdipc_core::error::ClientResult;
use cdipc_core::{CatalogEntry, ClientTransport, Config, RecordClient, TrackEntry, TransportKind};

use crate::output;
use crate::OutputFormat;

/// One proxy call, as chosen on the command line
pub enum Action {
    InitDb,
    Add(CatalogEntry),
    Get(String),
    Delete(String),
    AddTrack(TrackEntry),
    GetTrack(String, i32),
    DeleteTrack(String, i32),
    Search(String),
}

pub fn run(config: &Config, action: Action, format: OutputFormat) -> Result<()> {
    match config.transport.kind {
        TransportKind::Fifo => {
            let client = RecordClient::<cdipc_core::FifoClient>::connect(&config.fifo)
                .context("Could not connect to server")?;
            execute(client, action, format)
        }
        TransportKind::Queue => run_queue(config, action, format),
    }
}

#[cfg(target_os = "linux")]
fn run_queue(config: &Config, action: Action, format: OutputFormat) -> Result<()> {
    let client = RecordClient::<cdipc_core::QueueClient>::connect(&config.queue)
        .context("Could not connect to server")?;
    execute(client, action, format)
}

#[cfg(not(target_os = "linux"))]
fn run_queue(_config: &Config, _action: Action, _format: OutputFormat) -> Result<()> {
    bail!("The message queue transport is only available on Linux")
}

fn execute<T: ClientTransport>(mut client: RecordClient<T>, action: Action, format: OutputFormat) -> Result<()> {
    let result = perform(&mut client, action, format);
    client.close();
    result
}

fn perform<T: ClientTransport>(client: &mut RecordClient<T>, action: Action, format: OutputFormat) -> Result<()> {
    let text = match action {
        Action::InitDb => {
            client.create_database().context("Failed to create database")?;
            output::done(format, "database created")?
        }
        Action::Add(entry) => {
            client.add_catalog(&entry).context("Failed to add catalog entry")?;
            output::done(format, "catalog entry added")?
        }
        Action::Get(catalog) => match client.get_catalog(&catalog).context("Lookup failed")? {
            Some(entry) => output::catalogs(format, &[entry])?,
            None => bail!("No catalog entry {}", catalog),
        },
        Action::Delete(catalog) => {
            client
                .delete_catalog(&catalog)
                .with_context(|| format!("Failed to delete {}", catalog))?;
            output::done(format, "catalog entry deleted")?
        }
        Action::AddTrack(entry) => {
            client.add_track(&entry).context("Failed to add track")?;
            output::done(format, "track added")?
        }
        Action::GetTrack(catalog, track_no) => {
            match client.get_track(&catalog, track_no).context("Lookup failed")? {
                Some(entry) => output::track(format, &entry)?,
                None => bail!("No track {} on {}", track_no, catalog),
            }
        }
        Action::DeleteTrack(catalog, track_no) => {
            client
                .delete_track(&catalog, track_no)
                .with_context(|| format!("Failed to delete track {} on {}", track_no, catalog))?;
            output::done(format, "track deleted")?
        }
        Action::Search(query) => {
            let entries = client
                .search(&query)
                .context("Search failed")?
                .collect::<ClientResult<Vec<_>>>()
                .context("Search failed")?;
            output::catalogs(format, &entries)?
        }
    };

    print!("{}", text);
    Ok(())
}
