use anyhow::{Context, Result};
use cdipc_core::{CatalogEntry, Config, TrackEntry, TransportKind};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::client::Action;

#[derive(Parser)]
#[command(name = "cdipc")]
#[command(about = "CD catalog record server and client over local IPC", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: ./.cdipc.toml, then the user config dir)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// IPC transport to use
    #[arg(short, long, global = true)]
    pub transport: Option<TransportArg>,

    /// Directory holding the named pipes
    #[arg(long, global = true)]
    pub fifo_dir: Option<PathBuf>,

    /// Output format: text, json
    #[arg(short, long, default_value = "text", global = true)]
    pub format: OutputFormat,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the record server
    Serve {
        /// Start from an empty database
        #[arg(long)]
        init: bool,

        /// Directory holding the database files
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },

    /// Wipe the server's database
    InitDb,

    /// Add or replace a catalog entry
    Add {
        catalog: String,
        title: String,
        #[arg(value_name = "TYPE")]
        kind: String,
        artist: String,
    },

    /// Show a catalog entry
    Get { catalog: String },

    /// Delete a catalog entry
    Delete { catalog: String },

    /// Add or replace a track
    AddTrack {
        catalog: String,
        #[arg(value_name = "N")]
        track_no: i32,
        text: String,
    },

    /// Show a track
    GetTrack {
        catalog: String,
        #[arg(value_name = "N")]
        track_no: i32,
    },

    /// Delete a track
    DeleteTrack {
        catalog: String,
        #[arg(value_name = "N")]
        track_no: i32,
    },

    /// List catalog entries whose key contains QUERY (all when omitted)
    Search {
        #[arg(default_value = "")]
        query: String,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum TransportArg {
    /// Named pipes
    Fifo,
    /// System V message queues
    Queue,
}

impl From<TransportArg> for TransportKind {
    fn from(arg: TransportArg) -> Self {
        match arg {
            TransportArg::Fifo => TransportKind::Fifo,
            TransportArg::Queue => TransportKind::Queue,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// One tab-separated line per record (default)
    Text,
    /// JSON output
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let default_level = match cli.command {
        Commands::Serve { .. } => "info",
        _ => "warn",
    };
    let filter = if std::env::var("CDIPC_DEBUG").is_ok() {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut config = load_config(&cli)?;

    match cli.command {
        Commands::Serve { init, data_dir } => {
            if let Some(dir) = data_dir {
                config.store.data_dir = dir;
            }
            commands::serve::run(&config, init)?;
        }
        Commands::InitDb => commands::client::run(&config, Action::InitDb, cli.format)?,
        Commands::Add { catalog, title, kind, artist } => {
            let entry = CatalogEntry::new(catalog, title, kind, artist);
            commands::client::run(&config, Action::Add(entry), cli.format)?;
        }
        Commands::Get { catalog } => commands::client::run(&config, Action::Get(catalog), cli.format)?,
        Commands::Delete { catalog } => {
            commands::client::run(&config, Action::Delete(catalog), cli.format)?;
        }
        Commands::AddTrack { catalog, track_no, text } => {
            let entry = TrackEntry::new(catalog, track_no, text);
            commands::client::run(&config, Action::AddTrack(entry), cli.format)?;
        }
        Commands::GetTrack { catalog, track_no } => {
            commands::client::run(&config, Action::GetTrack(catalog, track_no), cli.format)?;
        }
        Commands::DeleteTrack { catalog, track_no } => {
            commands::client::run(&config, Action::DeleteTrack(catalog, track_no), cli.format)?;
        }
        Commands::Search { query } => commands::client::run(&config, Action::Search(query), cli.format)?,
    }

    Ok(())
}

/// Load the config file, then apply command-line overrides
fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::load(),
    };

    if let Some(transport) = cli.transport {
        config.transport.kind = transport.into();
    }
    if let Some(dir) = &cli.fifo_dir {
        config.fifo.dir = dir.clone();
    }
    Ok(config)
}
