use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Global cdipc configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Transport selection
    pub transport: TransportConfig,

    /// Named pipe transport
    pub fifo: FifoConfig,

    /// System V message queue transport
    pub queue: QueueConfig,

    /// Record store
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Which IPC mechanism clients and server use
    pub kind: TransportKind,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    #[default]
    Fifo,
    Queue,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FifoConfig {
    /// Directory holding the server pipe and the per-client pipes
    pub dir: PathBuf,

    /// Attempts to find a reader on the server pipe before giving up
    pub connect_retries: u32,

    /// Delay between connect attempts (milliseconds)
    pub connect_retry_delay_ms: u64,

    /// Permission bits for created pipes
    pub mode: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Key of the queue carrying requests to the server
    pub server_key: i32,

    /// Key of the queue carrying replies to clients
    pub client_key: i32,

    /// Permission bits for created queues
    pub mode: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding the database files
    pub data_dir: PathBuf,
}

impl Default for FifoConfig {
    fn default() -> Self {
        Self {
            dir: std::env::temp_dir(),
            connect_retries: 5,
            connect_retry_delay_ms: 20,
            mode: 0o666,
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            server_key: 1234,
            client_key: 4321,
            mode: 0o666,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("~/.local/share"))
        .join("cdipc")
}

impl FifoConfig {
    /// The well-known pipe every client writes requests to
    pub fn server_pipe(&self) -> PathBuf {
        self.dir.join("server_pipe")
    }

    /// The pipe the server writes replies for `pid` to
    pub fn client_pipe(&self, pid: u32) -> PathBuf {
        self.dir.join(format!("cli_{}_fifo", pid))
    }
}

impl Config {
    /// Load config from default locations (in order of precedence):
    /// 1. $PWD/.cdipc.toml
    /// 2. $XDG_CONFIG_HOME/cdipc/config.toml
    /// 3. Built-in defaults
    pub fn load() -> Self {
        if let Ok(config) = Self::load_from(Path::new(".cdipc.toml")) {
            return config;
        }

        if let Some(config_dir) = dirs::config_dir() {
            let config_path = config_dir.join("cdipc").join("config.toml");
            match Self::load_from(&config_path) {
                Ok(config) => return config,
                Err(ConfigError::Parse(e)) => {
                    tracing::warn!("Ignoring {}: {}", config_path.display(), e);
                }
                Err(ConfigError::Io(_)) => {}
            }
        }

        Self::default()
    }

    /// Load config from a specific file
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config = toml::from_str(&content)?;
        Ok(config)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}
