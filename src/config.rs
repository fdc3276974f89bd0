use serde::Deserialize;
use std::fs;

#[derive(Clone, Debug, Deserialize, Default)]
pub struct MasterConfig {
    pub bind_addr: String,    // Address the coordinator's HTTP server binds to
    pub snapshot_path: String, // Where the directory JSON snapshot is written
    pub log_path: String,
    pub cron_interval: u64, // Interval between failure-detector ticks, in seconds
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct ChunkServerConfig {
    pub bind_addr: String, // Address this storage node's HTTP server binds to
    pub data_path: String,
    pub master_addr: String, // Coordinator base URL, e.g. "http://127.0.0.1:8000"
    pub log_path: String,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct ClientConfig {
    pub master_addr: String,
    pub log_path: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CommonConfig {
    pub heartbeat_interval: u64,   // Heartbeat interval in seconds
    pub heartbeat_timeout: u64,    // Seconds without a heartbeat before a node is marked failed
    pub chunk_size: u64,           // Chunk size in bytes
    pub replication_factor: usize, // Target number of chunk replicas
    pub log_level: String,         // Log level (e.g., "debug", "info", etc.)
    pub log_output: String,        // Log output (e.g., "stdout", "file", etc.)
}

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub master: MasterConfig,
    #[serde(default)]
    pub chunkserver: ChunkServerConfig,
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub common: CommonConfig,
}

impl Default for CommonConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: 5,
            heartbeat_timeout: 15,
            chunk_size: 1024 * 1024,
            replication_factor: 2,
            log_level: "info".to_string(),
            log_output: "stdout".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            master: MasterConfig::default(),
            chunkserver: ChunkServerConfig::default(),
            client: ClientConfig::default(),
            common: CommonConfig::default(),
        }
    }
}

/// Loads `Config` from a TOML file. Missing sections fall back to field defaults so a
/// role can run against a config file that only specifies the sections it cares about.
pub fn load_config(path: &str) -> Result<Config, Box<dyn std::error::Error>> {
    let config_content = fs::read_to_string(path)?;
    let config: Config = toml::from_str(&config_content)?;
    Ok(config)
}

/// Loads from `path` if it exists, otherwise falls back to built-in defaults. Lets every
/// role run for local experimentation without requiring a config file on disk.
pub fn load_config_or_default(path: &str) -> Config {
    if std::path::Path::new(path).exists() {
        match load_config(path) {
            Ok(config) => return config,
            Err(e) => {
                eprintln!("warning: failed to parse config '{}': {}; using defaults", path, e);
            }
        }
    }
    Config::default()
}
