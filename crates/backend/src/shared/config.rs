use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use crate::dashboards::d402_logistics_statistics::InvalidDatePolicy;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    pub statistics: StatisticsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        let addr = format!("{}:{}", self.host, self.port).parse()?;
        Ok(addr)
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

#[derive(Debug, Deserialize, Clone)]
pub struct StatisticsConfig {
    #[serde(default)]
    pub invalid_dates: InvalidDatePolicy,
    pub source: SourceConfig,
}

/// Where the dashboard gets its pre-computed statistics from
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SourceConfig {
    /// JSON payload on disk
    File { path: String },
    /// Statistics service reachable over HTTP
    Http {
        base_url: String,
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,
    },
}

fn default_timeout_secs() -> u64 {
    30
}

/// Default configuration embedded in the binary
const DEFAULT_CONFIG: &str = r#"
[server]
host = "0.0.0.0"
port = 3000

[statistics]
invalid_dates = "abort"

[statistics.source]
kind = "file"
path = "data/statistics.json"
"#;

/// Load configuration from config.toml file
///
/// Search order:
/// 1. Next to the executable (for production)
/// 2. Falls back to embedded default config
pub fn load_config() -> anyhow::Result<Config> {
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            let config_path = exe_dir.join("config.toml");

            if config_path.exists() {
                tracing::info!("Loading config from: {}", config_path.display());
                let contents = std::fs::read_to_string(&config_path)?;
                return parse_config(&contents);
            } else {
                tracing::warn!("config.toml not found at: {}", config_path.display());
            }
        }
    }

    tracing::info!("Using default embedded configuration");
    parse_config(DEFAULT_CONFIG)
}

pub fn parse_config(contents: &str) -> anyhow::Result<Config> {
    let config: Config = toml::from_str(contents)?;
    Ok(config)
}

/// Resolve a configured data file path
///
/// Absolute paths are used as is. Relative paths are looked up next to the
/// executable first, then relative to the current directory.
pub fn resolve_data_path(path: &str) -> PathBuf {
    let data_path = Path::new(path);

    if data_path.is_absolute() {
        return data_path.to_path_buf();
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            let candidate = exe_dir.join(data_path);
            if candidate.exists() {
                return candidate;
            }
        }
    }

    PathBuf::from(path)
}
