//! lrpgrid.toml configuration parser.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_WORKER_POOL_SIZE: usize = 20;
pub const DEFAULT_API_PORT: u16 = 8888;
pub const DEFAULT_STORE_PATH: &str = "/var/lib/lrpgrid/lrpgrid.redb";
const DEFAULT_CLIENT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Read(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GridConfig {
    pub store: Option<StoreConfig>,
    pub bbs: Option<BbsConfig>,
    pub auctioneer: Option<AuctioneerConfig>,
    pub cells: Option<CellsConfig>,
    pub api: Option<ApiConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BbsConfig {
    /// Concurrency ceiling for bulk retirement.
    pub worker_pool_size: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuctioneerConfig {
    pub address: Option<String>,
    pub timeout: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CellsConfig {
    pub timeout: Option<String>,
    /// `cell_id -> host:port` of each cell's control endpoint.
    #[serde(default)]
    pub addresses: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiConfig {
    pub port: Option<u16>,
}

impl GridConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: GridConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.worker_pool_size() == 0 {
            return Err(ConfigError::Invalid(
                "bbs.worker_pool_size must be at least 1".to_string(),
            ));
        }
        for (field, value) in [
            ("auctioneer.timeout", self.auctioneer.as_ref().and_then(|a| a.timeout.as_deref())),
            ("cells.timeout", self.cells.as_ref().and_then(|c| c.timeout.as_deref())),
        ] {
            if let Some(value) = value {
                if parse_duration(value).is_none() {
                    return Err(ConfigError::Invalid(format!(
                        "{field}: bad duration {value:?}"
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn store_path(&self) -> PathBuf {
        self.store
            .as_ref()
            .and_then(|s| s.path.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_PATH))
    }

    pub fn worker_pool_size(&self) -> usize {
        self.bbs
            .as_ref()
            .and_then(|b| b.worker_pool_size)
            .unwrap_or(DEFAULT_WORKER_POOL_SIZE)
    }

    pub fn auctioneer_address(&self) -> Option<&str> {
        self.auctioneer.as_ref().and_then(|a| a.address.as_deref())
    }

    pub fn auctioneer_timeout(&self) -> Duration {
        self.auctioneer
            .as_ref()
            .and_then(|a| a.timeout.as_deref())
            .and_then(parse_duration)
            .unwrap_or(DEFAULT_CLIENT_TIMEOUT)
    }

    pub fn cell_timeout(&self) -> Duration {
        self.cells
            .as_ref()
            .and_then(|c| c.timeout.as_deref())
            .and_then(parse_duration)
            .unwrap_or(DEFAULT_CLIENT_TIMEOUT)
    }

    pub fn cell_addresses(&self) -> HashMap<String, String> {
        self.cells
            .as_ref()
            .map(|c| c.addresses.clone())
            .unwrap_or_default()
    }

    pub fn api_port(&self) -> u16 {
        self.api
            .as_ref()
            .and_then(|a| a.port)
            .unwrap_or(DEFAULT_API_PORT)
    }
}

/// Parse a duration string like "5s", "500ms", "1m".
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(ms) = s.strip_suffix("ms") {
        ms.parse::<u64>().ok().map(Duration::from_millis)
    } else if let Some(secs) = s.strip_suffix('s') {
        secs.parse::<u64>().ok().map(Duration::from_secs)
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.parse::<u64>().ok().map(|m| Duration::from_secs(m * 60))
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}
