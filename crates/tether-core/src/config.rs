//! Configuration loading
//!
//! Settings live in `config.toml` under the user config directory. Every
//! field has a default, so a missing file is not an error.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::decode::DecodeOptions;

const CONFIG_FILE: &str = "config.toml";

/// Default user agent sent with every request
pub const DEFAULT_USER_AGENT: &str = concat!("tether/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TetherConfig {
    pub http: HttpConfig,
    pub decode: DecodeOptions,
}

/// Settings for the HTTP client used to open streams
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Timeout for establishing the TCP/TLS connection
    pub connect_timeout_secs: Option<u64>,
    /// Maximum silence between two reads of the body
    pub read_timeout_secs: Option<u64>,
    pub user_agent: String,
    /// Extra headers sent with every request
    pub headers: HashMap<String, String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: None,
            read_timeout_secs: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            headers: HashMap::new(),
        }
    }
}

impl HttpConfig {
    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_secs.map(Duration::from_secs)
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout_secs.map(Duration::from_secs)
    }
}

impl TetherConfig {
    /// Default config path (`<config dir>/tether/config.toml`)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("tether").join(CONFIG_FILE))
    }

    /// Load from an explicit path; the file must exist
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = Self::parse(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Load from the default path, falling back to defaults if absent
    pub fn load_default() -> Result<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            Some(path) => {
                debug!("No config at {}, using defaults", path.display());
                Ok(Self::default())
            }
            None => {
                debug!("No config directory on this platform, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}
