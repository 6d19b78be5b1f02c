//! Configuration file support for the cutview client

use crate::validation::UploadLimits;
use crate::workflow::DEFAULT_THRESHOLD_BYTES;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Environment variable that overrides `service.base_url`
pub const SERVICE_URL_ENV: &str = "CUTVIEW_SERVICE_URL";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub compression: CompressionConfig,
    #[serde(default)]
    pub limits: UploadLimits,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceConfig {
    /// Base URL of the generation backend
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompressionConfig {
    /// Photos larger than this are compressed before upload
    #[serde(default = "default_threshold_bytes")]
    pub threshold_bytes: usize,
}

// Defaults

fn default_base_url() -> String {
    "http://localhost:3001".to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_threshold_bytes() -> usize {
    DEFAULT_THRESHOLD_BYTES
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            threshold_bytes: default_threshold_bytes(),
        }
    }
}

impl ServiceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// `<config dir>/cutview/config.toml`, if the platform has a config dir
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("cutview").join("config.toml"))
    }

    /// Resolve configuration: explicit path, then the default path, then defaults.
    /// The service URL environment variable is applied last.
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match explicit {
            Some(path) => {
                debug!(path = %path.display(), "Loading config");
                Self::from_file(path)?
            }
            None => match Self::default_path().filter(|p| p.exists()) {
                Some(path) => {
                    debug!(path = %path.display(), "Loading config");
                    Self::from_file(path)?
                }
                None => Self::default(),
            },
        };

        config.apply_service_url(std::env::var(SERVICE_URL_ENV).ok());
        Ok(config)
    }

    /// Replace the service URL when a non-empty value is given
    pub fn apply_service_url(&mut self, url: Option<String>) {
        if let Some(url) = url.filter(|u| !u.trim().is_empty()) {
            self.service.base_url = url.trim().to_string();
        }
    }
}
