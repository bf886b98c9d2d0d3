//! Server configuration.
//!
//! Loads from a TOML file with serde defaults, then lets the command
//! line override individual values.

use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Default page size for record listings.
    #[serde(default = "default_page_limit")]
    pub page_limit: u64,

    /// Per-stage timeout for order aggregation, in milliseconds.
    #[serde(default = "default_stage_timeout_ms")]
    pub stage_timeout_ms: u64,

    /// Maximum accepted CSV upload size in MB.
    #[serde(default = "default_max_upload_mb")]
    pub max_upload_mb: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_page_limit() -> u64 {
    trellis_common::DEFAULT_PAGE_LIMIT
}

fn default_stage_timeout_ms() -> u64 {
    trellis_common::DEFAULT_STAGE_TIMEOUT_MS
}

fn default_max_upload_mb() -> usize {
    16
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            page_limit: default_page_limit(),
            stage_timeout_ms: default_stage_timeout_ms(),
            max_upload_mb: default_max_upload_mb(),
        }
    }
}

impl ServerConfig {
    /// Creates a new default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Converts configuration to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Returns the socket address to bind.
    #[must_use]
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
