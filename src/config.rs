//! Server and list configuration

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::controller::ControllerSettings;
use crate::paths;
use crate::session::SessionSettings;
use crate::window::WindowSpec;

/// Top-level configuration file structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub list: ListConfig,
}

/// Search endpoint settings
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// HTTP listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
    /// CSV or JSON file holding the records
    #[serde(default = "paths::dataset_path")]
    pub dataset: PathBuf,
    /// Largest page a client may request
    #[serde(default = "default_max_limit")]
    pub max_limit: u32,
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 3000))
}

fn default_max_limit() -> u32 {
    1000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            dataset: paths::dataset_path(),
            max_limit: default_max_limit(),
        }
    }
}

/// Client-side list behaviour
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ListConfig {
    /// Records per page
    pub page_size: u32,
    /// Fixed row height
    pub item_height: f64,
    /// Extra rows rendered above and below the viewport
    pub overscan: usize,
    /// Quiet period before a typed query is fetched
    pub debounce_ms: u64,
    /// Distance from the bottom that triggers the next page
    pub bottom_threshold: f64,
    /// Per-fetch timeout (0 = wait forever)
    pub fetch_timeout_ms: u64,
}

impl Default for ListConfig {
    fn default() -> Self {
        Self {
            page_size: 100,
            item_height: 180.0,
            overscan: 3,
            debounce_ms: 300,
            bottom_threshold: 10.0,
            fetch_timeout_ms: 10_000,
        }
    }
}

impl ListConfig {
    pub fn controller_settings(&self) -> ControllerSettings {
        ControllerSettings {
            page_size: self.page_size.max(1),
            debounce: Duration::from_millis(self.debounce_ms),
            fetch_timeout: (self.fetch_timeout_ms > 0)
                .then(|| Duration::from_millis(self.fetch_timeout_ms)),
        }
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            controller: self.controller_settings(),
            window: WindowSpec {
                item_height: self.item_height,
                overscan: self.overscan,
            },
            bottom_threshold: self.bottom_threshold,
        }
    }
}

impl Config {
    /// Load config from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::warn!("config not found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;

        let config = Self::parse(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?;

        tracing::info!(
            "loaded config from {} (dataset {})",
            path.display(),
            config.server.dataset.display()
        );

        Ok(config)
    }

    /// Parse config from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}
