//! CLI configuration
//!
//! TOML file with a `[server]` section and optional `[session]` defaults;
//! every field falls back to a built-in default when absent.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use attune_core::SessionConfig;

/// Default port for the attune server
pub const DEFAULT_PORT: u16 = 7410;
/// Default host for the attune server
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Top-level CLI configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AttuneConfig {
    #[serde(default)]
    pub server: ServerSection,

    /// Defaults applied to sessions created without an explicit config
    #[serde(default)]
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Granularity of the scheduled-interval tick, in seconds
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_tick_secs() -> u64 {
    10
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            tick_secs: default_tick_secs(),
        }
    }
}

impl AttuneConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: AttuneConfig = toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config
            .session
            .validate()
            .context("invalid [session] configuration")?;
        Ok(config)
    }
}
