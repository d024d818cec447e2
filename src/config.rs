//! Runtime configuration for block-meta-cache.
//!
//! Configuration is loaded once from a JSON file at startup or constructed
//! programmatically. It is never reloaded while the cache is running.

use std::path::PathBuf;

use clap::Parser;
use serde::{Deserialize, Serialize};

use crate::cache::policy::EvictionPolicy;

/// Default cache budget: 200 GiB.
pub const DEFAULT_CAPACITY_BYTES: u64 = 200 * 1024 * 1024 * 1024;

/// Command-line arguments.
#[derive(Parser, Debug, Clone)]
#[command(name = "block-meta-cache", about = "Block metadata cache service")]
pub struct Cli {
    /// Path to configuration file (JSON).
    #[arg(short, long, default_value = "config.json")]
    pub config: PathBuf,

    /// HTTP listen address (overrides the config file).
    #[arg(long)]
    pub listen: Option<String>,

    /// Enable verbose logging.
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit logs as JSON lines.
    #[arg(long)]
    pub log_json: bool,
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,

    /// Cache engine configuration.
    pub cache: CacheConfig,
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address (e.g. "0.0.0.0:8080").
    pub listen: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Cache engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Master switch. A disabled cache answers every call with an empty result.
    pub enabled: bool,

    /// Byte budget for the sum of all cached block sizes.
    pub capacity_bytes: u64,

    /// Eviction policy ("LRU" or "LFU").
    pub policy: EvictionPolicy,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity_bytes: DEFAULT_CAPACITY_BYTES,
            policy: EvictionPolicy::default(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file, falling back to defaults for missing fields.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        let config = if path.exists() {
            let data = std::fs::read_to_string(path)?;
            serde_json::from_str(&data)?
        } else {
            tracing::warn!("Config file not found at {:?}, using defaults", path);
            Config::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the engine cannot run with.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.cache.capacity_bytes == 0 {
            anyhow::bail!("cache.capacity_bytes must be greater than zero");
        }
        Ok(())
    }
}
