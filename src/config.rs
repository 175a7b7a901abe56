//! Configuration file support for the Vesper devnet binary.
//!
//! Loads optional `vesper.toml` from the data directory. CLI flags override
//! config file values. If no config file exists, defaults are used.

use serde::Deserialize;
use std::path::Path;

/// Top-level configuration.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct VesperConfig {
    pub devnet: DevnetConfig,
}

/// Devnet configuration section.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct DevnetConfig {
    /// Number of in-process validator nodes to run.
    pub nodes: usize,
    /// Unix seconds of slot 0. `None` means "now" at startup.
    pub genesis_time: Option<u64>,
    /// Duty-cycle tick period in seconds.
    pub tick_secs: u64,
}

impl Default for DevnetConfig {
    fn default() -> Self {
        DevnetConfig {
            nodes: crate::constants::DEFAULT_DEVNET_NODES,
            genesis_time: None,
            tick_secs: crate::constants::TICK_INTERVAL_SECS,
        }
    }
}

impl VesperConfig {
    /// Load configuration from `vesper.toml` in the given directory.
    /// Returns `Default` if the file doesn't exist.
    pub fn load(data_dir: &Path) -> Self {
        let config_path = data_dir.join("vesper.toml");
        match std::fs::read_to_string(&config_path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", config_path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!(
                        "Failed to parse {}: {}, using defaults",
                        config_path.display(),
                        e
                    );
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }
}
