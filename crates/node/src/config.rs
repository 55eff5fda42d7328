//! Node configuration.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Node configuration, loadable from TOML with CLI overrides on top.
///
/// Every field has a default; a node started with no configuration at all
/// joins channel 0 on the standard port.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Node identifier, used only for log attribution.
    pub node_id: u32,

    /// Chain channel to join.
    pub channel: u16,

    /// Shared UDP protocol port.
    pub port: u16,

    /// Target run-loop iteration period in milliseconds.
    pub iteration_ms: u64,

    /// Path probed for external act requests.
    pub act_path: PathBuf,

    /// Fixed sealing seed. Leave unset outside of tests: nodes must seed
    /// independently or their nonce searches correlate.
    pub seal_seed: Option<u64>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        NodeConfig {
            node_id: 0,
            channel: 0,
            port: 12345,
            iteration_ms: 1000,
            act_path: PathBuf::from("act"),
            seal_seed: None,
        }
    }
}

impl NodeConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}
