//! Configuration management.
//!
//! Defines the structure for operator-supplied settings. Every field has a
//! default, so a TOML file only needs to name what it changes.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::events::WaitMode;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub bootstrap: BootstrapConfig,
    pub committee: CommitteeConfig,
}

impl Config {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}

/// Deadlines and confirmation policy for a bootstrap run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapConfig {
    /// Overall deadline for each DKG round and each configuration or
    /// activation fan-out.
    pub rpc_timeout_ms: u64,

    /// Deadline for the confirmation event wait.
    pub event_timeout_ms: u64,

    /// Deadline for posting and confirming the anchoring transaction.
    pub ledger_timeout_ms: u64,

    /// Event stream dialing.
    pub dial: DialConfig,

    /// How many committee nodes must confirm activation.
    pub confirm_mode: WaitMode,

    /// State index a freshly activated chain reports first.
    pub first_state_index: u64,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            rpc_timeout_ms: 10_000,
            event_timeout_ms: 30_000,
            ledger_timeout_ms: 20_000,
            dial: DialConfig::default(),
            confirm_mode: WaitMode::All,
            first_state_index: 1,
        }
    }
}

impl BootstrapConfig {
    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_timeout_ms)
    }

    pub fn event_timeout(&self) -> Duration {
        Duration::from_millis(self.event_timeout_ms)
    }

    pub fn ledger_timeout(&self) -> Duration {
        Duration::from_millis(self.ledger_timeout_ms)
    }
}

/// Bounded exponential backoff for the initial event stream dial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DialConfig {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    /// Per-attempt connect deadline.
    pub connect_timeout_ms: u64,
}

impl Default for DialConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff_ms: 100,
            max_backoff_ms: 2_000,
            connect_timeout_ms: 1_000,
        }
    }
}

impl DialConfig {
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

/// Where to reach one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeEndpoint {
    /// API base URL, e.g. `http://127.0.0.1:9090`.
    pub api: String,
    /// Event stream `host:port`.
    pub events: String,
}

/// Committee membership, in committee index order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommitteeConfig {
    pub nodes: Vec<NodeEndpoint>,
    pub access_nodes: Vec<NodeEndpoint>,
}
