//! Configuration for minidfs components

use crate::common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable prefix, e.g. `MINIDFS_LOG_LEVEL=debug` or
/// `MINIDFS_DATANODE_MANAGER__BLOCK_INVALIDATE_LIMIT=500`.
const ENV_PREFIX: &str = "MINIDFS";

/// Global configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Datanode bookkeeping and heartbeat-response limits
    #[serde(default)]
    pub datanode_manager: DatanodeManagerConfig,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            datanode_manager: DatanodeManagerConfig::default(),
        }
    }
}

impl Config {
    /// Load config from an optional TOML file, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.datanode_manager.validate()
    }
}

/// Limits applied when building heartbeat responses, plus liveness intervals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatanodeManagerConfig {
    /// Max replication items handed to a node per heartbeat
    #[serde(default = "default_max_replication_streams")]
    pub max_replication_streams: usize,

    /// Max lease-recovery items handed to a node per heartbeat
    #[serde(default = "default_max_recovery_streams")]
    pub max_recovery_streams: usize,

    /// Max blocks invalidated per heartbeat
    #[serde(default = "default_block_invalidate_limit")]
    pub block_invalidate_limit: usize,

    /// Expected heartbeat period of a datanode
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_ms: u64,

    /// A node silent for longer than this is stale (still alive)
    #[serde(default = "default_stale_interval")]
    pub stale_interval_ms: u64,

    /// Recheck period used to derive the dead-node expiry
    #[serde(default = "default_heartbeat_recheck_interval")]
    pub heartbeat_recheck_interval_ms: u64,
}

fn default_max_replication_streams() -> usize {
    2
}
fn default_max_recovery_streams() -> usize {
    2
}
fn default_block_invalidate_limit() -> usize {
    1000
}
fn default_heartbeat_interval() -> u64 {
    3_000
}
fn default_stale_interval() -> u64 {
    30_000
}
fn default_heartbeat_recheck_interval() -> u64 {
    300_000
}

impl Default for DatanodeManagerConfig {
    fn default() -> Self {
        Self {
            max_replication_streams: default_max_replication_streams(),
            max_recovery_streams: default_max_recovery_streams(),
            block_invalidate_limit: default_block_invalidate_limit(),
            heartbeat_interval_ms: default_heartbeat_interval(),
            stale_interval_ms: default_stale_interval(),
            heartbeat_recheck_interval_ms: default_heartbeat_recheck_interval(),
        }
    }
}

impl DatanodeManagerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_replication_streams == 0 {
            return Err(Error::InvalidConfig(
                "max_replication_streams must be positive".into(),
            ));
        }
        if self.max_recovery_streams == 0 {
            return Err(Error::InvalidConfig(
                "max_recovery_streams must be positive".into(),
            ));
        }
        if self.block_invalidate_limit == 0 {
            return Err(Error::InvalidConfig(
                "block_invalidate_limit must be positive".into(),
            ));
        }
        if self.heartbeat_interval_ms == 0 {
            return Err(Error::InvalidConfig(
                "heartbeat_interval_ms must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn stale_interval(&self) -> Duration {
        Duration::from_millis(self.stale_interval_ms)
    }

    /// A node is declared dead after `2 * recheck + 10 * heartbeat` of silence.
    pub fn expiry_interval(&self) -> Duration {
        Duration::from_millis(
            2 * self.heartbeat_recheck_interval_ms + 10 * self.heartbeat_interval_ms,
        )
    }
}
