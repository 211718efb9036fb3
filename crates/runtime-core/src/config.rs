//! Manager configuration types

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};
use crate::types::{Level, MAX_LEVEL, MIN_LEVEL};

/// Main manager configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ManagerConfig {
    /// Storage settings
    pub storage: StorageConfig,

    /// Checkpoint settings
    pub checkpoint: CheckpointConfig,
}

impl ManagerConfig {
    /// Load a configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| Error::InvalidConfig {
            message: format!("cannot read {}: {}", path.display(), e),
        })?;
        let config: ManagerConfig =
            serde_json::from_str(&text).map_err(|e| Error::InvalidConfig {
                message: format!("cannot parse {}: {}", path.display(), e),
            })?;
        config.validate()?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Convenience constructor for a local-filesystem store
    pub fn local<P: AsRef<Path>>(base_path: P) -> Self {
        Self {
            storage: StorageConfig {
                backend: StorageBackendKind::Local {
                    base_path: base_path.as_ref().to_string_lossy().to_string(),
                },
                ..Default::default()
            },
            checkpoint: CheckpointConfig::default(),
        }
    }

    /// Validate field ranges
    pub fn validate(&self) -> Result<()> {
        if let StorageBackendKind::Local { base_path } = &self.storage.backend {
            if base_path.is_empty() {
                return Err(Error::InvalidConfig {
                    message: "storage.backend.base_path must not be empty".to_string(),
                });
            }
        }

        if !(MIN_LEVEL..=MAX_LEVEL).contains(&self.checkpoint.default_level) {
            return Err(Error::InvalidConfig {
                message: format!(
                    "checkpoint.default_level must be {}-{}, got {}",
                    MIN_LEVEL, MAX_LEVEL, self.checkpoint.default_level
                ),
            });
        }

        Ok(())
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Storage backend type
    pub backend: StorageBackendKind,

    /// Committed checkpoints to keep per rank; 0 keeps all
    pub keep_count: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackendKind::Local {
                base_path: "./checkpoints".to_string(),
            },
            keep_count: 0,
        }
    }
}

/// Storage backend type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StorageBackendKind {
    /// Local filesystem, one directory per rank
    Local { base_path: String },

    /// In-memory store, gone at process exit; simulations and tests
    Memory,
}

/// Checkpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointConfig {
    /// Level used by interval-driven checkpoints
    pub default_level: Level,

    /// Iterations between interval-driven checkpoints; 0 disables them
    pub interval: u64,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            default_level: 1,
            interval: 0,
        }
    }
}
