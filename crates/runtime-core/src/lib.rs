//! Runtime Core - Foundation for the segment and checkpoint manager
//!
//! Provides the error taxonomy, core data types (value types, shapes,
//! segment metadata, checkpoint bundles, parameter values) and
//! configuration shared by every other crate in the workspace.

pub mod config;
pub mod error;
pub mod types;

pub use config::{CheckpointConfig, ManagerConfig, StorageBackendKind, StorageConfig};
pub use error::{Error, Result};
pub use types::*;
