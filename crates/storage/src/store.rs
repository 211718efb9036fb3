//! Checkpoint store trait definition

use async_trait::async_trait;
use runtime_core::{CheckpointBundle, Iteration, Level, ParamValue, Result};

/// Durable storage for one rank's checkpoints and parameters
///
/// Writes and commits are separate: the coordinator writes a bundle on
/// every rank, runs the collective success agreement, and only then
/// commits. `read_latest` must never return an uncommitted bundle, so a
/// rejected checkpoint attempt can never become "latest". The durability
/// level (1-4) is a cost/redundancy hint each backend interprets for
/// itself.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Persist a bundle as an uncommitted attempt
    ///
    /// Overwrites any previous uncommitted attempt at the same iteration.
    async fn write(&self, bundle: &CheckpointBundle) -> Result<()>;

    /// Mark a previously written bundle as committed
    async fn commit(&self, iteration: Iteration, level: Level) -> Result<()>;

    /// Drop an uncommitted attempt; committed checkpoints are untouched
    async fn discard(&self, iteration: Iteration) -> Result<()>;

    /// Most recent committed bundle with iteration <= `max_iteration`
    ///
    /// # Errors
    /// `NoCheckpointForRecovery` when no committed bundle qualifies.
    async fn read_latest(&self, max_iteration: Iteration) -> Result<CheckpointBundle>;

    /// Persist the full parameter set (write-through on registration)
    async fn write_params(&self, entries: &[(String, ParamValue)]) -> Result<()>;

    /// Load the persisted parameter set, if any
    async fn read_params(&self) -> Result<Option<Vec<(String, ParamValue)>>>;

    /// Flush pending state; called from `finalize`
    async fn flush(&self) -> Result<()>;
}
