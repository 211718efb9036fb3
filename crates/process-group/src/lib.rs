//! Process Group - the collective-communication seam
//!
//! The coordinator consumes exactly four primitives from the process
//! group that runs the application: rank identity, group size, a
//! barrier, and a collective success agreement (logical AND across all
//! ranks). Production deployments adapt their transport (MPI or
//! similar) behind [`ProcessGroup`]; this crate ships [`SoloGroup`] for
//! single-process runs and [`LocalGroup`] for deterministic in-process
//! multi-rank simulation.

pub mod local;

pub use local::LocalGroup;

use async_trait::async_trait;
use runtime_core::Result;

/// Collective primitives consumed by the coordinator
///
/// `barrier` and `all_succeeded` block until every rank in the group has
/// entered the same call; timeout and hang policies belong to the
/// adapter, not to the manager.
#[async_trait]
pub trait ProcessGroup: Send + Sync {
    /// This process's rank, 0-based
    fn rank(&self) -> usize;

    /// Number of processes in the group
    fn size(&self) -> usize;

    /// Block until every rank has arrived
    async fn barrier(&self) -> Result<()>;

    /// Collective AND: true only if every rank reports success
    async fn all_succeeded(&self, local_ok: bool) -> Result<bool>;
}

/// Trivial single-process group
#[derive(Debug, Default, Clone, Copy)]
pub struct SoloGroup;

#[async_trait]
impl ProcessGroup for SoloGroup {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    async fn barrier(&self) -> Result<()> {
        Ok(())
    }

    async fn all_succeeded(&self, local_ok: bool) -> Result<bool> {
        Ok(local_ok)
    }
}
