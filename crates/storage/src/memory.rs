//! In-memory checkpoint store
//!
//! Keeps bundles in a map with the same write/commit/discard contract as
//! the filesystem store. Nothing survives the process; intended for
//! simulations and tests. Collective failure paths are exercised through
//! `set_fail_writes`, which makes every subsequent write fail
//! deterministically until cleared.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use runtime_core::{CheckpointBundle, Error, Iteration, Level, ParamValue, Result};
use tracing::debug;

use crate::store::CheckpointStore;

#[derive(Debug)]
struct StoredBundle {
    bundle: CheckpointBundle,
    committed: bool,
}

/// In-memory store for one rank
#[derive(Debug, Default)]
pub struct MemoryStore {
    bundles: Mutex<BTreeMap<Iteration, StoredBundle>>,
    params: Mutex<Option<Vec<(String, ParamValue)>>>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `write` fail until called with `false`
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of committed checkpoints held
    pub fn committed_count(&self) -> usize {
        self.bundles
            .lock()
            .values()
            .filter(|stored| stored.committed)
            .count()
    }
}

#[async_trait]
impl CheckpointStore for MemoryStore {
    async fn write(&self, bundle: &CheckpointBundle) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::Storage {
                message: format!(
                    "injected write failure at iteration {}",
                    bundle.iteration
                ),
            });
        }

        self.bundles.lock().insert(
            bundle.iteration,
            StoredBundle {
                bundle: bundle.clone(),
                committed: false,
            },
        );
        debug!(iteration = bundle.iteration, "bundle staged in memory");
        Ok(())
    }

    async fn commit(&self, iteration: Iteration, _level: Level) -> Result<()> {
        let mut bundles = self.bundles.lock();
        let stored = bundles.get_mut(&iteration).ok_or_else(|| Error::Storage {
            message: format!("cannot commit iteration {}: no staged bundle", iteration),
        })?;
        stored.committed = true;
        Ok(())
    }

    async fn discard(&self, iteration: Iteration) -> Result<()> {
        let mut bundles = self.bundles.lock();
        if let Some(stored) = bundles.get(&iteration) {
            if !stored.committed {
                bundles.remove(&iteration);
            }
        }
        Ok(())
    }

    async fn read_latest(&self, max_iteration: Iteration) -> Result<CheckpointBundle> {
        self.bundles
            .lock()
            .range(..=max_iteration)
            .rev()
            .find(|(_, stored)| stored.committed)
            .map(|(_, stored)| stored.bundle.clone())
            .ok_or(Error::NoCheckpointForRecovery)
    }

    async fn write_params(&self, entries: &[(String, ParamValue)]) -> Result<()> {
        *self.params.lock() = Some(entries.to_vec());
        Ok(())
    }

    async fn read_params(&self) -> Result<Option<Vec<(String, ParamValue)>>> {
        Ok(self.params.lock().clone())
    }

    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}
