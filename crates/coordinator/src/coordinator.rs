//! Checkpoint/recovery coordinator

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use process_group::ProcessGroup;
use runtime_core::{
    CheckpointBundle, CheckpointConfig, Error, Generation, Iteration, Level, ManagerConfig,
    ParamValue, Result, SegmentMeta, ShapeKind, StorageBackendKind, BUNDLE_FORMAT_VERSION,
    MAX_LEVEL, MIN_LEVEL,
};
use segment_registry::{
    Element, Initializer, IterationSequencer, ParameterStore, SegmentRegistry, SegmentView,
};
use storage::{CheckpointStore, LocalStore, MemoryStore};
use tracing::{debug, info, warn};

/// Coordinator lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Phase {
    #[default]
    Uninitialized,
    Initialized,
    Running,
    Finalized,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Uninitialized => "uninitialized",
            Phase::Initialized => "initialized",
            Phase::Running => "running",
            Phase::Finalized => "finalized",
        };
        f.write_str(name)
    }
}

#[derive(Default)]
struct Inner {
    phase: Phase,
    store: Option<Arc<dyn CheckpointStore>>,
    checkpoint: CheckpointConfig,
    resuming: bool,

    /// (name -> generation) of everything registered when `start` ran
    baseline: HashMap<String, Generation>,

    /// Iteration of the most recent committed checkpoint, if any
    last_committed: Option<Iteration>,
}

/// The checkpoint/recovery coordinator for one process
///
/// Owns the segment registry, parameter store and iteration sequencer,
/// and orchestrates collective checkpoints against the storage backend.
/// Constructed explicitly and passed around by the application's run
/// loop; there is no hidden global instance.
pub struct Coordinator {
    group: Arc<dyn ProcessGroup>,
    registry: SegmentRegistry,
    params: ParameterStore,
    sequencer: IterationSequencer,
    inner: RwLock<Inner>,
}

impl Coordinator {
    /// Create an uninitialized coordinator on top of a process group
    pub fn new(group: Arc<dyn ProcessGroup>) -> Self {
        Self {
            group,
            registry: SegmentRegistry::new(),
            params: ParameterStore::new(),
            sequencer: IterationSequencer::new(),
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Open the storage backend described by `config` and initialize
    ///
    /// With `attempt_restart` set, a committed checkpoint found for this
    /// run identity is loaded before any registration happens: segments
    /// are materialized, parameters and the iteration counter restored,
    /// and subsequent `register` calls attach to the recovered state.
    pub async fn initialize(&self, config: ManagerConfig, attempt_restart: bool) -> Result<()> {
        self.ensure_phase("initialize", &[Phase::Uninitialized])?;
        config.validate()?;

        let store: Arc<dyn CheckpointStore> = match &config.storage.backend {
            StorageBackendKind::Local { base_path } => Arc::new(
                LocalStore::open(base_path, self.group.rank(), config.storage.keep_count)
                    .await?,
            ),
            StorageBackendKind::Memory => Arc::new(MemoryStore::new()),
        };

        self.initialize_with_store(store, config.checkpoint, attempt_restart)
            .await
    }

    /// Initialize against a pre-built store
    ///
    /// Used when the store is shared or instrumented externally, e.g. an
    /// in-memory store carried across simulated restarts, or a backend
    /// with injected faults.
    pub async fn initialize_with_store(
        &self,
        store: Arc<dyn CheckpointStore>,
        checkpoint: CheckpointConfig,
        attempt_restart: bool,
    ) -> Result<()> {
        self.ensure_phase("initialize", &[Phase::Uninitialized])?;

        let mut resuming = false;
        let mut last_committed = None;

        if attempt_restart {
            match store.read_latest(Iteration::MAX).await {
                Ok(bundle) => {
                    for record in &bundle.segments {
                        self.registry.materialize_record(record)?;
                    }
                    self.params.replace_all(bundle.params.clone());
                    self.sequencer.restore(bundle.iteration);
                    last_committed = Some(bundle.iteration);
                    resuming = true;
                    info!(
                        iteration = bundle.iteration,
                        segments = bundle.segments.len(),
                        "resuming from committed checkpoint"
                    );
                }
                Err(Error::NoCheckpointForRecovery) => {
                    debug!("no prior checkpoint, starting fresh");
                }
                Err(e) => return Err(e),
            }
        }

        // the startup parameter file overlays checkpointed values: it also
        // holds parameters registered after the last checkpoint was taken
        if let Some(entries) = store.read_params().await? {
            for (name, value) in entries {
                self.params.insert(&name, value);
            }
        }

        let mut inner = self.inner.write();
        inner.phase = Phase::Initialized;
        inner.store = Some(store);
        inner.checkpoint = checkpoint;
        inner.resuming = resuming;
        inner.last_committed = last_committed;
        Ok(())
    }

    /// Transition to `Running` once the first registration pass is done
    ///
    /// Records the registry baseline used for resize bookkeeping, then
    /// synchronizes the group so no rank starts iterating before every
    /// rank has finished registering.
    pub async fn start(&self) -> Result<()> {
        self.ensure_phase("start", &[Phase::Initialized])?;
        self.group.barrier().await?;

        let baseline = self.registry.generations();
        let mut inner = self.inner.write();
        inner.baseline = baseline;
        inner.phase = Phase::Running;
        info!(
            rank = self.group.rank(),
            world_size = self.group.size(),
            segments = self.registry.len(),
            resuming = inner.resuming,
            "manager running"
        );
        Ok(())
    }

    /// Collectively checkpoint all registered state at `level`
    ///
    /// Every rank must call this at the same iteration. The bundle is
    /// written on each rank, then a collective agreement decides the
    /// outcome: unanimous success commits everywhere, any failure
    /// discards the attempt everywhere and surfaces a storage error,
    /// leaving the previously committed checkpoint latest. Failures are
    /// non-fatal; callers may simply try again at a later iteration.
    pub async fn checkpoint(&self, level: Level) -> Result<()> {
        let store = self.store_for("checkpoint", &[Phase::Running])?;
        if !(MIN_LEVEL..=MAX_LEVEL).contains(&level) {
            return Err(Error::InvalidLevel { level });
        }

        self.group.barrier().await?;

        let bundle = self.collect_bundle(level);
        let iteration = bundle.iteration;

        let local_result = store.write(&bundle).await;
        if let Err(e) = &local_result {
            warn!(iteration, error = %e, "local checkpoint write failed");
        }

        let all_ok = self.group.all_succeeded(local_result.is_ok()).await?;
        if all_ok {
            store.commit(iteration, level).await?;
            self.inner.write().last_committed = Some(iteration);
            info!(
                iteration,
                level,
                segments = bundle.segments.len(),
                "checkpoint committed"
            );
            return Ok(());
        }

        if local_result.is_ok() {
            if let Err(e) = store.discard(iteration).await {
                warn!(iteration, error = %e, "failed to discard rejected checkpoint attempt");
            }
        }

        match local_result {
            Err(e) => Err(e),
            Ok(()) => Err(Error::Storage {
                message: format!(
                    "checkpoint at iteration {} aborted: a peer rank reported a write failure",
                    iteration
                ),
            }),
        }
    }

    /// Checkpoint at the configured default level if the configured
    /// interval has elapsed since the last committed checkpoint
    ///
    /// Returns whether a checkpoint was taken. Deterministic across the
    /// group: every rank sees the same counter and the same commit
    /// history, so either all ranks enter the collective or none do.
    pub async fn maybe_checkpoint(&self) -> Result<bool> {
        let (interval, level, last_committed) = {
            let inner = self.inner.read();
            if inner.phase != Phase::Running {
                return Err(Error::InvalidState {
                    operation: "maybe_checkpoint".to_string(),
                    state: inner.phase.to_string(),
                });
            }
            (
                inner.checkpoint.interval,
                inner.checkpoint.default_level,
                inner.last_committed,
            )
        };

        if interval == 0 {
            return Ok(false);
        }

        let current = self.sequencer.current();
        let due = match last_committed {
            None => current >= interval,
            Some(last) => current >= last + interval,
        };
        if !due {
            return Ok(false);
        }

        self.checkpoint(level).await?;
        Ok(true)
    }

    /// Restore all state from the most recent committed checkpoint with
    /// iteration at or below the current counter
    ///
    /// Segment buffers are overwritten in place (live views observe the
    /// restored values); a segment whose recorded generation differs
    /// from the live one is reallocated to the recorded shape, and views
    /// taken before that go stale. Parameters and the iteration counter
    /// are restored wholesale.
    pub async fn recover(&self) -> Result<()> {
        let store = self.store_for("recover", &[Phase::Running])?;
        self.group.barrier().await?;

        let bundle = store.read_latest(self.sequencer.current()).await?;

        for record in &bundle.segments {
            self.registry.restore_record(record)?;
        }
        self.params.replace_all(bundle.params.clone());
        self.sequencer.restore(bundle.iteration);

        {
            let mut inner = self.inner.write();
            inner.last_committed = Some(bundle.iteration);
            let rolled_back = bundle
                .segments
                .iter()
                .filter(|record| {
                    inner
                        .baseline
                        .get(&record.name)
                        .is_some_and(|&generation| generation != record.generation)
                })
                .count();
            if rolled_back > 0 {
                debug!(
                    segments = rolled_back,
                    "recovered segments differ from their start-time generations"
                );
            }
        }

        info!(
            iteration = bundle.iteration,
            segments = bundle.segments.len(),
            "state recovered from checkpoint"
        );
        Ok(())
    }

    /// Flush the store and shut down; idempotent
    pub async fn finalize(&self) -> Result<()> {
        let (phase, store) = {
            let inner = self.inner.read();
            (inner.phase, inner.store.clone())
        };
        if phase == Phase::Finalized {
            return Ok(());
        }

        if let Some(store) = store {
            store.flush().await?;
        }

        self.inner.write().phase = Phase::Finalized;
        info!("manager finalized");
        Ok(())
    }

    /// Register a segment, or attach to recovered/existing state
    pub fn register<T: Element>(
        &self,
        name: &str,
        shape_kind: ShapeKind,
        dims: &[usize],
        init: Initializer<T>,
    ) -> Result<SegmentView<T>> {
        self.ensure_phase("register", &[Phase::Initialized, Phase::Running])?;
        self.registry.register(name, shape_kind, dims, init)
    }

    /// Whether a segment is live; used to branch fresh-run vs resumed-run logic
    pub fn exists(&self, name: &str) -> bool {
        self.registry.exists(name)
    }

    /// View of a registered segment
    pub fn get<T: Element>(&self, name: &str) -> Result<SegmentView<T>> {
        self.registry.get(name)
    }

    /// Metadata of a registered segment
    pub fn meta(&self, name: &str) -> Result<SegmentMeta> {
        self.registry.meta(name)
    }

    /// Replace a segment's shape/type; see the registry for semantics
    pub fn resize<T: Element>(
        &self,
        name: &str,
        shape_kind: ShapeKind,
        dims: &[usize],
        init: Initializer<T>,
    ) -> Result<SegmentView<T>> {
        self.ensure_phase("resize", &[Phase::Initialized, Phase::Running])?;
        self.registry.resize(name, shape_kind, dims, init)
    }

    /// Register a scalar parameter if absent and persist the set
    ///
    /// Present values win, so a resumed run keeps its recovered
    /// parameters; the write-through file makes parameters durable even
    /// before the first checkpoint.
    pub async fn register_param(
        &self,
        name: &str,
        value: impl Into<ParamValue>,
    ) -> Result<()> {
        let store = self.store_for("register_param", &[Phase::Initialized, Phase::Running])?;
        if self.params.register(name, value.into()) {
            store.write_params(&self.params.entries()).await?;
        }
        Ok(())
    }

    /// Look up a registered parameter
    pub fn get_param(&self, name: &str) -> Result<ParamValue> {
        self.params.get(name)
    }

    /// Completed iterations
    pub fn current(&self) -> Iteration {
        self.sequencer.current()
    }

    /// Complete one iteration, returning the new count
    pub fn advance(&self) -> Iteration {
        self.sequencer.advance()
    }

    /// Whether initialization restored a prior checkpoint
    pub fn is_resuming(&self) -> bool {
        self.inner.read().resuming
    }

    /// This process's rank
    pub fn rank(&self) -> usize {
        self.group.rank()
    }

    /// Number of processes in the group
    pub fn world_size(&self) -> usize {
        self.group.size()
    }

    /// Direct access to the segment registry
    pub fn registry(&self) -> &SegmentRegistry {
        &self.registry
    }

    fn collect_bundle(&self, level: Level) -> CheckpointBundle {
        CheckpointBundle {
            format_version: BUNDLE_FORMAT_VERSION,
            iteration: self.sequencer.current(),
            level,
            rank: self.group.rank(),
            created_at: Utc::now(),
            segments: self.registry.snapshot_records(),
            params: self.params.entries(),
        }
    }

    fn ensure_phase(&self, operation: &str, allowed: &[Phase]) -> Result<()> {
        let phase = self.inner.read().phase;
        if allowed.contains(&phase) {
            Ok(())
        } else {
            Err(Error::InvalidState {
                operation: operation.to_string(),
                state: phase.to_string(),
            })
        }
    }

    fn store_for(
        &self,
        operation: &str,
        allowed: &[Phase],
    ) -> Result<Arc<dyn CheckpointStore>> {
        let inner = self.inner.read();
        if !allowed.contains(&inner.phase) {
            return Err(Error::InvalidState {
                operation: operation.to_string(),
                state: inner.phase.to_string(),
            });
        }
        inner.store.clone().ok_or_else(|| Error::InvalidState {
            operation: operation.to_string(),
            state: inner.phase.to_string(),
        })
    }
}
