//! Coordinator - collective checkpoint and recovery
//!
//! Ties the registry, parameter store, iteration sequencer, storage
//! backend and process group together behind one lifecycle:
//!
//! ```text
//! Uninitialized -> Initialized -> Running -> Finalized
//! ```
//!
//! Applications construct a [`Coordinator`] per process, register their
//! segments and parameters, then iterate: advance the counter every
//! loop, checkpoint every so often, recover after faults. On restart
//! the same registration calls transparently attach to the recovered
//! state instead of allocating fresh buffers.

pub mod coordinator;

pub use coordinator::Coordinator;

pub use process_group::{LocalGroup, ProcessGroup, SoloGroup};
pub use runtime_core::{
    CheckpointConfig, Error, Iteration, Level, ManagerConfig, ParamValue, Result, ShapeKind,
    StorageBackendKind, StorageConfig, ValueType,
};
pub use segment_registry::{Element, Initializer, SegmentView};
pub use storage::{CheckpointStore, LocalStore, MemoryStore};
