//! Storage - durable checkpoint stores
//!
//! The manager's storage seam. A [`CheckpointStore`] persists checkpoint
//! bundles and the write-through parameter file for one rank, with an
//! explicit commit step: a written bundle becomes visible to
//! `read_latest` only after the coordinator's collective agreement
//! succeeds and `commit` is called. Implementations:
//!
//! - [`LocalStore`]: local filesystem, atomic writes, commit markers,
//!   optional retention of the newest N committed checkpoints
//! - [`MemoryStore`]: in-memory, with deterministic write-failure
//!   injection for collective tests

pub mod codec;
pub mod local;
pub mod memory;
pub mod store;

pub use codec::{decode_bundle, encode_bundle};
pub use local::LocalStore;
pub use memory::MemoryStore;
pub use store::CheckpointStore;
