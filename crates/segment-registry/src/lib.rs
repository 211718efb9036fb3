//! Segment Registry - process-local state owned by the manager
//!
//! Provides named, typed, multi-dimensional memory segments with
//! mutable zero-copy views, the scalar parameter store, and the
//! iteration sequencer. Everything here is purely local to the calling
//! process: no I/O, no cross-process communication.

pub mod element;
pub mod initializer;
pub mod params;
pub mod registry;
pub mod segment;
pub mod sequencer;

pub use element::{Element, TypedBuffer};
pub use initializer::Initializer;
pub use params::ParameterStore;
pub use registry::SegmentRegistry;
pub use segment::SegmentView;
pub use sequencer::IterationSequencer;
