//! Name-keyed registry of live segments

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use runtime_core::{Error, Generation, Result, SegmentMeta, SegmentRecord, ShapeKind};
use tracing::{debug, info};

use crate::element::Element;
use crate::initializer::Initializer;
use crate::segment::{Segment, SegmentCell, SegmentView};

/// Registry of named, typed, shaped memory segments
///
/// Purely process-local: every operation here completes without any
/// cross-process communication. Consistency across a process group
/// (every rank registering the same names with matching shapes) is a
/// caller discipline; the coordinator detects divergence at checkpoint
/// time but does not repair it.
#[derive(Debug, Default)]
pub struct SegmentRegistry {
    segments: DashMap<String, SegmentCell>,
}

impl SegmentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a segment, or attach to it if it already exists
    ///
    /// For a new name the dimension list is validated against the shape
    /// kind, a zeroed buffer is allocated and filled from `init`, and a
    /// view at generation 0 is returned. For an existing name (idempotent
    /// re-registration on a fresh run, or attach-after-restore on a
    /// resumed run) the shape and initializer arguments are ignored and a
    /// view of the live segment is returned; re-registering with a
    /// different shape on a non-resumed run is a caller error that this
    /// registry does not detect. The element type must match either way.
    pub fn register<T: Element>(
        &self,
        name: &str,
        shape_kind: ShapeKind,
        dims: &[usize],
        init: Initializer<T>,
    ) -> Result<SegmentView<T>> {
        match self.segments.entry(name.to_string()) {
            Entry::Occupied(entry) => {
                debug!(segment = name, "attaching to existing segment");
                SegmentView::new(entry.get().clone())
            }
            Entry::Vacant(entry) => {
                let meta = SegmentMeta::new(name, T::VALUE_TYPE, shape_kind, dims)?;
                let element_count = meta.element_count();
                let segment = Segment::create(meta, &init)?;
                let cell: SegmentCell = Arc::new(RwLock::new(segment));
                entry.insert(cell.clone());
                info!(
                    segment = name,
                    value_type = %T::VALUE_TYPE,
                    shape = %shape_kind,
                    elements = element_count,
                    "segment registered"
                );
                SegmentView::new(cell)
            }
        }
    }

    /// Whether a segment with this name is live
    pub fn exists(&self, name: &str) -> bool {
        self.segments.contains_key(name)
    }

    /// View of a live segment
    pub fn get<T: Element>(&self, name: &str) -> Result<SegmentView<T>> {
        let cell = self
            .segments
            .get(name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| Error::UnknownSegment {
                segment: name.to_string(),
            })?;
        SegmentView::new(cell)
    }

    /// Replace a segment's shape and type
    ///
    /// The old contents are discarded (resize is re-registration, not a
    /// data-preserving reshape), the generation is incremented, and any
    /// previously returned view goes stale.
    pub fn resize<T: Element>(
        &self,
        name: &str,
        shape_kind: ShapeKind,
        dims: &[usize],
        init: Initializer<T>,
    ) -> Result<SegmentView<T>> {
        let mut entry = self
            .segments
            .get_mut(name)
            .ok_or_else(|| Error::UnknownSegment {
                segment: name.to_string(),
            })?;

        let old_generation = entry.value().read().meta().generation;

        let mut meta = SegmentMeta::new(name, T::VALUE_TYPE, shape_kind, dims)?;
        meta.generation = old_generation + 1;
        let generation = meta.generation;
        let segment = Segment::create(meta, &init)?;

        *entry.value_mut() = Arc::new(RwLock::new(segment));
        info!(
            segment = name,
            generation,
            value_type = %T::VALUE_TYPE,
            shape = %shape_kind,
            "segment resized"
        );
        SegmentView::new(entry.value().clone())
    }

    /// Number of live segments
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Current generation of every live segment
    pub fn generations(&self) -> HashMap<String, Generation> {
        self.segments
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().read().meta().generation))
            .collect()
    }

    /// Metadata of a live segment
    pub fn meta(&self, name: &str) -> Result<SegmentMeta> {
        self.segments
            .get(name)
            .map(|entry| entry.value().read().meta().clone())
            .ok_or_else(|| Error::UnknownSegment {
                segment: name.to_string(),
            })
    }

    /// Capture every live segment for a checkpoint, ordered by name
    pub fn snapshot_records(&self) -> Vec<SegmentRecord> {
        let cells: Vec<SegmentCell> = self
            .segments
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        let mut records: Vec<SegmentRecord> =
            cells.iter().map(|cell| cell.read().to_record()).collect();
        records.sort_by(|a, b| a.name.cmp(&b.name));
        records
    }

    /// Create a segment directly from a checkpoint record
    ///
    /// Used when a resumed run materializes recovered state before the
    /// application re-registers; replaces any same-named segment.
    pub fn materialize_record(&self, record: &SegmentRecord) -> Result<()> {
        let segment = Segment::from_record(record)?;
        debug!(
            segment = %record.name,
            generation = record.generation,
            bytes = record.bytes.len(),
            "segment materialized from checkpoint"
        );
        self.segments
            .insert(record.name.clone(), Arc::new(RwLock::new(segment)));
        Ok(())
    }

    /// Overwrite a live segment from a checkpoint record
    ///
    /// Restores in place when the generations agree; reallocates to the
    /// recorded shape when they differ (views taken before that go
    /// stale). A record naming a segment that was never registered is a
    /// shape mismatch, not a fresh registration.
    pub fn restore_record(&self, record: &SegmentRecord) -> Result<()> {
        record.validate()?;

        let mut entry =
            self.segments
                .get_mut(&record.name)
                .ok_or_else(|| Error::ShapeMismatch {
                    segment: record.name.clone(),
                    message: "checkpoint names a segment that is not registered".to_string(),
                })?;

        let live_generation = entry.value().read().meta().generation;
        if live_generation == record.generation {
            entry.value().write().restore_bytes(record)?;
        } else {
            let segment = Segment::from_record(record)?;
            *entry.value_mut() = Arc::new(RwLock::new(segment));
            debug!(
                segment = %record.name,
                live_generation,
                recorded_generation = record.generation,
                "segment reallocated to checkpointed shape"
            );
        }
        Ok(())
    }
}
