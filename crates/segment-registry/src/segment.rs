//! Segments and the typed views handed to callers

use std::marker::PhantomData;
use std::sync::Arc;

use parking_lot::{
    MappedRwLockReadGuard, MappedRwLockWriteGuard, RwLock, RwLockReadGuard, RwLockWriteGuard,
};
use runtime_core::{Error, Result, SegmentMeta, SegmentRecord};

use crate::element::{Element, TypedBuffer};
use crate::initializer::Initializer;

/// A named, typed, shaped block of process-local memory
///
/// The buffer is exclusively owned here; callers only ever touch it
/// through a [`SegmentView`].
#[derive(Debug)]
pub struct Segment {
    meta: SegmentMeta,
    buffer: TypedBuffer,
}

/// Shared handle to one segment's storage cell
pub(crate) type SegmentCell = Arc<RwLock<Segment>>;

impl Segment {
    /// Allocate and fill a segment for validated metadata
    pub(crate) fn create<T: Element>(meta: SegmentMeta, init: &Initializer<T>) -> Result<Self> {
        debug_assert_eq!(meta.value_type, T::VALUE_TYPE);
        let mut buffer = TypedBuffer::zeroed(meta.value_type, meta.element_count());
        let slice = T::slice_mut(&mut buffer)
            .expect("freshly allocated buffer matches the element type");
        init.fill(&meta.name, slice)?;
        Ok(Self { meta, buffer })
    }

    /// Rebuild a segment from a checkpoint record
    pub(crate) fn from_record(record: &SegmentRecord) -> Result<Self> {
        record.validate()?;
        let meta = record.meta()?;
        let buffer =
            TypedBuffer::from_bytes(meta.value_type, meta.element_count(), &record.bytes)?;
        Ok(Self { meta, buffer })
    }

    pub(crate) fn meta(&self) -> &SegmentMeta {
        &self.meta
    }

    pub(crate) fn buffer(&self) -> &TypedBuffer {
        &self.buffer
    }

    /// Capture metadata and bytes for a checkpoint
    pub(crate) fn to_record(&self) -> SegmentRecord {
        SegmentRecord {
            name: self.meta.name.clone(),
            value_type: self.meta.value_type,
            shape_kind: self.meta.shape_kind,
            dims: self.meta.dims.clone(),
            generation: self.meta.generation,
            bytes: self.buffer.to_bytes(),
        }
    }

    /// Overwrite the buffer in place from checkpointed bytes
    ///
    /// Only valid when the record agrees with the live metadata; the
    /// registry handles generation mismatches by reallocating instead.
    pub(crate) fn restore_bytes(&mut self, record: &SegmentRecord) -> Result<()> {
        if record.value_type != self.meta.value_type || record.dims != self.meta.dims {
            return Err(Error::ShapeMismatch {
                segment: self.meta.name.clone(),
                message: format!(
                    "checkpoint records {} {:?} at generation {}, live segment is {} {:?}",
                    record.value_type,
                    record.dims,
                    record.generation,
                    self.meta.value_type,
                    self.meta.dims
                ),
            });
        }
        self.buffer.copy_from_bytes(&record.bytes)
    }
}

/// Mutable, zero-copy view onto a segment's buffer
///
/// Cheap to clone; writes through the view are visible to the next
/// checkpoint without any explicit "set" call. After a `resize` (or a
/// recovery that changes the segment's generation) existing views keep
/// pointing at the detached old buffer and must be re-fetched via `get`.
#[derive(Debug)]
pub struct SegmentView<T: Element> {
    cell: SegmentCell,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Element> SegmentView<T> {
    /// Wrap a cell, verifying the element type once up front
    pub(crate) fn new(cell: SegmentCell) -> Result<Self> {
        {
            let segment = cell.read();
            if segment.meta().value_type != T::VALUE_TYPE {
                return Err(Error::ShapeMismatch {
                    segment: segment.meta().name.clone(),
                    message: format!(
                        "segment holds {}, requested {}",
                        segment.meta().value_type,
                        T::VALUE_TYPE
                    ),
                });
            }
        }
        Ok(Self {
            cell,
            _marker: PhantomData,
        })
    }

    /// Read access to the elements
    pub fn read(&self) -> MappedRwLockReadGuard<'_, [T]> {
        RwLockReadGuard::map(self.cell.read(), |segment| {
            T::slice(segment.buffer()).expect("view element type is checked at creation")
        })
    }

    /// Write access to the elements
    pub fn write(&self) -> MappedRwLockWriteGuard<'_, [T]> {
        RwLockWriteGuard::map(self.cell.write(), |segment| {
            T::slice_mut(&mut segment.buffer)
                .expect("view element type is checked at creation")
        })
    }

    /// Snapshot of the segment metadata
    pub fn meta(&self) -> SegmentMeta {
        self.cell.read().meta().clone()
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.cell.read().buffer().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resize generation of the viewed buffer
    pub fn generation(&self) -> u64 {
        self.cell.read().meta().generation
    }
}

impl<T: Element> Clone for SegmentView<T> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
            _marker: PhantomData,
        }
    }
}
